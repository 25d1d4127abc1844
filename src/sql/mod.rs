//! SQL handling.
//!
//! - [`dialect`] - SQL dialect implementations
//! - [`expr`] - Expression parsing, qualification and transpilation

pub mod dialect;
pub mod expr;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    prepare, qualify, qualify_with, referenced_columns, substitute_references, transpile,
    validate, SqlExprError, TABLE_REF,
};
