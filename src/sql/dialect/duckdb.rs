//! DuckDB dialect.
//!
//! DuckDB accepts Postgres-style interval literals.

use super::helpers;
use super::SqlDialect;

/// DuckDB dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_duckdb(name)
    }

    fn emit_date_add(&self, expr: &str, part: &str, amount: i64) -> String {
        helpers::date_add_interval_literal(expr, part, amount)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::DuckDbDialect {})
    }
}
