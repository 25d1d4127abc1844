//! SQL dialect definitions.
//!
//! Each dialect implements `SqlDialect` to describe the handful of syntax
//! differences the generator cares about:
//!
//! - Identifier quoting: `"` (Postgres/Snowflake/DuckDB), `` ` `` (MySQL,
//!   BigQuery, Databricks), `[]` (T-SQL)
//! - Function names that differ between engines (`NVL` vs `COALESCE`)
//! - Date arithmetic: `DATEADD(part, n, d)` vs `d + INTERVAL 'n part'` vs
//!   `DATE_ADD(d, INTERVAL n part)`
//! - Which sqlparser dialect parses expressions written for the engine
//!
//! # Usage
//!
//! ```
//! use semantic_patterns::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Snowflake;
//! assert_eq!(dialect.emit_date_add("d", "year", -1), "DATEADD(year, -1, d)");
//! ```

mod bigquery;
mod databricks;
mod duckdb;
pub mod helpers;
mod mysql;
mod postgres;
mod redshift;
mod snowflake;
mod tsql;

pub use bigquery::BigQuery;
pub use databricks::Databricks;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use snowflake::Snowflake;
pub use tsql::TSql;

use serde::Deserialize;
use std::str::FromStr;

/// SQL dialect trait - defines how dialect-specific constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Remap a function name to this dialect's equivalent.
    ///
    /// Returns `None` when the function exists under the same name.
    fn remap_function(&self, _name: &str) -> Option<&'static str> {
        None
    }

    /// Shift `expr` by `amount` units of `part`.
    ///
    /// `part` is emitted verbatim.
    fn emit_date_add(&self, expr: &str, part: &str, amount: i64) -> String;

    /// sqlparser dialect used to parse expressions written for this engine.
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect>;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Dialect {
    DuckDb,
    TSql,
    MySql,
    #[default]
    Postgres,
    Snowflake,
    BigQuery,
    Redshift,
    Databricks,
}

impl Dialect {
    /// All dialects, in a stable order.
    pub const ALL: [Dialect; 8] = [
        Dialect::DuckDb,
        Dialect::TSql,
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Snowflake,
        Dialect::BigQuery,
        Dialect::Redshift,
        Dialect::Databricks,
    ];

    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::TSql => &TSql,
            Dialect::MySql => &MySql,
            Dialect::Postgres => &Postgres,
            Dialect::Snowflake => &Snowflake,
            Dialect::BigQuery => &BigQuery,
            Dialect::Redshift => &Redshift,
            Dialect::Databricks => &Databricks,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn emit_date_add(&self, expr: &str, part: &str, amount: i64) -> String {
        self.dialect().emit_date_add(expr, part, amount)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        self.dialect().parser_dialect()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duckdb" => Ok(Dialect::DuckDb),
            "tsql" | "mssql" | "sqlserver" => Ok(Dialect::TSql),
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "snowflake" => Ok(Dialect::Snowflake),
            "bigquery" => Ok(Dialect::BigQuery),
            "redshift" => Ok(Dialect::Redshift),
            "databricks" | "spark" => Ok(Dialect::Databricks),
            other => Err(format!("unsupported dialect '{}'", other)),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
