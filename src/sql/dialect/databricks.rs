//! Databricks (Spark SQL) dialect.
//!
//! Backtick quoting; `DATEADD(part, n, d)` is available since runtime 10.4.

use super::helpers;
use super::SqlDialect;

/// Databricks (Spark SQL) dialect.
#[derive(Debug, Clone, Copy)]
pub struct Databricks;

impl SqlDialect for Databricks {
    fn name(&self) -> &'static str {
        "databricks"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_databricks(name)
    }

    fn emit_date_add(&self, expr: &str, part: &str, amount: i64) -> String {
        helpers::date_add_function(expr, part, amount)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::DatabricksDialect {})
    }
}
