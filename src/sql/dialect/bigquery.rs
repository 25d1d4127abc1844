//! Google BigQuery dialect.
//!
//! Backtick quoting; date arithmetic via `DATE_ADD(d, INTERVAL n part)`.

use super::helpers;
use super::SqlDialect;

/// BigQuery dialect.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        helpers::remap_function_bigquery(name)
    }

    fn emit_date_add(&self, expr: &str, part: &str, amount: i64) -> String {
        helpers::date_add_interval_function(expr, part, amount)
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::BigQueryDialect {})
    }
}
