//! Shared helpers for dialect implementations.

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote with double quotes (ANSI, Postgres, Snowflake, DuckDB, Redshift).
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote with backticks (MySQL, BigQuery, Databricks).
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote with square brackets (T-SQL).
pub fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}

// =============================================================================
// Date Arithmetic
// =============================================================================
//
// `part` is inserted verbatim so callers can pass either a unit name
// (`year`) or a templated placeholder resolved at query time.

/// `DATEADD(part, amount, expr)` (Snowflake, Redshift, T-SQL, Databricks).
pub fn date_add_function(expr: &str, part: &str, amount: i64) -> String {
    format!("DATEADD({}, {}, {})", part, amount, expr)
}

/// `(expr + INTERVAL 'amount part')` (Postgres, DuckDB).
pub fn date_add_interval_literal(expr: &str, part: &str, amount: i64) -> String {
    format!("({} + INTERVAL '{} {}')", expr, amount, part)
}

/// `DATE_ADD(expr, INTERVAL amount part)`, or `DATE_SUB` for negative
/// amounts (MySQL, BigQuery).
pub fn date_add_interval_function(expr: &str, part: &str, amount: i64) -> String {
    if amount < 0 {
        format!("DATE_SUB({}, INTERVAL {} {})", expr, -amount, part)
    } else {
        format!("DATE_ADD({}, INTERVAL {} {})", expr, amount, part)
    }
}

// =============================================================================
// Function Remapping
// =============================================================================

/// Remap functions for Postgres dialect.
pub fn remap_function_postgres(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "STRFTIME" | "DATE_FORMAT" => Some("TO_CHAR"),
        "NVL" | "IFNULL" | "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for DuckDB dialect.
pub fn remap_function_duckdb(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "TO_CHAR" | "DATE_FORMAT" => Some("STRFTIME"),
        "NVL" | "IFNULL" | "ISNULL" => Some("COALESCE"),
        _ => None,
    }
}

/// Remap functions for MySQL dialect.
pub fn remap_function_mysql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "STRFTIME" | "TO_CHAR" => Some("DATE_FORMAT"),
        "NVL" | "ISNULL" => Some("IFNULL"),
        "SUBSTR" => Some("SUBSTRING"),
        _ => None,
    }
}

/// Remap functions for T-SQL dialect.
pub fn remap_function_tsql(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "LENGTH" => Some("LEN"),
        "SUBSTR" => Some("SUBSTRING"),
        "NOW" => Some("GETDATE"),
        "STRFTIME" | "TO_CHAR" | "DATE_FORMAT" => Some("FORMAT"),
        "NVL" | "IFNULL" => Some("ISNULL"),
        _ => None,
    }
}

/// Remap functions for Snowflake dialect.
pub fn remap_function_snowflake(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "STRFTIME" | "DATE_FORMAT" => Some("TO_CHAR"),
        "IFNULL" | "ISNULL" => Some("NVL"),
        _ => None,
    }
}

/// Remap functions for BigQuery dialect.
pub fn remap_function_bigquery(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "STRFTIME" | "TO_CHAR" | "DATE_FORMAT" => Some("FORMAT_TIMESTAMP"),
        "NVL" | "ISNULL" => Some("IFNULL"),
        "LENGTH" => Some("CHAR_LENGTH"),
        _ => None,
    }
}

/// Redshift is Postgres-based, so we delegate to Postgres remapping.
pub fn remap_function_redshift(name: &str) -> Option<&'static str> {
    remap_function_postgres(name)
}

/// Remap functions for Databricks (Spark SQL) dialect.
pub fn remap_function_databricks(name: &str) -> Option<&'static str> {
    match name.to_uppercase().as_str() {
        "TO_CHAR" | "STRFTIME" => Some("DATE_FORMAT"),
        "NVL" | "ISNULL" | "IFNULL" => Some("COALESCE"),
        _ => None,
    }
}
