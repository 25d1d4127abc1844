//! Expression qualification, reference substitution and transpilation.

use semantic_patterns::sql::{
    prepare, qualify, qualify_with, referenced_columns, substitute_references, transpile,
    validate, Dialect, SqlExprError, TABLE_REF,
};

// ============================================================================
// Qualification
// ============================================================================

#[test]
fn test_qualify_with_table_reference() {
    assert_eq!(
        qualify("amount * quantity", TABLE_REF).unwrap(),
        "${TABLE}.amount * ${TABLE}.quantity"
    );
}

#[test]
fn test_qualify_case_expression() {
    let sql = qualify("CASE WHEN status = 'open' THEN amount ELSE 0 END", "r").unwrap();
    assert_eq!(sql, "CASE WHEN r.status = 'open' THEN r.amount ELSE 0 END");
}

#[test]
fn test_qualify_skips_qualified_and_literal_text() {
    let sql = qualify("f.city = 'amount' AND amount > 0", "r").unwrap();
    assert_eq!(sql, "f.city = 'amount' AND r.amount > 0");
}

#[test]
fn test_qualify_keeps_function_names() {
    let sql = qualify("coalesce(discount, 0)", "r").unwrap();
    assert_eq!(sql, "coalesce(r.discount, 0)");
}

#[test]
fn test_qualify_with_dialect_parser() {
    let sql = qualify_with("DATEADD(month, 1, created_at)", "r", Some(Dialect::Snowflake)).unwrap();
    assert_eq!(sql, "DATEADD(month, 1, r.created_at)");
}

#[test]
fn test_qualify_rejects_invalid_sql() {
    assert!(matches!(qualify("amount +", "r"), Err(SqlExprError::Syntax(_))));
}

// ============================================================================
// References
// ============================================================================

#[test]
fn test_referenced_columns_in_order_without_duplicates() {
    let columns = referenced_columns("revenue - cost + revenue * rate(x)", None).unwrap();
    assert_eq!(columns, vec!["revenue", "cost", "x"]);
}

#[test]
fn test_referenced_columns_ignore_qualified_and_templated() {
    let columns = referenced_columns("${TABLE}.a + t.b + c", None).unwrap();
    assert_eq!(columns, vec!["c"]);
}

#[test]
fn test_substitute_references_leaves_unknown_names() {
    let sql = substitute_references("(revenue - cost) / revenue", None, |name| match name {
        "revenue" => Some("${revenue}".to_string()),
        "cost" => Some("${costs.cost}".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(sql, "(${revenue} - ${costs.cost}) / ${revenue}");
}

#[test]
fn test_validate() {
    assert!(validate("a = = b", None).is_err());
    assert!(validate("status IN ('a', 'b')", None).is_ok());
    assert!(validate("${TABLE}.amount > 0", None).is_ok());
}

// ============================================================================
// Transpilation
// ============================================================================

#[test]
fn test_transpile_function_rename() {
    let sql = transpile("IFNULL(discount, 0)", Dialect::MySql, Dialect::Snowflake).unwrap();
    assert_eq!(sql, "NVL(discount, 0)");
}

#[test]
fn test_transpile_interval_arithmetic_to_dateadd() {
    let sql = transpile(
        "created_at - INTERVAL '1 year'",
        Dialect::Postgres,
        Dialect::Snowflake,
    )
    .unwrap();
    assert!(sql.starts_with("DATEADD("), "got {}", sql);
    assert!(sql.contains("year"), "got {}", sql);
    assert!(sql.contains("-1"), "got {}", sql);
    assert!(sql.contains("created_at"), "got {}", sql);
}

#[test]
fn test_transpile_dateadd_to_interval_function() {
    let sql = transpile("DATEADD(day, 7, shipped_at)", Dialect::Snowflake, Dialect::BigQuery).unwrap();
    assert!(sql.starts_with("DATE_ADD(shipped_at, INTERVAL 7"), "got {}", sql);
}

#[test]
fn test_prepare_transpiles_then_qualifies() {
    let sql = prepare("IFNULL(discount, 0)", Some(Dialect::Snowflake), Dialect::Postgres, TABLE_REF).unwrap();
    assert_eq!(sql, "COALESCE(${TABLE}.discount, 0)");

    // No source dialect: already written for the target
    let sql = prepare("IFNULL(discount, 0)", None, Dialect::Postgres, "r").unwrap();
    assert_eq!(sql, "IFNULL(r.discount, 0)");
}
