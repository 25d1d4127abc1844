//! Metrics refinement views: measures, metrics and benchmarks.

use semantic_patterns::generate::{compile, GeneratedFiles, GeneratorOptions};
use semantic_patterns::loader::{load_str, Format};

const RENTALS: &str = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
  dimensions:
    - { name: status, type: categorical, expr: status }
    - { name: region, type: categorical, expr: region }
  measures:
    - { name: amount, agg: sum, format: usd }
    - { name: cost, agg: sum }
    - { name: rental_rows, agg: count, expr: "1" }
    - { name: reviewed, agg: count, expr: review_id }
    - { name: unused, agg: max }
- kind: semantic_model
  name: facilities
  entities:
    - { name: facility, type: primary, expr: facility_id }
  measures:
    - { name: capacity, agg: sum }
- kind: metric
  name: revenue
  type: simple
  measure: amount
- kind: metric
  name: margin
  type: derived
  expr: revenue - cost
"#;

fn compile_yaml(extra: &str) -> GeneratedFiles {
    let yaml = format!("{}{}", RENTALS, extra);
    let declarations = load_str(&yaml, Format::Yaml, "metrics.yml").unwrap();
    compile(&declarations, &GeneratorOptions::default())
        .unwrap()
        .files
}

fn metrics_view(files: &GeneratedFiles, model: &str) -> String {
    files
        .get(&format!("views/{}.metrics.view.lkml", model))
        .unwrap_or_else(|| panic!("no metrics view for {}", model))
        .to_string()
}

#[test]
fn test_metrics_view_renders_hidden_inputs_then_metrics() {
    let files = compile_yaml("");
    insta::assert_snapshot!(metrics_view(&files, "rentals"), @r###"
    # Generated by semantic-patterns. Do not edit: changes are overwritten on the next compile.

    view: +rentals {

      measure: cost {
        label: "Cost"
        type: sum
        sql: ${TABLE}.cost ;;
        hidden: yes
      }

      measure: revenue {
        label: "Revenue"
        type: sum
        sql: ${TABLE}.amount ;;
        value_format_name: usd
      }

      measure: margin {
        label: "Margin"
        type: number
        sql: ${revenue} - ${cost} ;;
      }
    }
    "###);
}

#[test]
fn test_measures_exposed_by_simple_metrics_are_not_duplicated() {
    let view = metrics_view(&compile_yaml(""), "rentals");
    // `amount` is exposed through `revenue`; `unused` feeds nothing
    assert!(!view.contains("measure: amount {"));
    assert!(!view.contains("measure: unused {"));
}

#[test]
fn test_count_measures_sum_an_indicator() {
    let files = compile_yaml(
        r#"
- { kind: metric, name: rental_count, type: simple, measure: rental_rows }
- { kind: metric, name: review_count, type: simple, measure: reviewed }
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains("measure: rental_count {\n    label: \"Rental Count\"\n    type: sum\n    sql: 1 ;;"));
    assert!(view.contains(
        "sql: CASE WHEN ${TABLE}.review_id IS NOT NULL THEN 1 ELSE 0 END ;;"
    ));
}

#[test]
fn test_filtered_simple_metric_guards_its_value() {
    let files = compile_yaml(
        r#"
- kind: metric
  name: completed_revenue
  type: simple
  measure: amount
  filter:
    - status = 'completed'
    - region <> 'test'
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains(
        "sql: CASE WHEN (${TABLE}.status = 'completed') AND (${TABLE}.region <> 'test') THEN ${TABLE}.amount END ;;"
    ));
}

#[test]
fn test_ratio_metric() {
    let files = compile_yaml(
        r#"
- { kind: metric, name: rental_count, type: simple, measure: rental_rows }
- { kind: metric, name: revenue_per_rental, type: ratio, numerator: revenue, denominator: rental_count, format: "$#,##0.00" }
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains("sql: 1.0 * ${revenue} / NULLIF(${rental_count}, 0) ;;"));
    assert!(view.contains("value_format: \"$#,##0.00\""));
}

#[test]
fn test_filtered_ratio_uses_filtered_inputs() {
    let files = compile_yaml(
        r#"
- kind: metric
  name: completed_margin_rate
  type: ratio
  numerator: revenue
  denominator: cost
  filter: status = 'completed'
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains(
        "sql: 1.0 * ${completed_margin_rate__revenue} / NULLIF(${completed_margin_rate__cost}, 0) ;;"
    ));
    assert!(view.contains(
        "measure: completed_margin_rate__revenue {\n    type: sum\n    sql: CASE WHEN ${TABLE}.status = 'completed' THEN ${TABLE}.amount END ;;\n    hidden: yes\n  }"
    ));
    assert!(view.contains(
        "measure: completed_margin_rate__cost {\n    type: sum\n    sql: CASE WHEN ${TABLE}.status = 'completed' THEN ${TABLE}.cost END ;;\n    hidden: yes\n  }"
    ));
}

#[test]
fn test_cross_model_reference_uses_view_qualified_field() {
    let files = compile_yaml(
        r#"
- { kind: metric, name: revenue_per_seat, type: derived, model: rentals, expr: revenue / capacity }
"#,
    );
    let rentals = metrics_view(&files, "rentals");
    assert!(rentals.contains("sql: ${revenue} / ${facilities.capacity} ;;"));

    // facilities owns no metric but still hosts the hidden input
    let facilities = metrics_view(&files, "facilities");
    assert!(facilities.contains("view: +facilities {"));
    assert!(facilities.contains(
        "measure: capacity {\n    label: \"Capacity\"\n    type: sum\n    sql: ${TABLE}.capacity ;;\n    hidden: yes\n  }"
    ));
}

#[test]
fn test_model_without_metrics_has_no_metrics_view() {
    let files = compile_yaml("");
    assert!(files.get("views/facilities.view.lkml").is_some());
    assert!(files.get("views/facilities.metrics.view.lkml").is_none());
}

#[test]
fn test_benchmark_variants() {
    let files = compile_yaml(
        r#"
- kind: metric
  name: gross
  type: simple
  measure: amount
  group: Finance.Revenue
  benchmark:
    groups:
      - { name: region, partition_by: [region] }
      - { name: overall, agg: max }
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains(
        "measure: gross_region_benchmark {\n    label: \"Gross (Region Benchmark)\"\n    view_label: \"Finance\"\n    group_label: \"Revenue\"\n    group_item_label: \"Gross (Region Benchmark)\"\n    type: number\n    sql: AVG(${gross}) OVER (PARTITION BY ${region}) ;;\n    value_format_name: usd\n  }"
    ));
    assert!(view.contains("sql: MAX(${gross}) OVER () ;;"));

    let base = view.find("measure: gross {").unwrap();
    let region = view.find("measure: gross_region_benchmark {").unwrap();
    let overall = view.find("measure: gross_overall_benchmark {").unwrap();
    assert!(base < region && region < overall);
}

#[test]
fn test_hidden_metric() {
    let files = compile_yaml(
        r#"
- { kind: metric, name: internal_cost, type: simple, measure: cost, hidden: true }
"#,
    );
    let view = metrics_view(&files, "rentals");
    assert!(view.contains(
        "measure: internal_cost {\n    label: \"Internal Cost\"\n    type: sum\n    sql: ${TABLE}.cost ;;\n    hidden: yes\n  }"
    ));
    // `margin` now reads cost through the simple metric
    assert!(view.contains("sql: ${revenue} - ${internal_cost} ;;"));
    assert!(!view.contains("measure: cost {"));
}
