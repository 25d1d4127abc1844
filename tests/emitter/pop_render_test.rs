//! Period-over-period views under both strategies.

use semantic_patterns::emitter::PopStrategy;
use semantic_patterns::generate::{compile, GeneratedFiles, GeneratorOptions};
use semantic_patterns::loader::{load_str, Format};
use semantic_patterns::sql::Dialect;

const RENTALS: &str = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
  dimensions:
    - { name: status, type: categorical, expr: status }
    - { name: created_at, type: time, granularity: day, expr: created_at }
    - { name: closed_at, type: time, granularity: month, expr: closed_at }
  measures:
    - { name: amount, agg: sum, format: usd }
    - { name: cost, agg: sum }
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [py, pm]
    outputs: [previous, pct_change]
"#;

fn compile_with(extra: &str, options: &GeneratorOptions) -> GeneratedFiles {
    let yaml = format!("{}{}", RENTALS, extra);
    let declarations = load_str(&yaml, Format::Yaml, "pop.yml").unwrap();
    compile(&declarations, options).unwrap().files
}

fn dynamic() -> GeneratorOptions {
    GeneratorOptions {
        fact_models: vec!["rentals".to_string()],
        ..GeneratorOptions::default().with_pop_strategy(PopStrategy::Dynamic)
    }
}

/// Current-period row condition for a date expression.
fn current_condition(date_sql: &str) -> String {
    format!("{{% condition calendar.date_range %}} {} {{% endcondition %}}", date_sql)
}

/// Prior-period row condition for a Postgres date expression.
fn prior_condition(date_sql: &str) -> String {
    format!(
        "{{% if calendar.comparison_period._parameter_value == 'none' %}}1 = 0{{% else %}}{{% condition calendar.date_range %}} ({} + INTERVAL '1 {{% parameter calendar.comparison_period %}}') {{% endcondition %}}{{% endif %}}",
        date_sql
    )
}

// ============================================================================
// Static
// ============================================================================

#[test]
fn test_static_pop_view() {
    let files = compile_with("", &GeneratorOptions::default());
    let view = files.get("views/rentals.pop.view.lkml").unwrap();
    insta::assert_snapshot!(view, @r###"
    # Generated by semantic-patterns. Do not edit: changes are overwritten on the next compile.

    view: +rentals {

      measure: revenue_py {
        label: "Revenue (Prior Year)"
        type: period_over_period
        based_on: revenue
        based_on_time: created_at_date
        period: year
        kind: previous
        value_format_name: usd
      }

      measure: revenue_py_pct_change {
        label: "Revenue % Change (Prior Year)"
        type: period_over_period
        based_on: revenue
        based_on_time: created_at_date
        period: year
        kind: relative_change
        value_format_name: percent_1
      }

      measure: revenue_pm {
        label: "Revenue (Prior Month)"
        type: period_over_period
        based_on: revenue
        based_on_time: created_at_date
        period: month
        kind: previous
        value_format_name: usd
      }

      measure: revenue_pm_pct_change {
        label: "Revenue % Change (Prior Month)"
        type: period_over_period
        based_on: revenue
        based_on_time: created_at_date
        period: month
        kind: relative_change
        value_format_name: percent_1
      }
    }
    "###);
}

#[test]
fn test_static_pop_anchor_timeframe_follows_granularity() {
    let files = compile_with(
        r#"
- kind: metric
  name: closed_revenue
  type: simple
  measure: amount
  pop: { comparisons: [py], outputs: [change], date_dimension: closed_at }
"#,
        &GeneratorOptions::default(),
    );
    let view = files.get("views/rentals.pop.view.lkml").unwrap();
    assert!(view.contains(
        "measure: closed_revenue_py_change {\n    label: \"Closed Revenue Change (Prior Year)\"\n    type: period_over_period\n    based_on: closed_revenue\n    based_on_time: closed_at_month\n    period: year\n    kind: difference\n"
    ));
}

#[test]
fn test_static_pop_needs_no_calendar() {
    let options = GeneratorOptions {
        fact_models: vec!["rentals".to_string()],
        ..GeneratorOptions::default()
    };
    let files = compile_with("", &options);
    assert!(files.get("explores/rentals_calendar.view.lkml").is_none());
}

#[test]
fn test_metrics_view_skips_pop_variants() {
    let files = compile_with("", &GeneratorOptions::default());
    let metrics = files.get("views/rentals.metrics.view.lkml").unwrap();
    assert!(metrics.contains("measure: revenue {"));
    assert!(!metrics.contains("revenue_py"));
}

#[test]
fn test_no_pop_metrics_means_no_pop_view() {
    let yaml = r#"
- kind: semantic_model
  name: costs
  entities:
    - { name: cost_line, type: primary, expr: cost_line_id }
  dimensions:
    - { name: booked_at, type: time, expr: booked_at }
  measures:
    - { name: cost, agg: sum }
- { kind: metric, name: total_cost, type: simple, measure: cost }
"#;
    let declarations = load_str(yaml, Format::Yaml, "costs.yml").unwrap();
    let dynamic = GeneratorOptions::default().with_pop_strategy(PopStrategy::Dynamic);
    for options in [GeneratorOptions::default(), dynamic] {
        let files = compile(&declarations, &options).unwrap().files;
        assert!(files.get("views/costs.pop.view.lkml").is_none());
    }
}

// ============================================================================
// Dynamic
// ============================================================================

#[test]
fn test_dynamic_simple_metric_prior_and_changes() {
    let files = compile_with("", &dynamic());
    let view = files.get("views/rentals.pop.view.lkml").unwrap();

    let expected = format!(
        "  measure: revenue_prior {{\n    label: \"Revenue (Prior Period)\"\n    type: sum\n    sql: CASE WHEN {} THEN ${{TABLE}}.amount END ;;\n    value_format_name: usd\n  }}\n",
        prior_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&expected), "{}", view);

    let current = format!(
        "  measure: revenue_current {{\n    type: sum\n    sql: CASE WHEN {} THEN ${{TABLE}}.amount END ;;\n    value_format_name: usd\n    hidden: yes\n  }}\n",
        current_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&current), "{}", view);

    // Changes compare the selected range with the prior one, not with the
    // unrestricted total
    assert!(view.contains(
        "  measure: revenue_change {\n    label: \"Revenue Change (Prior Period)\"\n    type: number\n    sql: ${revenue_current} - ${revenue_prior} ;;\n    value_format_name: usd\n  }\n"
    ));
    assert!(view.contains(
        "  measure: revenue_pct_change {\n    label: \"Revenue % Change (Prior Period)\"\n    type: number\n    sql: (${revenue_current} - ${revenue_prior}) / NULLIF(${revenue_prior}, 0) ;;\n    value_format_name: percent_1\n  }\n"
    ));
    assert!(!view.contains("${revenue} -"));
    // Comparison-specific variants belong to the static strategy only
    assert!(!view.contains("revenue_py"));
}

#[test]
fn test_dynamic_derived_metric_gets_hidden_component_priors() {
    let files = compile_with(
        r#"
- kind: metric
  name: margin
  type: derived
  expr: revenue - cost
  pop: { comparisons: [pq] }
"#,
        &dynamic(),
    );
    let view = files.get("views/rentals.pop.view.lkml").unwrap();

    assert!(view.contains(
        "  measure: margin_prior {\n    label: \"Margin (Prior Period)\"\n    type: number\n    sql: ${margin__revenue_prior} - ${margin__cost_prior} ;;\n  }\n"
    ));
    assert!(view.contains(
        "  measure: margin_current {\n    type: number\n    sql: ${margin__revenue_current} - ${margin__cost_current} ;;\n    hidden: yes\n  }\n"
    ));
    let cost_prior = format!(
        "  measure: margin__cost_prior {{\n    type: sum\n    sql: CASE WHEN {} THEN ${{TABLE}}.cost END ;;\n    hidden: yes\n  }}\n",
        prior_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&cost_prior), "{}", view);
    let revenue_prior = format!(
        "  measure: margin__revenue_prior {{\n    type: sum\n    sql: CASE WHEN {} THEN ${{TABLE}}.amount END ;;\n    value_format_name: usd\n    hidden: yes\n  }}\n",
        prior_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&revenue_prior), "{}", view);
    // revenue's own prior stays separate from the copy margin reads
    assert_eq!(view.matches("measure: revenue_prior {").count(), 1);
    assert!(view.contains("measure: margin_change {"));
}

#[test]
fn test_dynamic_calendar_offers_comparison_periods() {
    let files = compile_with(
        r#"
- kind: metric
  name: weekly_cost
  type: simple
  measure: cost
  pop: { comparisons: [pw] }
"#,
        &dynamic(),
    );
    let calendar = files.get("explores/rentals_calendar.view.lkml").unwrap();

    // The PoP anchor is offered even without a date selector
    assert!(calendar.contains("value: \"rentals__created_at\""));
    assert!(!calendar.contains("rentals__closed_at"));

    assert!(calendar.contains(
        "  filter: date_range {\n    label: \"Date Range\"\n    type: date\n  }\n"
    ));
    assert!(calendar.contains(
        "  parameter: comparison_period {\n    label: \"Comparison Period\"\n    type: unquoted\n    allowed_value: {\n      label: \"None\"\n      value: \"none\"\n    }\n    allowed_value: {\n      label: \"Prior Year\"\n      value: \"year\"\n    }\n    allowed_value: {\n      label: \"Prior Month\"\n      value: \"month\"\n    }\n    allowed_value: {\n      label: \"Prior Week\"\n      value: \"week\"\n    }\n    default_value: \"none\"\n  }\n"
    ));

    let explore = files.get("explores/rentals.explore.lkml").unwrap();
    assert!(explore.contains("join: calendar {"));
}

#[test]
fn test_dynamic_prior_uses_target_dialect_date_arithmetic() {
    let options = GeneratorOptions {
        dialect: Dialect::Snowflake,
        ..dynamic()
    };
    let files = compile_with("", &options);
    let view = files.get("views/rentals.pop.view.lkml").unwrap();
    assert!(view.contains(
        "{% condition calendar.date_range %} DATEADD({% parameter calendar.comparison_period %}, 1, ${TABLE}.created_at) {% endcondition %}"
    ));
}

#[test]
fn test_dynamic_filtered_metric_combines_conditions() {
    let files = compile_with(
        r#"
- kind: metric
  name: completed_revenue
  type: simple
  measure: amount
  filter: status = 'completed'
  pop: { comparisons: [py] }
"#,
        &dynamic(),
    );
    let view = files.get("views/rentals.pop.view.lkml").unwrap();
    let expected = format!(
        "sql: CASE WHEN (${{TABLE}}.status = 'completed') AND {} THEN ${{TABLE}}.amount END ;;",
        prior_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&expected), "{}", view);
}

#[test]
fn test_dynamic_inputs_follow_the_metric_anchor() {
    let files = compile_with(
        r#"
- kind: metric
  name: closed_margin
  type: derived
  expr: amount - cost
  pop: { comparisons: [py], date_dimension: closed_at }
"#,
        &dynamic(),
    );
    let view = files.get("views/rentals.pop.view.lkml").unwrap();

    assert!(view.contains(
        "  measure: closed_margin_prior {\n    label: \"Closed Margin (Prior Period)\"\n    type: number\n    sql: ${closed_margin__revenue_prior} - ${closed_margin__cost_prior} ;;\n  }\n"
    ), "{}", view);
    for (field, column) in [("revenue", "amount"), ("cost", "cost")] {
        let prior = format!(
            "measure: closed_margin__{}_prior {{",
            field
        );
        assert!(view.contains(&prior), "{}", view);
        let closed = format!(
            "sql: CASE WHEN {} THEN ${{TABLE}}.{} END ;;",
            prior_condition("${TABLE}.closed_at"),
            column
        );
        assert!(view.contains(&closed), "{}", view);
        let current = format!(
            "sql: CASE WHEN {} THEN ${{TABLE}}.{} END ;;",
            current_condition("${TABLE}.closed_at"),
            column
        );
        assert!(view.contains(&current), "{}", view);
    }

    // revenue keeps its own created_at anchor
    let revenue_prior = format!(
        "  measure: revenue_prior {{\n    label: \"Revenue (Prior Period)\"\n    type: sum\n    sql: CASE WHEN {} THEN ${{TABLE}}.amount END ;;\n",
        prior_condition("${TABLE}.created_at")
    );
    assert!(view.contains(&revenue_prior), "{}", view);

    let calendar = files.get("explores/rentals_calendar.view.lkml").unwrap();
    assert!(calendar.contains("value: \"rentals__closed_at\""));
}
