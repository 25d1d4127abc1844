//! Metric variant expansion through the public lowering API.

use semantic_patterns::loader::{load_str, Format};
use semantic_patterns::lowering::{lower, BuildOptions};
use semantic_patterns::model::{
    BenchmarkAgg, Metric, ModelSet, PopComparison, PopOutput, VariantKind,
};

const MODELS: &str = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
  dimensions:
    - { name: region, type: categorical, expr: region }
    - { name: created_at, type: time, granularity: day, expr: created_at }
  measures:
    - { name: amount, agg: sum }
"#;

fn lower_with(metrics: &str, options: &BuildOptions) -> ModelSet {
    let yaml = format!("{}{}", MODELS, metrics);
    let declarations = load_str(&yaml, Format::Yaml, "variants.yml").unwrap();
    lower(&declarations, options).unwrap().models
}

fn variant_names(metric: &Metric) -> Vec<String> {
    metric.variants.iter().map(|v| metric.variant_name(v)).collect()
}

#[test]
fn test_metric_without_pop_has_only_base() {
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
"#,
        &BuildOptions::default(),
    );
    let revenue = models.metric("revenue").unwrap();
    assert_eq!(variant_names(revenue), vec!["revenue"]);
    assert_eq!(revenue.variants[0].kind, VariantKind::Base);
}

#[test]
fn test_variant_count_is_one_plus_comparisons_times_outputs() {
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [py, pm]
    outputs: [previous, change, pct_change]
"#,
        &BuildOptions::default(),
    );
    let revenue = models.metric("revenue").unwrap();
    assert_eq!(revenue.variants.len(), 1 + 2 * 3);
    assert_eq!(
        variant_names(revenue),
        vec![
            "revenue",
            "revenue_py",
            "revenue_py_change",
            "revenue_py_pct_change",
            "revenue_pm",
            "revenue_pm_change",
            "revenue_pm_pct_change",
        ]
    );
}

#[test]
fn test_duplicate_comparisons_are_collapsed() {
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [py, prior_year, pq]
"#,
        &BuildOptions::default(),
    );
    let revenue = models.metric("revenue").unwrap();
    let pop = revenue.pop.as_ref().unwrap();
    assert_eq!(
        pop.comparisons,
        vec![PopComparison::PriorYear, PopComparison::PriorQuarter]
    );
    assert_eq!(variant_names(revenue), vec!["revenue", "revenue_py", "revenue_pq"]);
}

#[test]
fn test_generator_default_outputs_apply_when_metric_lists_none() {
    let options = BuildOptions {
        default_pop_outputs: vec![PopOutput::Previous, PopOutput::PctChange],
        ..BuildOptions::default()
    };
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [pw]
"#,
        &options,
    );
    let revenue = models.metric("revenue").unwrap();
    assert_eq!(
        variant_names(revenue),
        vec!["revenue", "revenue_pw", "revenue_pw_pct_change"]
    );
}

#[test]
fn test_benchmarks_come_after_pop_variants() {
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [py]
  benchmark:
    groups:
      - { name: region, partition_by: [region], agg: median }
      - { name: overall }
"#,
        &BuildOptions::default(),
    );
    let revenue = models.metric("revenue").unwrap();
    assert_eq!(
        variant_names(revenue),
        vec![
            "revenue",
            "revenue_py",
            "revenue_region_benchmark",
            "revenue_overall_benchmark",
        ]
    );

    let VariantKind::Benchmark { params } = &revenue.variants[2].kind else {
        panic!("expected a benchmark variant");
    };
    assert_eq!(params.partition_by, vec!["region".to_string()]);
    assert_eq!(params.agg, BenchmarkAgg::Median);

    let VariantKind::Benchmark { params } = &revenue.variants[3].kind else {
        panic!("expected a benchmark variant");
    };
    assert!(params.partition_by.is_empty());
    assert_eq!(params.agg, BenchmarkAgg::Avg);
}

#[test]
fn test_pop_variant_kinds_carry_comparison_and_output() {
    let models = lower_with(
        r#"
- kind: metric
  name: revenue
  type: simple
  measure: amount
  pop:
    comparisons: [pm]
    outputs: [change]
"#,
        &BuildOptions::default(),
    );
    let revenue = models.metric("revenue").unwrap();
    let pops: Vec<_> = revenue.pop_variants().collect();
    assert_eq!(pops.len(), 1);
    assert_eq!(
        pops[0].kind,
        VariantKind::Pop {
            comparison: PopComparison::PriorMonth,
            output: PopOutput::Change,
        }
    );
}
