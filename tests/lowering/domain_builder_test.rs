//! Building processed models from declarations.

use semantic_patterns::loader::{load_str, Format};
use semantic_patterns::lowering::{lower, lower_lenient, BuildOptions, LoweringOutput};
use semantic_patterns::model::{DimensionKind, MetricKind, RefTarget};
use semantic_patterns::sql::Dialect;
use semantic_patterns::validation::{BuildError, ResolutionError, ValidationError};

fn lower_yaml(yaml: &str) -> Result<LoweringOutput, Vec<BuildError>> {
    let declarations = load_str(yaml, Format::Yaml, "domain.yml").unwrap();
    lower(&declarations, &BuildOptions::default())
}

const RENTALS: &str = r#"
data_models:
  - { name: fct_rentals, schema: analytics, table: rentals, dialect: snowflake }
semantic_models:
  - name: rentals
    data_model: fct_rentals
    defaults: { agg_time_dimension: booked_at, convert_tz: true }
    entities:
      - { name: rental, type: primary, expr: rental_id }
      - { name: facility, type: foreign, expr: facility_id }
    dimensions:
      - { name: status, type: categorical, expr: status }
      - { name: created_at, type: time, expr: created_at, convert_tz: false }
      - { name: booked_at, type: time, granularity: hour, expr: booked_at }
    measures:
      - { name: amount, agg: sum, format: usd, group: Finance.Revenue, description: Rental amount }
      - { name: rental_rows, agg: count, expr: "1" }
    date_selector: {}
  - name: facilities
    entities:
      - { name: facility, type: primary, expr: facility_id }
    dimensions:
      - { name: city, type: categorical, expr: city }
    measures:
      - { name: capacity, agg: sum }
metrics:
  - { name: revenue, type: simple, measure: amount }
  - { name: rental_count, type: simple, measure: rental_rows }
  - { name: revenue_per_rental, type: ratio, numerator: revenue, denominator: rental_count }
  - { name: capacity_total, type: simple, measure: capacity }
"#;

#[test]
fn test_named_data_model_is_resolved() {
    let out = lower_yaml(RENTALS).unwrap();
    let rentals = out.models.get("rentals").unwrap();
    assert_eq!(rentals.data_model.qualified_table(), "analytics.rentals");
    assert_eq!(rentals.data_model.dialect, Some(Dialect::Snowflake));
}

#[test]
fn test_missing_data_model_is_implicit() {
    let out = lower_yaml(RENTALS).unwrap();
    let facilities = out.models.get("facilities").unwrap();
    assert_eq!(facilities.data_model.qualified_table(), "facilities");
    assert_eq!(facilities.data_model.dialect, None);
}

#[test]
fn test_unknown_data_model_is_reported() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  data_model: nowhere
  entities:
    - { name: rental, type: primary, expr: rental_id }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Resolution(ResolutionError::UnknownDataModel { data_model, .. })]
            if data_model == "nowhere"
    ));
}

#[test]
fn test_labels_default_to_title_cased_names() {
    let out = lower_yaml(RENTALS).unwrap();
    let rentals = out.models.get("rentals").unwrap();
    assert_eq!(rentals.label, "Rentals");
    assert_eq!(rentals.dimension("created_at").unwrap().label, "Created At");
    assert_eq!(out.models.metric("revenue_per_rental").unwrap().label, "Revenue Per Rental");
}

#[test]
fn test_convert_tz_and_granularity_defaults() {
    let out = lower_yaml(RENTALS).unwrap();
    let rentals = out.models.get("rentals").unwrap();

    let created = &rentals.dimension("created_at").unwrap().kind;
    assert!(matches!(
        created,
        DimensionKind::Time { convert_tz: false, granularity } if granularity.as_str() == "day"
    ));

    let booked = &rentals.dimension("booked_at").unwrap().kind;
    assert!(matches!(
        booked,
        DimensionKind::Time { convert_tz: true, granularity } if granularity.as_str() == "hour"
    ));
}

#[test]
fn test_default_time_dimension_and_date_selector() {
    let out = lower_yaml(RENTALS).unwrap();
    let rentals = out.models.get("rentals").unwrap();
    assert_eq!(rentals.default_time_dimension.as_deref(), Some("booked_at"));
    // An empty selector offers every time dimension, in declaration order.
    let selector = rentals.date_selector.as_ref().unwrap();
    assert_eq!(selector.dimensions, vec!["created_at", "booked_at"]);

    assert!(out.models.get("facilities").unwrap().date_selector.is_none());
}

#[test]
fn test_simple_metric_inherits_measure_presentation() {
    let out = lower_yaml(RENTALS).unwrap();
    let revenue = out.models.metric("revenue").unwrap();
    assert_eq!(revenue.format.as_deref(), Some("usd"));
    assert_eq!(revenue.description.as_deref(), Some("Rental amount"));
    assert_eq!(revenue.group.as_ref().unwrap().to_string(), "Finance.Revenue");
}

#[test]
fn test_metric_owners() {
    let out = lower_yaml(RENTALS).unwrap();
    assert_eq!(out.models.metric("revenue").unwrap().model, "rentals");
    assert_eq!(out.models.metric("revenue_per_rental").unwrap().model, "rentals");
    assert_eq!(out.models.metric("capacity_total").unwrap().model, "facilities");

    let names: Vec<_> = out
        .models
        .get("rentals")
        .unwrap()
        .metrics
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(names, vec!["revenue", "rental_count", "revenue_per_rental"]);
}

#[test]
fn test_ratio_references_metrics() {
    let out = lower_yaml(RENTALS).unwrap();
    let ratio = out.models.metric("revenue_per_rental").unwrap();
    let MetricKind::Ratio {
        numerator,
        denominator,
    } = &ratio.kind
    else {
        panic!("expected a ratio metric");
    };
    assert_eq!(numerator.name, "revenue");
    assert_eq!(numerator.target, RefTarget::Metric);
    assert_eq!(denominator.name, "rental_count");
}

#[test]
fn test_cross_model_derived_metric_with_explicit_owner() {
    let yaml = format!(
        "{}  - {{ name: utilisation, type: derived, model: facilities, expr: amount / capacity }}\n",
        RENTALS
    );
    let out = lower_yaml(&yaml).unwrap();
    let metric = out.models.metric("utilisation").unwrap();
    assert_eq!(metric.model, "facilities");
    let refs: Vec<(&str, &str, RefTarget)> = metric
        .kind
        .references()
        .iter()
        .map(|r| (r.name.as_str(), r.model.as_str(), r.target))
        .collect();
    assert_eq!(
        refs,
        vec![
            ("amount", "rentals", RefTarget::Measure),
            ("capacity", "facilities", RefTarget::Measure),
        ]
    );
}

#[test]
fn test_ambiguous_measure_requires_explicit_model() {
    let yaml = r#"
- kind: semantic_model
  name: a
  measures:
    - { name: amount, agg: sum }
- kind: semantic_model
  name: b
  measures:
    - { name: amount, agg: sum }
- kind: metric
  name: revenue
  type: simple
  measure: amount
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Resolution(ResolutionError::AmbiguousMeasure { models, .. })]
            if models == &vec!["a".to_string(), "b".to_string()]
    ));

    let explicit = format!("{}  model: b\n", yaml);
    let out = lower_yaml(&explicit).unwrap();
    assert_eq!(out.models.metric("revenue").unwrap().model, "b");
}

#[test]
fn test_multiple_primary_entities_rejected() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
    - { name: booking, type: primary, expr: booking_id }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::MultiplePrimaryEntities { .. })]
    ));
}

#[test]
fn test_complete_only_on_foreign_entities() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id, complete: true }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::CompleteOnNonForeign { .. })]
    ));
}

#[test]
fn test_invalid_sql_is_reported_with_path() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  dimensions:
    - { name: status, type: categorical, expr: "status = = 1" }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("rentals.status"));
}

#[test]
fn test_variants_only_on_time_dimensions() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  dimensions:
    - name: status
      type: categorical
      variants: { raw: status_raw, clean: status_clean }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::VariantsOnCategorical { .. })]
    ));
}

#[test]
fn test_duplicate_declarations_keep_the_first() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  measures:
    - { name: amount, agg: sum }
- kind: semantic_model
  name: rentals
  measures:
    - { name: other, agg: sum }
"#;
    let declarations = load_str(yaml, Format::Yaml, "dup.yml").unwrap();
    let result = lower_lenient(&declarations, &BuildOptions::default());
    assert_eq!(result.errors.len(), 1);
    let rentals = result.output.models.get("rentals").unwrap();
    assert!(rentals.measure("amount").is_some());
    assert!(rentals.measure("other").is_none());
}

#[test]
fn test_lenient_drops_metrics_of_dropped_models() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  measures:
    - { name: amount, agg: sum }
- kind: semantic_model
  name: broken
  dimensions:
    - { name: d, type: categorical }
  measures:
    - { name: cost, agg: sum }
- kind: metric
  name: revenue
  type: simple
  measure: amount
- kind: metric
  name: total_cost
  type: simple
  measure: cost
"#;
    let declarations = load_str(yaml, Format::Yaml, "lenient.yml").unwrap();
    let result = lower_lenient(&declarations, &BuildOptions::default());
    assert!(result.output.models.metric("revenue").is_some());
    assert!(result.output.models.metric("total_cost").is_none());
    assert!(result.errors.iter().any(|e| matches!(
        e,
        BuildError::Validation(ValidationError::MissingDimensionSql { .. })
    )));
    assert!(result.errors.iter().any(|e| matches!(
        e,
        BuildError::Resolution(ResolutionError::UnknownMeasure { .. })
    )));
}

#[test]
fn test_pop_anchor_must_be_time_dimension() {
    let yaml = format!(
        "{}  - name: revenue_pop\n    type: simple\n    measure: amount\n    pop: {{ comparisons: [py], date_dimension: status }}\n",
        RENTALS
    );
    let errors = lower_yaml(&yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::NotATimeDimension { dimension, .. })]
            if dimension == "status"
    ));
}

#[test]
fn test_benchmark_partitions_must_be_categorical() {
    let yaml = format!(
        "{}  - name: revenue_bench\n    type: simple\n    measure: amount\n    benchmark: {{ groups: [{{ name: by_time, partition_by: [created_at] }}] }}\n",
        RENTALS
    );
    let errors = lower_yaml(&yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::UnknownBenchmarkDimension { .. })]
    ));
}

#[test]
fn test_pop_inputs_on_models_without_time_dimensions_are_rejected() {
    let yaml = format!(
        "{}  - name: net\n    type: derived\n    model: rentals\n    expr: revenue - capacity_total\n    pop: {{ comparisons: [py] }}\n",
        RENTALS
    );
    let errors = lower_yaml(&yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::UnanchoredPopInput { metric, model })]
            if metric == "net" && model == "facilities"
    ));
    assert!(errors[0].to_string().contains("Metric 'net'"));
}

#[test]
fn test_pop_inputs_are_anchored_per_model() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
  dimensions:
    - { name: created_at, type: time, expr: created_at }
    - { name: closed_at, type: time, expr: closed_at }
  measures:
    - { name: amount, agg: sum }
- kind: semantic_model
  name: payments
  entities:
    - { name: payment, type: primary, expr: payment_id }
  dimensions:
    - { name: paid_at, type: time, expr: paid_at }
  measures:
    - { name: paid, agg: sum }
- { kind: metric, name: revenue, type: simple, measure: amount }
- { kind: metric, name: paid_total, type: simple, measure: paid }
- kind: metric
  name: outstanding
  type: derived
  model: rentals
  expr: revenue - paid_total
  pop: { comparisons: [pm], date_dimension: closed_at }
"#;
    let out = lower_yaml(yaml).unwrap();
    let pop = out.models.metric("outstanding").unwrap().pop.clone().unwrap();
    assert_eq!(pop.date_dimension, "closed_at");
    assert_eq!(pop.anchor("rentals"), Some("closed_at"));
    assert_eq!(pop.anchor("payments"), Some("paid_at"));
    assert_eq!(pop.anchor("facilities"), None);
}

#[test]
fn test_multiple_complete_entities_rejected() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
    - { name: facility, type: foreign, expr: facility_id, complete: true }
    - { name: customer, type: foreign, expr: customer_id, complete: true }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::MultipleCompleteEntities { model, entities })]
            if model == "rentals"
                && entities == &vec!["facility".to_string(), "customer".to_string()]
    ));
}

#[test]
fn test_dimension_with_expr_and_variants_rejected() {
    let yaml = r#"
- kind: semantic_model
  name: rentals
  entities:
    - { name: rental, type: primary, expr: rental_id }
  dimensions:
    - name: created_at
      type: time
      expr: created_at
      variants: { utc: created_at_utc, local: created_at_local }
"#;
    let errors = lower_yaml(yaml).unwrap_err();
    assert!(matches!(
        errors.as_slice(),
        [BuildError::Validation(ValidationError::ConflictingDimensionSql { path })]
            if path == "rentals.created_at"
    ));
}
