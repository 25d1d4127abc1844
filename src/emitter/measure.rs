//! Metrics refinements: hidden measures, metrics and benchmark variants.

use std::collections::HashMap;

use inflector::cases::titlecase::to_title_case;

use crate::emitter::format::{is_plain_identifier, IndentWriter};
use crate::emitter::labels::emit_labels;
use crate::emitter::{filtered_field_name, RenderContext};
use crate::generate::GenerationError;
use crate::model::{
    Aggregation, BenchmarkParams, FieldRef, Measure, Metric, MetricKind, ProcessedModel,
    RefTarget, VariantKind,
};
use crate::sql;

/// Render `views/{model}.metrics.view.lkml`, or `None` when the model has
/// neither metrics nor measures used by other metrics.
pub fn render_metrics_view(
    model: &ProcessedModel,
    ctx: &RenderContext,
) -> Result<Option<String>, GenerationError> {
    let usage = ctx.usage(&model.name);
    if model.metrics.is_empty() && usage.is_empty() {
        return Ok(None);
    }

    let mut w = IndentWriter::for_file();
    w.open_block("view", &format!("+{}", ctx.view_name(&model.name)));

    for measure in model.measures.iter().filter(|m| usage.hidden.contains(&m.name)) {
        w.blank_line();
        w.open_block("measure", &measure.name);
        emit_labels(&mut w, &measure.label, measure.group.as_ref(), measure.description.as_deref());
        w.property("type", measure.agg.lookml_type());
        w.sql_property("sql", &measure_value(ctx, model, measure)?);
        emit_format(&mut w, measure.format.as_deref());
        w.yesno_property("hidden", true);
        w.close_block();
    }

    for input in &usage.filtered {
        let measure = lookup_measure(model, &input.measure, &input.field)?;
        let path = format!("{}.{}", model.name, input.field);
        let condition = ctx.condition(model, &path, &input.conditions)?;
        w.blank_line();
        w.open_block("measure", &input.field);
        w.property("type", measure.agg.lookml_type());
        w.sql_property("sql", &guarded(&measure_value(ctx, model, measure)?, condition.as_deref()));
        w.yesno_property("hidden", true);
        w.close_block();
    }

    for metric in &model.metrics {
        for variant in &metric.variants {
            match &variant.kind {
                VariantKind::Base => emit_metric(&mut w, model, metric, ctx)?,
                VariantKind::Benchmark { params } => {
                    emit_benchmark(&mut w, metric, &metric.variant_name(variant), params)
                }
                // Rendered by the period-over-period strategy.
                VariantKind::Pop { .. } => {}
            }
        }
    }

    w.close_block();
    Ok(Some(w.into_string()))
}

fn emit_metric(
    w: &mut IndentWriter,
    model: &ProcessedModel,
    metric: &Metric,
    ctx: &RenderContext,
) -> Result<(), GenerationError> {
    w.blank_line();
    w.open_block("measure", &metric.name);
    emit_labels(w, &metric.label, metric.group.as_ref(), metric.description.as_deref());
    match &metric.kind {
        MetricKind::Simple { measure } => {
            let measure = lookup_measure(model, measure, &metric.name)?;
            let (lookml_type, sql) = simple_metric_sql(ctx, model, metric, measure, None)?;
            w.property("type", lookml_type);
            w.sql_property("sql", &sql);
        }
        MetricKind::Derived { .. } | MetricKind::Ratio { .. } => {
            w.property("type", "number");
            w.sql_property("sql", &complex_sql(ctx, metric)?);
        }
    }
    emit_format(w, metric.format.as_deref());
    if metric.hidden {
        w.yesno_property("hidden", true);
    }
    w.close_block();
    Ok(())
}

fn emit_benchmark(w: &mut IndentWriter, metric: &Metric, name: &str, params: &BenchmarkParams) {
    let partition = params
        .partition_by
        .iter()
        .map(|d| format!("${{{}}}", d))
        .collect::<Vec<_>>()
        .join(", ");
    let window = if partition.is_empty() {
        "OVER ()".to_string()
    } else {
        format!("OVER (PARTITION BY {})", partition)
    };

    w.blank_line();
    w.open_block("measure", name);
    let label = format!("{} ({} Benchmark)", metric.label, to_title_case(&params.group));
    emit_labels(w, &label, metric.group.as_ref(), None);
    w.property("type", "number");
    w.sql_property(
        "sql",
        &format!("{}(${{{}}}) {}", params.agg.sql_function(), metric.name, window),
    );
    emit_format(w, metric.format.as_deref());
    if metric.hidden {
        w.yesno_property("hidden", true);
    }
    w.close_block();
}

/// LookML type and SQL of a simple metric, with an extra rendered row
/// condition ANDed to the metric's own filter.
pub fn simple_metric_sql(
    ctx: &RenderContext,
    model: &ProcessedModel,
    metric: &Metric,
    measure: &Measure,
    extra_condition: Option<&str>,
) -> Result<(&'static str, String), GenerationError> {
    let path = format!("{}.{}", model.name, metric.name);
    let conditions = metric
        .filter
        .as_ref()
        .map(|f| f.conditions.clone())
        .unwrap_or_default();
    let own = ctx.condition(model, &path, &conditions)?;
    let condition = and_conditions(own.as_deref(), extra_condition);
    let value = measure_value(ctx, model, measure)?;
    Ok((measure.agg.lookml_type(), guarded(&value, condition.as_deref())))
}

/// SQL of a derived or ratio metric over its input fields.
pub fn complex_sql(ctx: &RenderContext, metric: &Metric) -> Result<String, GenerationError> {
    complex_sql_with(ctx, metric, |_, name| name.to_string())
}

/// Like [`complex_sql`], reading each input from the field `rename` returns
/// for the input's model and field name. Used to render the same expression
/// over period-restricted inputs.
pub fn complex_sql_with(
    ctx: &RenderContext,
    metric: &Metric,
    rename: impl Fn(&str, &str) -> String,
) -> Result<String, GenerationError> {
    let mut refs: HashMap<&str, String> = HashMap::new();
    for field in metric.kind.references() {
        let (model, name) = input_field(ctx, metric, field);
        refs.insert(
            field.name.as_str(),
            ctx.field_ref(&metric.model, &model, &rename(&model, &name)),
        );
    }
    let resolve = |name: &str| -> Result<String, GenerationError> {
        refs.get(name).cloned().ok_or_else(|| GenerationError::UnknownField {
            context: format!("metric {}", metric.name),
            field: name.to_string(),
        })
    };

    match &metric.kind {
        MetricKind::Ratio {
            numerator,
            denominator,
        } => Ok(format!(
            "1.0 * {} / NULLIF({}, 0)",
            resolve(&numerator.name)?,
            resolve(&denominator.name)?
        )),
        MetricKind::Derived { expr, .. } => {
            let owner = ctx.model(&metric.model, &format!("metric {}", metric.name))?;
            let source = owner.data_model.dialect;
            let sql_error = |source| GenerationError::Sql {
                field: format!("{}.{}", metric.model, metric.name),
                source,
            };
            let substituted = sql::substitute_references(expr, source, |name| refs.get(name).cloned())
                .map_err(sql_error)?;
            match source {
                Some(from) if from != ctx.dialect() => {
                    sql::transpile(&substituted, from, ctx.dialect()).map_err(sql_error)
                }
                _ => Ok(substituted),
            }
        }
        MetricKind::Simple { .. } => Err(GenerationError::UnknownField {
            context: format!("metric {}", metric.name),
            field: "derived expression".to_string(),
        }),
    }
}

/// Model and field name a complex metric reads one of its inputs from.
pub fn input_field(ctx: &RenderContext, metric: &Metric, field: &FieldRef) -> (String, String) {
    if metric.filter.is_some() {
        return (field.model.clone(), filtered_field_name(&metric.name, &field.name));
    }
    match field.target {
        RefTarget::Metric => (field.model.clone(), field.name.clone()),
        RefTarget::Measure => (
            field.model.clone(),
            ctx.usage(&field.model).measure_field(&field.name).to_string(),
        ),
    }
}

/// Value a measure aggregates, ready for `sql:`. Counts become a non-null
/// indicator summed by the measure.
pub fn measure_value(
    ctx: &RenderContext,
    model: &ProcessedModel,
    measure: &Measure,
) -> Result<String, GenerationError> {
    let trimmed = measure.expr.trim();
    if measure.agg == Aggregation::Count && (trimmed == "*" || trimmed == "1") {
        return Ok("1".to_string());
    }
    let path = format!("{}.{}", model.name, measure.name);
    let value = ctx.sql(model, &path, &measure.expr)?;
    Ok(match measure.agg {
        Aggregation::Count => format!("CASE WHEN {} IS NOT NULL THEN 1 ELSE 0 END", value),
        _ => value,
    })
}

/// `CASE WHEN condition THEN value END`, or the value itself.
pub fn guarded(value: &str, condition: Option<&str>) -> String {
    match condition {
        Some(condition) => format!("CASE WHEN {} THEN {} END", condition, value),
        None => value.to_string(),
    }
}

pub fn and_conditions(a: Option<&str>, b: Option<&str>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("({}) AND {}", a, b)),
        (Some(one), None) | (None, Some(one)) => Some(one.to_string()),
        (None, None) => None,
    }
}

/// `value_format_name` for named formats, `value_format` for patterns.
pub fn emit_format(w: &mut IndentWriter, format: Option<&str>) {
    match format {
        Some(name) if is_plain_identifier(name) => w.property("value_format_name", name),
        Some(pattern) => w.string_property("value_format", pattern),
        None => {}
    }
}

pub fn lookup_measure<'m>(
    model: &'m ProcessedModel,
    measure: &str,
    context: &str,
) -> Result<&'m Measure, GenerationError> {
    model.measure(measure).ok_or_else(|| GenerationError::UnknownField {
        context: format!("{}.{}", model.name, context),
        field: measure.to_string(),
    })
}
