//! Precedence chains.
//!
//! Each setting that can be given at several levels is resolved here once,
//! so the resolved value sits on the domain object and renderers never look
//! at the chain again.

use std::collections::BTreeMap;

use inflector::Inflector;

use crate::model::group::GroupPath;
use crate::model::types::PopOutput;

/// Explicit label, else the title-cased name (`created_at` → `Created At`).
pub fn label(explicit: Option<&str>, name: &str) -> String {
    match explicit {
        Some(label) => label.to_string(),
        None => name.to_title_case(),
    }
}

/// Dimension setting > model default > generator option.
pub fn convert_tz(dimension: Option<bool>, model: Option<bool>, generator: bool) -> bool {
    dimension.or(model).unwrap_or(generator)
}

/// Metric setting > measure setting.
pub fn format(metric: Option<&str>, measure: Option<&str>) -> Option<String> {
    metric.or(measure).map(str::to_string)
}

/// Metric group > measure group.
pub fn group(metric: Option<&GroupPath>, measure: Option<&GroupPath>) -> Option<GroupPath> {
    metric.or(measure).cloned()
}

/// Metric outputs > generator default > `[previous]`. Duplicates are
/// dropped, keeping the first occurrence.
pub fn pop_outputs(metric: Option<&[PopOutput]>, generator: &[PopOutput]) -> Vec<PopOutput> {
    let chosen: &[PopOutput] = match metric {
        Some(outputs) if !outputs.is_empty() => outputs,
        _ if !generator.is_empty() => generator,
        _ => &[PopOutput::Previous],
    };
    dedup(chosen)
}

/// Metric date dimension > model `agg_time_dimension` > first time
/// dimension of the model.
pub fn pop_date_dimension<'a>(
    metric: Option<&'a str>,
    model_default: Option<&'a str>,
    first_time_dimension: Option<&'a str>,
) -> Option<&'a str> {
    metric.or(model_default).or(first_time_dimension)
}

/// Explicit primary variant, else the first variant name in sorted order.
pub fn primary_variant(explicit: Option<&str>, variants: &BTreeMap<String, String>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| variants.keys().next().cloned())
}

/// Remove duplicates, keeping declaration order.
pub fn dedup<T: Copy + PartialEq>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(item) {
            out.push(*item);
        }
    }
    out
}
