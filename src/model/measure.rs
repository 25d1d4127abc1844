// src/model/measure.rs
use crate::model::group::GroupPath;
use crate::model::types::Aggregation;

/// An aggregatable value on a semantic model.
///
/// Measures are never exposed on their own; metrics decide whether a
/// measure is rendered (see the measure renderer).
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub name: String,
    pub agg: Aggregation,
    /// SQL expression aggregated by `agg`
    pub expr: String,
    pub format: Option<String>,
    pub label: String,
    pub description: Option<String>,
    pub group: Option<GroupPath>,
    pub hidden: bool,
}
