//! Raw declaration records, exactly as authored.
//!
//! Field values are typed where the type is purely lexical (enums such as
//! aggregation or granularity); everything that needs cross-referencing
//! stays a string.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::types::{
    Aggregation, BenchmarkAgg, DataType, EntityKind, ExposeLevel, Granularity, PopComparison,
    PopOutput, Relationship,
};
use crate::sql::Dialect;

/// One top-level declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Declaration {
    DataModel(RawDataModel),
    SemanticModel(RawSemanticModel),
    Metric(RawMetric),
    Explore(RawExplore),
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::DataModel(d) => &d.name,
            Declaration::SemanticModel(d) => &d.name,
            Declaration::Metric(d) => &d.name,
            Declaration::Explore(d) => &d.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Declaration::DataModel(_) => "data_model",
            Declaration::SemanticModel(_) => "semantic_model",
            Declaration::Metric(_) => "metric",
            Declaration::Explore(_) => "explore",
        }
    }
}

/// Sectioned document shape.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sections {
    #[serde(default)]
    pub data_models: Vec<RawDataModel>,
    #[serde(default)]
    pub semantic_models: Vec<RawSemanticModel>,
    #[serde(default)]
    pub metrics: Vec<RawMetric>,
    #[serde(default)]
    pub explores: Vec<RawExplore>,
}

impl Sections {
    pub fn into_declarations(self) -> Vec<Declaration> {
        let mut out = Vec::with_capacity(
            self.data_models.len()
                + self.semantic_models.len()
                + self.metrics.len()
                + self.explores.len(),
        );
        out.extend(self.data_models.into_iter().map(Declaration::DataModel));
        out.extend(self.semantic_models.into_iter().map(Declaration::SemanticModel));
        out.extend(self.metrics.into_iter().map(Declaration::Metric));
        out.extend(self.explores.into_iter().map(Declaration::Explore));
        out
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDataModel {
    pub name: String,
    pub catalog: Option<String>,
    pub schema: Option<String>,
    /// Defaults to `name`.
    pub table: Option<String>,
    pub dialect: Option<Dialect>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSemanticModel {
    pub name: String,
    /// Backing data model; defaults to `name`.
    pub data_model: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub defaults: Option<RawModelDefaults>,
    #[serde(default)]
    pub entities: Vec<RawEntity>,
    #[serde(default)]
    pub dimensions: Vec<RawDimension>,
    #[serde(default)]
    pub measures: Vec<RawMeasure>,
    pub date_selector: Option<RawDateSelector>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawModelDefaults {
    pub agg_time_dimension: Option<String>,
    pub convert_tz: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Defaults to `name`.
    pub expr: Option<String>,
    #[serde(default)]
    pub complete: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Categorical,
    Time,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDimension {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimensionType,
    pub expr: Option<String>,
    pub variants: Option<BTreeMap<String, String>>,
    pub primary_variant: Option<String>,
    pub granularity: Option<Granularity>,
    pub data_type: Option<DataType>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    pub group: Option<String>,
    pub convert_tz: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMeasure {
    pub name: String,
    pub agg: Aggregation,
    /// Defaults to `name`.
    pub expr: Option<String>,
    pub format: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDateSelector {
    /// Empty means every time dimension of the model.
    #[serde(default)]
    pub dimensions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Simple,
    Derived,
    Ratio,
}

/// A filter written as one condition or a list of ANDed conditions.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FilterSpec {
    One(String),
    Many(Vec<String>),
}

impl FilterSpec {
    pub fn into_conditions(self) -> Vec<String> {
        match self {
            FilterSpec::One(condition) => vec![condition],
            FilterSpec::Many(conditions) => conditions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMetric {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricType,
    pub measure: Option<String>,
    pub expr: Option<String>,
    /// Names referenced by a derived expression; inferred from `expr` when
    /// omitted.
    pub metrics: Option<Vec<String>>,
    pub numerator: Option<String>,
    pub denominator: Option<String>,
    /// Owning semantic model.
    pub model: Option<String>,
    pub filter: Option<FilterSpec>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub group: Option<String>,
    pub format: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    pub pop: Option<RawPop>,
    pub benchmark: Option<RawBenchmark>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPop {
    pub comparisons: Vec<PopComparison>,
    pub outputs: Option<Vec<PopOutput>>,
    pub date_dimension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBenchmark {
    pub groups: Vec<RawBenchmarkGroup>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBenchmarkGroup {
    pub name: String,
    #[serde(default)]
    pub partition_by: Vec<String>,
    #[serde(default)]
    pub agg: BenchmarkAgg,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExplore {
    pub name: String,
    pub fact_model: String,
    pub label: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub joins: Vec<RawJoin>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJoin {
    pub model: String,
    pub expose: Option<ExposeLevel>,
    pub relationship: Option<Relationship>,
}
