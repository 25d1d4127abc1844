//! Business-level metrics and their expanded variants.

use std::collections::BTreeMap;

use crate::model::group::GroupPath;
use crate::model::types::{BenchmarkAgg, PopComparison, PopOutput};

/// A metric owned by exactly one semantic model.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: String,
    /// Owning semantic model.
    pub model: String,
    pub kind: MetricKind,
    pub label: String,
    pub description: Option<String>,
    pub group: Option<GroupPath>,
    pub format: Option<String>,
    pub hidden: bool,
    pub filter: Option<Filter>,
    pub pop: Option<PopConfig>,
    pub benchmark: Option<BenchmarkConfig>,
    /// Expanded variants; always starts with the base variant.
    pub variants: Vec<MetricVariant>,
}

/// How a metric is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    /// Direct aggregate of a measure on the owning model.
    Simple { measure: String },
    /// Scalar expression over other metrics or measures.
    Derived { expr: String, refs: Vec<FieldRef> },
    /// `numerator / denominator`.
    Ratio {
        numerator: FieldRef,
        denominator: FieldRef,
    },
}

impl MetricKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MetricKind::Simple { .. } => "simple",
            MetricKind::Derived { .. } => "derived",
            MetricKind::Ratio { .. } => "ratio",
        }
    }

    /// Derived and ratio metrics.
    pub fn is_complex(&self) -> bool {
        !matches!(self, MetricKind::Simple { .. })
    }

    /// References of a complex metric, in declaration order.
    pub fn references(&self) -> Vec<&FieldRef> {
        match self {
            MetricKind::Simple { .. } => Vec::new(),
            MetricKind::Derived { refs, .. } => refs.iter().collect(),
            MetricKind::Ratio {
                numerator,
                denominator,
            } => vec![numerator, denominator],
        }
    }
}

/// A resolved reference from a complex metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub name: String,
    /// Model owning the referenced metric or measure.
    pub model: String,
    pub target: RefTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefTarget {
    Metric,
    Measure,
}

/// Row-level condition applied to a metric's input.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub conditions: Vec<String>,
}

impl Filter {
    /// Conditions joined with `AND`; each is parenthesised when there is
    /// more than one.
    pub fn sql(&self) -> String {
        match self.conditions.as_slice() {
            [single] => single.clone(),
            many => many
                .iter()
                .map(|c| format!("({})", c))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }
}

/// Period-over-period configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PopConfig {
    pub comparisons: Vec<PopComparison>,
    pub outputs: Vec<PopOutput>,
    /// Time dimension the comparison is anchored on (resolved).
    pub date_dimension: String,
    /// Time dimension anchoring the inputs read from each model, the owner
    /// included (resolved).
    pub anchors: BTreeMap<String, String>,
}

impl PopConfig {
    /// Time dimension anchoring inputs read from `model`.
    pub fn anchor(&self, model: &str) -> Option<&str> {
        self.anchors.get(model).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkConfig {
    pub groups: Vec<BenchmarkParams>,
}

/// One benchmark slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BenchmarkParams {
    pub group: String,
    /// Categorical dimensions the window is partitioned by; empty means the
    /// whole result set.
    pub partition_by: Vec<String>,
    pub agg: BenchmarkAgg,
}

/// One concrete rendering of a metric.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricVariant {
    pub kind: VariantKind,
    /// Appended to the metric name; empty for the base variant.
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantKind {
    Base,
    Pop {
        comparison: PopComparison,
        output: PopOutput,
    },
    Benchmark {
        params: BenchmarkParams,
    },
}

impl Metric {
    /// Field name of a variant: `{metric.name}{suffix}`.
    pub fn variant_name(&self, variant: &MetricVariant) -> String {
        format!("{}{}", self.name, variant.suffix)
    }

    pub fn pop_variants(&self) -> impl Iterator<Item = &MetricVariant> {
        self.variants
            .iter()
            .filter(|v| matches!(v.kind, VariantKind::Pop { .. }))
    }

    pub fn benchmark_variants(&self) -> impl Iterator<Item = &MetricVariant> {
        self.variants
            .iter()
            .filter(|v| matches!(v.kind, VariantKind::Benchmark { .. }))
    }

    pub fn has_pop(&self) -> bool {
        self.pop.is_some()
    }
}
