//! LookML rendering.
//!
//! Renderers are pure functions from domain objects to LookML text. They
//! share a [`RenderContext`] holding the model set, the generator options and
//! the measure usage analysis every metric renderer needs.
//!
//! - [`format`] - LookML writer and string helpers
//! - [`labels`] - Hierarchical field labels
//! - [`dimension`] - Base views (entities, dimensions, dimension groups)
//! - [`measure`] - Metrics refinements (measures, metrics, benchmarks)
//! - [`pop`] - Period-over-period strategies
//! - [`calendar`] - Per-explore calendar views
//! - [`explore`] - Explore files

pub mod calendar;
pub mod dimension;
pub mod explore;
pub mod format;
pub mod labels;
pub mod measure;
pub mod pop;

pub use format::{Indent, IndentWriter};
pub use pop::{DynamicPop, PopRenderer, PopStrategy, StaticPop};

use std::collections::{BTreeMap, BTreeSet};

use crate::generate::{GenerationError, GeneratorOptions};
use crate::model::{Filter, MetricKind, ModelSet, ProcessedModel, RefTarget};
use crate::sql::{self, Dialect, TABLE_REF};

static NO_USAGE: ModelUsage = ModelUsage {
    exposed: BTreeMap::new(),
    hidden: BTreeSet::new(),
    filtered: Vec::new(),
};

/// Shared, read-only state for one rendering run.
#[derive(Debug)]
pub struct RenderContext<'a> {
    pub models: &'a ModelSet,
    pub options: &'a GeneratorOptions,
    usage: BTreeMap<String, ModelUsage>,
}

impl<'a> RenderContext<'a> {
    pub fn new(models: &'a ModelSet, options: &'a GeneratorOptions) -> Self {
        Self {
            models,
            options,
            usage: ModelUsage::analyze(models),
        }
    }

    /// Target SQL dialect.
    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    pub fn view_name(&self, model: &str) -> String {
        format!("{}{}", self.options.view_prefix, model)
    }

    pub fn explore_name(&self, explore: &str) -> String {
        format!("{}{}", self.options.explore_prefix, explore)
    }

    pub fn calendar_view_name(&self, explore: &str) -> String {
        format!("{}_calendar", self.explore_name(explore))
    }

    pub fn usage(&self, model: &str) -> &ModelUsage {
        self.usage.get(model).unwrap_or(&NO_USAGE)
    }

    /// Reference to `field` of `model` from a field of `from_model`.
    pub fn field_ref(&self, from_model: &str, model: &str, field: &str) -> String {
        if from_model == model {
            format!("${{{}}}", field)
        } else {
            format!("${{{}.{}}}", self.view_name(model), field)
        }
    }

    /// A model expression transpiled to the target dialect and qualified
    /// with `${TABLE}`.
    pub fn sql(&self, model: &ProcessedModel, path: &str, expr: &str) -> Result<String, GenerationError> {
        self.sql_for_alias(model, path, expr, TABLE_REF)
    }

    /// Like [`RenderContext::sql`], qualified with an explicit alias.
    pub fn sql_for_alias(
        &self,
        model: &ProcessedModel,
        path: &str,
        expr: &str,
        alias: &str,
    ) -> Result<String, GenerationError> {
        sql::prepare(expr, model.data_model.dialect, self.dialect(), alias).map_err(|source| {
            GenerationError::Sql {
                field: path.to_string(),
                source,
            }
        })
    }

    /// Row conditions ANDed together and rendered like [`RenderContext::sql`].
    /// `None` when there are no conditions.
    pub fn condition(
        &self,
        model: &ProcessedModel,
        path: &str,
        conditions: &[String],
    ) -> Result<Option<String>, GenerationError> {
        if conditions.is_empty() {
            return Ok(None);
        }
        let joined = Filter {
            conditions: conditions.to_vec(),
        }
        .sql();
        self.sql(model, path, &joined).map(Some)
    }

    /// Model lookup that reports a missing model as an invariant violation.
    pub fn model(&self, name: &str, context: &str) -> Result<&'a ProcessedModel, GenerationError> {
        self.models.get(name).ok_or_else(|| GenerationError::UnknownField {
            context: context.to_string(),
            field: name.to_string(),
        })
    }
}

/// How a model's measures are used by metrics across the whole model set.
///
/// A measure is rendered only when a complex metric needs it and no
/// unfiltered simple metric already exposes it; filtered complex metrics get
/// their own filtered aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelUsage {
    /// Measure → the unfiltered simple metric exposing it.
    pub exposed: BTreeMap<String, String>,
    /// Measures rendered as hidden fields.
    pub hidden: BTreeSet<String>,
    /// Filtered aggregates feeding filtered complex metrics.
    pub filtered: Vec<FilteredInput>,
}

/// Hidden aggregate of a measure under a complex metric's filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredInput {
    /// `{metric}__{reference}`
    pub field: String,
    pub measure: String,
    pub conditions: Vec<String>,
}

impl ModelUsage {
    /// Usage of every model in the set.
    pub fn analyze(models: &ModelSet) -> BTreeMap<String, ModelUsage> {
        let mut usage: BTreeMap<String, ModelUsage> = models
            .names()
            .map(|name| (name.to_string(), ModelUsage::default()))
            .collect();

        for metric in models.metrics() {
            if let (MetricKind::Simple { measure }, None) = (&metric.kind, &metric.filter) {
                if let Some(entry) = usage.get_mut(&metric.model) {
                    entry
                        .exposed
                        .entry(measure.clone())
                        .or_insert_with(|| metric.name.clone());
                }
            }
        }

        for metric in models.metrics() {
            for field in metric.kind.references() {
                match (&metric.filter, field.target) {
                    (None, RefTarget::Measure) => {
                        if let Some(entry) = usage.get_mut(&field.model) {
                            if !entry.exposed.contains_key(&field.name) {
                                entry.hidden.insert(field.name.clone());
                            }
                        }
                    }
                    (None, RefTarget::Metric) => {}
                    (Some(filter), target) => {
                        let (measure, mut conditions) = match target {
                            RefTarget::Measure => (field.name.clone(), Vec::new()),
                            RefTarget::Metric => match models.metric(&field.name) {
                                Some(referenced) => match &referenced.kind {
                                    MetricKind::Simple { measure } => (
                                        measure.clone(),
                                        referenced
                                            .filter
                                            .as_ref()
                                            .map(|f| f.conditions.clone())
                                            .unwrap_or_default(),
                                    ),
                                    _ => continue,
                                },
                                None => continue,
                            },
                        };
                        conditions.extend(filter.conditions.iter().cloned());
                        let input = FilteredInput {
                            field: filtered_field_name(&metric.name, &field.name),
                            measure,
                            conditions,
                        };
                        if let Some(entry) = usage.get_mut(&field.model) {
                            if !entry.filtered.iter().any(|f| f.field == input.field) {
                                entry.filtered.push(input);
                            }
                        }
                    }
                }
            }
        }

        usage
    }

    /// Field exposing `measure`: its simple metric, or the measure's own
    /// hidden field.
    pub fn measure_field<'m>(&'m self, measure: &'m str) -> &'m str {
        self.exposed.get(measure).map(String::as_str).unwrap_or(measure)
    }

    pub fn is_empty(&self) -> bool {
        self.hidden.is_empty() && self.filtered.is_empty()
    }
}

/// Name of the filtered aggregate a filtered complex metric uses for one of
/// its references.
pub fn filtered_field_name(metric: &str, reference: &str) -> String {
    format!("{}__{}", metric, reference)
}
