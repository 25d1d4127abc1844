//! Fully resolved, target-agnostic models handed to the renderers.

use std::collections::BTreeMap;

use crate::model::data_model::DataModel;
use crate::model::dimension::Dimension;
use crate::model::entity::Entity;
use crate::model::measure::Measure;
use crate::model::metric::Metric;

/// Time dimensions eligible for dynamic date switching.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSelectorConfig {
    pub dimensions: Vec<String>,
}

/// One semantic model after validation and variant expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedModel {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    pub data_model: DataModel,
    pub entities: Vec<Entity>,
    pub dimensions: Vec<Dimension>,
    pub measures: Vec<Measure>,
    /// Metrics owned by this model, in declaration order.
    pub metrics: Vec<Metric>,
    pub date_selector: Option<DateSelectorConfig>,
    /// Anchor for period-over-period when a metric does not name one.
    pub default_time_dimension: Option<String>,
}

impl ProcessedModel {
    pub fn primary_entity(&self) -> Option<&Entity> {
        self.entities.iter().find(|e| e.is_primary())
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn time_dimensions(&self) -> impl Iterator<Item = &Dimension> {
        self.dimensions.iter().filter(|d| d.is_time())
    }
}

/// Every processed model of a compile run, keyed (and iterated) by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelSet {
    models: BTreeMap<String, ProcessedModel>,
}

impl ModelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: ProcessedModel) {
        self.models.insert(model.name.clone(), model);
    }

    pub fn get(&self, name: &str) -> Option<&ProcessedModel> {
        self.models.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessedModel> {
        self.models.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Find a metric by name across all models.
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.models.values().find_map(|m| m.metric(name))
    }

    /// Every metric, ordered by model name then declaration order.
    pub fn metrics(&self) -> impl Iterator<Item = &Metric> {
        self.models.values().flat_map(|m| m.metrics.iter())
    }
}

impl FromIterator<ProcessedModel> for ModelSet {
    fn from_iter<T: IntoIterator<Item = ProcessedModel>>(iter: T) -> Self {
        let mut set = ModelSet::new();
        for model in iter {
            set.insert(model);
        }
        set
    }
}
