//! Explore configuration and inferred joins.

use crate::model::types::{ExposeLevel, Relationship};

/// An explore rooted at a fact model.
#[derive(Debug, Clone, PartialEq)]
pub struct ExploreConfig {
    pub name: String,
    /// Model serving as the join root.
    pub fact_model: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub joins: Vec<JoinOverride>,
    /// Models never joined into this explore.
    pub exclusions: Vec<String>,
}

impl ExploreConfig {
    /// Default explore for a model designated as a fact.
    pub fn for_fact(model: &str) -> Self {
        Self {
            name: model.to_string(),
            fact_model: model.to_string(),
            label: None,
            description: None,
            joins: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    pub fn override_for(&self, model: &str) -> Option<&JoinOverride> {
        self.joins.iter().find(|j| j.model == model)
    }
}

/// Explicit settings for one joined model; always wins over inference.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOverride {
    pub model: String,
    pub expose: Option<ExposeLevel>,
    pub relationship: Option<Relationship>,
}

/// A join derived from matching entities.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredJoin {
    pub from_model: String,
    pub to_model: String,
    /// Entity both sides were matched on.
    pub entity: String,
    pub relationship: Relationship,
    pub expose_level: ExposeLevel,
    /// `{from_model}.{expr} = {to_model}.{expr}`
    pub sql_on: String,
}
