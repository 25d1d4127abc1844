//! Validation of semantic declarations.
//!
//! Two error families are produced while building the domain model:
//!
//! - [`ValidationError`]: a declaration is structurally invalid on its own
//!   (duplicate primary entity, dimension with both `expr` and `variants`,
//!   unparseable SQL, ...).
//! - [`ResolutionError`]: a reference cannot be resolved against the rest
//!   of the loaded declarations (unknown measure, unknown fact model, ...).
//!
//! Both always name the offending declaration. Validators here push into a
//! caller-owned error list so that a single run reports every problem.

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::loader::RawEntity;
use crate::model::types::EntityKind;
use crate::sql::{self, Dialect};

/// Structurally invalid input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Duplicate {kind} name '{name}' in {scope}")]
    DuplicateName {
        scope: String,
        kind: String,
        name: String,
    },

    #[error("Semantic model '{model}' declares more than one primary entity: {}", .entities.join(", "))]
    MultiplePrimaryEntities { model: String, entities: Vec<String> },

    #[error("Semantic model '{model}' declares more than one complete foreign entity: {}", .entities.join(", "))]
    MultipleCompleteEntities { model: String, entities: Vec<String> },

    #[error("Entity '{path}' is marked complete but is not a foreign entity")]
    CompleteOnNonForeign { path: String },

    #[error("Dimension '{path}' declares both `expr` and `variants`")]
    ConflictingDimensionSql { path: String },

    #[error("Dimension '{path}' declares neither `expr` nor `variants`")]
    MissingDimensionSql { path: String },

    #[error("Dimension '{path}' declares variants but is not a time dimension")]
    VariantsOnCategorical { path: String },

    #[error("Dimension '{path}' names unknown primary variant '{variant}'")]
    UnknownPrimaryVariant { path: String, variant: String },

    #[error("Invalid SQL in {path}: {message}\n  expression: {expr}")]
    InvalidSql {
        path: String,
        expr: String,
        message: String,
    },

    #[error("{path} references '{dimension}', which is not a time dimension")]
    NotATimeDimension { path: String, dimension: String },

    #[error("Metric '{metric}' has period-over-period settings but its model has no time dimension")]
    MissingPopTimeDimension { metric: String },

    #[error("Metric '{metric}' has period-over-period settings without comparisons")]
    EmptyPopComparisons { metric: String },

    #[error("Metric '{metric}' has period-over-period settings but reads from semantic model '{model}', which has no time dimension to compare periods on")]
    UnanchoredPopInput { metric: String, model: String },

    #[error("Benchmark '{group}' of metric '{metric}' partitions by '{dimension}', which is not a categorical dimension of its model")]
    UnknownBenchmarkDimension {
        metric: String,
        group: String,
        dimension: String,
    },

    #[error("Metric '{metric}' has a filter but references complex metric '{reference}'; filters apply to measures and simple metrics only")]
    FilteredNestedMetric { metric: String, reference: String },

    #[error("Circular dependency between metrics: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    #[error("Metric '{metric}' of type {metric_type} requires `{field}`")]
    MissingMetricField {
        metric: String,
        metric_type: String,
        field: String,
    },
}

/// A reference that does not resolve against the loaded declarations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolutionError {
    #[error("Semantic model '{model}' references undefined data model '{data_model}'")]
    UnknownDataModel { model: String, data_model: String },

    #[error("Metric '{metric}' references undefined measure '{measure}'")]
    UnknownMeasure { metric: String, measure: String },

    #[error("Metric '{metric}' references measure '{measure}', which exists in several models ({}); set `model` explicitly", .models.join(", "))]
    AmbiguousMeasure {
        metric: String,
        measure: String,
        models: Vec<String>,
    },

    #[error("Metric '{metric}' references '{reference}', which is neither a metric nor a measure")]
    UnknownReference { metric: String, reference: String },

    #[error("Metric '{metric}' names undefined semantic model '{model}'")]
    UnknownModel { metric: String, model: String },

    #[error("Cannot determine which semantic model owns metric '{metric}'")]
    UnresolvedOwner { metric: String },

    #[error("Explore '{explore}' references undefined fact model '{model}'")]
    UnknownFactModel { explore: String, model: String },

    #[error("Explore '{explore}' references undefined model '{model}' in {context}")]
    UnknownJoinTarget {
        explore: String,
        model: String,
        context: String,
    },

    #[error("Explore '{explore}' overrides the join to '{model}', but no entity links it to the fact model")]
    NoJoinPath { explore: String, model: String },

    #[error("Explore '{explore}' cannot render the join key of '{model}': {message}")]
    InvalidJoinKey {
        explore: String,
        model: String,
        message: String,
    },
}

/// Anything the domain builder can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Push a `DuplicateName` error for every name seen more than once.
pub fn check_unique_names<'a>(
    scope: &str,
    kind: &str,
    names: impl IntoIterator<Item = &'a str>,
    errors: &mut Vec<BuildError>,
) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            errors.push(
                ValidationError::DuplicateName {
                    scope: scope.to_string(),
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
                .into(),
            );
        }
    }
}

/// Entity rules: at most one primary, at most one complete foreign entity,
/// and `complete` only on foreign entities.
pub fn validate_entities(model: &str, entities: &[RawEntity], errors: &mut Vec<BuildError>) {
    let primaries: Vec<String> = entities
        .iter()
        .filter(|e| e.kind == EntityKind::Primary)
        .map(|e| e.name.clone())
        .collect();
    if primaries.len() > 1 {
        errors.push(
            ValidationError::MultiplePrimaryEntities {
                model: model.to_string(),
                entities: primaries,
            }
            .into(),
        );
    }

    for entity in entities {
        if entity.complete && entity.kind != EntityKind::Foreign {
            errors.push(
                ValidationError::CompleteOnNonForeign {
                    path: format!("{}.{}", model, entity.name),
                }
                .into(),
            );
        }
    }

    let complete: Vec<String> = entities
        .iter()
        .filter(|e| e.complete && e.kind == EntityKind::Foreign)
        .map(|e| e.name.clone())
        .collect();
    if complete.len() > 1 {
        errors.push(
            ValidationError::MultipleCompleteEntities {
                model: model.to_string(),
                entities: complete,
            }
            .into(),
        );
    }
}

/// Parse-check one SQL expression.
pub fn validate_sql(path: &str, expr: &str, dialect: Option<Dialect>) -> Result<(), ValidationError> {
    sql::validate(expr, dialect).map_err(|e| ValidationError::InvalidSql {
        path: path.to_string(),
        expr: expr.to_string(),
        message: e.to_string(),
    })
}

/// Cycles in a dependency graph given as `node -> dependencies`.
///
/// Each cycle is reported once, as its members in sorted order with the
/// first member repeated at the end. Self references count as cycles.
pub fn find_cycles(graph: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut dag: DiGraph<&str, ()> = DiGraph::new();
    let mut indices: BTreeMap<&str, NodeIndex> = BTreeMap::new();

    for name in graph.keys() {
        indices.insert(name.as_str(), dag.add_node(name.as_str()));
    }
    for (name, deps) in graph {
        for dep in deps {
            if let (Some(&from), Some(&to)) = (indices.get(name.as_str()), indices.get(dep.as_str())) {
                dag.add_edge(from, to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&dag)
        .into_iter()
        .filter(|component| {
            component.len() > 1 || dag.contains_edge(component[0], component[0])
        })
        .map(|component| {
            let mut members: Vec<String> =
                component.iter().map(|&idx| dag[idx].to_string()).collect();
            members.sort();
            let first = members[0].clone();
            members.push(first);
            members
        })
        .collect();
    cycles.sort();
    cycles
}
