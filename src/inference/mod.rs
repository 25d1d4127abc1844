//! Join inference.
//!
//! Joins are derived from entities declared directly on an explore's fact
//! model. For a fact entity named `e`:
//!
//! | fact entity      | other model's `e`  | relationship  | default expose            |
//! |------------------|--------------------|---------------|---------------------------|
//! | foreign          | primary            | many_to_one   | all                       |
//! | primary / unique | primary / unique   | one_to_one    | all                       |
//! | primary          | foreign            | one_to_many   | all if `complete`, else dimensions only |
//!
//! A model reached by several rules keeps the first row of the table that
//! matched (and, within a rule, the first fact entity). Only one hop is
//! considered: entities of joined models never produce further joins.
//!
//! Explicit join overrides always win over the inferred relationship and
//! expose level.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::model::{
    Entity, EntityKind, ExploreConfig, ExposeLevel, InferredJoin, ModelSet, ProcessedModel,
    Relationship,
};
use crate::sql::{self, Dialect};
use crate::validation::ResolutionError;

/// Infer the joins of one explore using the default dialect and no view
/// prefix.
pub fn infer_joins(
    explore: &ExploreConfig,
    models: &ModelSet,
) -> Result<Vec<InferredJoin>, Vec<ResolutionError>> {
    JoinInference::new(models).infer(explore)
}

/// Add a default explore (named after the model) for every fact model that
/// no declared explore is rooted at.
pub fn with_default_explores(explores: &[ExploreConfig], fact_models: &[String]) -> Vec<ExploreConfig> {
    let mut all = explores.to_vec();
    for model in fact_models {
        let covered = all
            .iter()
            .any(|e| &e.fact_model == model || &e.name == model);
        if !covered {
            all.push(ExploreConfig::for_fact(model));
        }
    }
    all
}

/// Join inference over a fixed model set.
#[derive(Debug, Clone, Copy)]
pub struct JoinInference<'a> {
    models: &'a ModelSet,
    dialect: Dialect,
    view_prefix: &'a str,
}

/// Rule precedence; lower wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rule {
    Forward,
    OneToOne,
    Reverse,
}

#[derive(Debug, Clone)]
struct Candidate<'a> {
    rule: Rule,
    /// Position of the matched entity on the fact model.
    entity_index: usize,
    fact_entity: &'a Entity,
    target: &'a ProcessedModel,
    target_entity: &'a Entity,
    relationship: Relationship,
    expose_level: ExposeLevel,
}

impl<'a> JoinInference<'a> {
    pub fn new(models: &'a ModelSet) -> Self {
        Self {
            models,
            dialect: Dialect::default(),
            view_prefix: "",
        }
    }

    /// Dialect `sql_on` operands are rendered for.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Prefix of generated view names, used to qualify `sql_on`.
    pub fn with_view_prefix(mut self, prefix: &'a str) -> Self {
        self.view_prefix = prefix;
        self
    }

    /// Infer every explore, collecting errors from all of them.
    pub fn infer_all(
        &self,
        explores: &[ExploreConfig],
    ) -> Result<Vec<Vec<InferredJoin>>, Vec<ResolutionError>> {
        let results: Vec<_> = explores.par_iter().map(|e| self.infer(e)).collect();

        let mut joins = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(j) => joins.push(j),
                Err(e) => errors.extend(e),
            }
        }
        if errors.is_empty() {
            Ok(joins)
        } else {
            Err(errors)
        }
    }

    /// Infer the joins of one explore, ordered by fact entity declaration
    /// order, then target model name.
    pub fn infer(&self, explore: &ExploreConfig) -> Result<Vec<InferredJoin>, Vec<ResolutionError>> {
        let Some(fact) = self.models.get(&explore.fact_model) else {
            return Err(vec![ResolutionError::UnknownFactModel {
                explore: explore.name.clone(),
                model: explore.fact_model.clone(),
            }]);
        };

        let mut errors = Vec::new();
        for model in &explore.exclusions {
            if !self.models.contains(model) {
                errors.push(ResolutionError::UnknownJoinTarget {
                    explore: explore.name.clone(),
                    model: model.clone(),
                    context: "exclusions".to_string(),
                });
            }
        }
        for join in &explore.joins {
            if !self.models.contains(&join.model) {
                errors.push(ResolutionError::UnknownJoinTarget {
                    explore: explore.name.clone(),
                    model: join.model.clone(),
                    context: "joins".to_string(),
                });
            }
        }

        // Best candidate per target model.
        let mut best: BTreeMap<&str, Candidate> = BTreeMap::new();
        for candidate in self.candidates(fact) {
            if explore.exclusions.contains(&candidate.target.name) {
                continue;
            }
            let key = (candidate.rule, candidate.entity_index);
            match best.get(candidate.target.name.as_str()) {
                Some(existing) if (existing.rule, existing.entity_index) <= key => {}
                _ => {
                    let target: &ProcessedModel = candidate.target;
                    best.insert(target.name.as_str(), candidate);
                }
            }
        }

        for join in &explore.joins {
            if self.models.contains(&join.model) && !best.contains_key(join.model.as_str()) {
                errors.push(ResolutionError::NoJoinPath {
                    explore: explore.name.clone(),
                    model: join.model.clone(),
                });
            }
        }

        let mut ordered: Vec<Candidate> = best.into_values().collect();
        ordered.sort_by(|a, b| {
            a.entity_index
                .cmp(&b.entity_index)
                .then_with(|| a.target.name.cmp(&b.target.name))
        });

        let mut joins = Vec::with_capacity(ordered.len());
        for candidate in ordered {
            let overridden = explore.override_for(&candidate.target.name);
            let relationship = overridden
                .and_then(|o| o.relationship)
                .unwrap_or(candidate.relationship);
            let expose_level = overridden
                .and_then(|o| o.expose)
                .unwrap_or(candidate.expose_level);

            match self.sql_on(fact, &candidate) {
                Ok(sql_on) => {
                    debug!(
                        explore = %explore.name,
                        to = %candidate.target.name,
                        relationship = relationship.as_lookml(),
                        "inferred join"
                    );
                    joins.push(InferredJoin {
                        from_model: fact.name.clone(),
                        to_model: candidate.target.name.clone(),
                        entity: candidate.fact_entity.name.clone(),
                        relationship,
                        expose_level,
                        sql_on,
                    });
                }
                Err(err) => errors.push(err.with_explore(&explore.name)),
            }
        }

        if errors.is_empty() {
            Ok(joins)
        } else {
            Err(errors)
        }
    }

    fn candidates(&self, fact: &'a ProcessedModel) -> Vec<Candidate<'a>> {
        let mut out = Vec::new();
        for (entity_index, fact_entity) in fact.entities.iter().enumerate() {
            for target in self.models.iter().filter(|m| m.name != fact.name) {
                let Some(target_entity) = target.entity(&fact_entity.name) else {
                    continue;
                };
                let matched = match (fact_entity.kind, target_entity.kind) {
                    (EntityKind::Foreign, EntityKind::Primary) => {
                        Some((Rule::Forward, Relationship::ManyToOne, ExposeLevel::All))
                    }
                    (fact_kind, target_kind)
                        if fact_kind.is_unique_key() && target_kind.is_unique_key() =>
                    {
                        Some((Rule::OneToOne, Relationship::OneToOne, ExposeLevel::All))
                    }
                    (EntityKind::Primary, EntityKind::Foreign) => {
                        let expose = if target_entity.complete {
                            ExposeLevel::All
                        } else {
                            ExposeLevel::DimensionsOnly
                        };
                        Some((Rule::Reverse, Relationship::OneToMany, expose))
                    }
                    _ => None,
                };
                if let Some((rule, relationship, expose_level)) = matched {
                    out.push(Candidate {
                        rule,
                        entity_index,
                        fact_entity,
                        target,
                        target_entity,
                        relationship,
                        expose_level,
                    });
                }
            }
        }
        out
    }

    fn sql_on(&self, fact: &ProcessedModel, candidate: &Candidate) -> Result<String, JoinKeyError> {
        let left = self.operand(fact, candidate.fact_entity)?;
        let right = self.operand(candidate.target, candidate.target_entity)?;
        Ok(format!("{} = {}", left, right))
    }

    fn operand(&self, model: &ProcessedModel, entity: &Entity) -> Result<String, JoinKeyError> {
        let alias = format!("{}{}", self.view_prefix, model.name);
        sql::prepare(&entity.expr, model.data_model.dialect, self.dialect, &alias).map_err(|e| {
            JoinKeyError {
                model: model.name.clone(),
                message: e.to_string(),
            }
        })
    }
}

/// A join key expression that could not be rendered.
struct JoinKeyError {
    model: String,
    message: String,
}

impl JoinKeyError {
    fn with_explore(self, explore: &str) -> ResolutionError {
        ResolutionError::InvalidJoinKey {
            explore: explore.to_string(),
            model: self.model,
            message: self.message,
        }
    }
}
