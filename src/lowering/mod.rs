//! Lowering declarations to the domain model.
//!
//! Raw [`Declaration`]s come straight from the loader with no guarantee that
//! anything they reference exists. Lowering validates them, resolves every
//! reference, applies the precedence chains in [`defaults`], expands metric
//! variants ([`variants`]) and produces one immutable [`ProcessedModel`] per
//! semantic model.
//!
//! Errors are accumulated, never short-circuited: a run reports every
//! independent problem it finds. [`lower`] fails if anything was reported;
//! [`lower_lenient`] drops the failing declarations and returns the rest
//! together with the errors.

pub mod defaults;
pub mod variants;

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::loader::{
    Declaration, DimensionType, MetricType, RawDataModel, RawDateSelector, RawDimension,
    RawEntity, RawExplore, RawMeasure, RawMetric, RawModelDefaults, RawSemanticModel,
};
use crate::model::{
    BenchmarkConfig, BenchmarkParams, DataModel, DateSelectorConfig, Dimension, DimensionKind,
    DimensionSql, Entity, ExploreConfig, FieldRef, Filter, Granularity, GroupPath, JoinOverride,
    Measure, Metric, MetricKind, ModelSet, PopConfig, PopOutput, ProcessedModel, RefTarget,
};
use crate::sql::{self, Dialect};
use crate::validation::{self, BuildError, ResolutionError, ValidationError};

/// Settings that feed the precedence chains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    /// Fallback for time dimensions and models that do not set `convert_tz`.
    pub convert_tz: bool,
    /// Fallback PoP outputs for metrics that do not list any.
    pub default_pop_outputs: Vec<PopOutput>,
}

/// Everything lowering produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoweringOutput {
    pub models: ModelSet,
    /// Explicitly declared explores, in declaration order.
    pub explores: Vec<ExploreConfig>,
}

/// Result of [`lower_lenient`].
#[derive(Debug, Clone, Default)]
pub struct LenientLowering {
    pub output: LoweringOutput,
    pub errors: Vec<BuildError>,
}

/// Lower declarations, failing with every collected error.
pub fn lower(
    declarations: &[Declaration],
    options: &BuildOptions,
) -> Result<LoweringOutput, Vec<BuildError>> {
    let result = lower_lenient(declarations, options);
    if result.errors.is_empty() {
        Ok(result.output)
    } else {
        Err(result.errors)
    }
}

/// Lower declarations, dropping the ones that fail.
pub fn lower_lenient(declarations: &[Declaration], options: &BuildOptions) -> LenientLowering {
    let mut errors = Vec::new();
    let grouped = Grouped::partition(declarations, &mut errors);

    let data_models: BTreeMap<String, DataModel> = grouped
        .data_models
        .iter()
        .map(|raw| (raw.name.clone(), lower_data_model(raw)))
        .collect();

    // Models are independent of each other; build them in parallel and merge
    // in declaration order.
    let built: Vec<Result<ProcessedModel, Vec<BuildError>>> = grouped
        .semantic_models
        .par_iter()
        .map(|raw| lower_semantic_model(raw, &data_models, options))
        .collect();

    let mut models: BTreeMap<String, ProcessedModel> = BTreeMap::new();
    for (raw, result) in grouped.semantic_models.iter().zip(built) {
        match result {
            Ok(model) => {
                debug!(model = %model.name, "lowered semantic model");
                models.insert(model.name.clone(), model);
            }
            Err(model_errors) => {
                warn!(model = %raw.name, errors = model_errors.len(), "dropping semantic model");
                errors.extend(model_errors);
            }
        }
    }

    let metrics = MetricResolver::new(&models, &grouped.metrics, options).resolve(&mut errors);
    let metric_count = metrics.len();
    for metric in metrics {
        if let Some(model) = models.get_mut(&metric.model) {
            model.metrics.push(metric);
        }
    }

    let explores: Vec<ExploreConfig> = grouped.explores.iter().map(|raw| lower_explore(raw)).collect();

    info!(
        models = models.len(),
        metrics = metric_count,
        explores = explores.len(),
        errors = errors.len(),
        "lowered declarations"
    );

    LenientLowering {
        output: LoweringOutput {
            models: models.into_values().collect(),
            explores,
        },
        errors,
    }
}

/// Declarations split by kind, first declaration of each name kept.
struct Grouped<'a> {
    data_models: Vec<&'a RawDataModel>,
    semantic_models: Vec<&'a RawSemanticModel>,
    metrics: Vec<&'a RawMetric>,
    explores: Vec<&'a RawExplore>,
}

impl<'a> Grouped<'a> {
    fn partition(declarations: &'a [Declaration], errors: &mut Vec<BuildError>) -> Self {
        let mut grouped = Grouped {
            data_models: Vec::new(),
            semantic_models: Vec::new(),
            metrics: Vec::new(),
            explores: Vec::new(),
        };
        let mut seen: HashSet<(&'static str, &str)> = HashSet::new();

        for declaration in declarations {
            let kind = declaration.kind_name();
            if !seen.insert((kind, declaration.name())) {
                errors.push(
                    ValidationError::DuplicateName {
                        scope: "declarations".to_string(),
                        kind: kind.to_string(),
                        name: declaration.name().to_string(),
                    }
                    .into(),
                );
                continue;
            }
            match declaration {
                Declaration::DataModel(raw) => grouped.data_models.push(raw),
                Declaration::SemanticModel(raw) => grouped.semantic_models.push(raw),
                Declaration::Metric(raw) => grouped.metrics.push(raw),
                Declaration::Explore(raw) => grouped.explores.push(raw),
            }
        }
        grouped
    }
}

fn lower_data_model(raw: &RawDataModel) -> DataModel {
    DataModel {
        name: raw.name.clone(),
        catalog: raw.catalog.clone(),
        schema: raw.schema.clone(),
        table: raw.table.clone().unwrap_or_else(|| raw.name.clone()),
        dialect: raw.dialect,
    }
}

// ============================================================================
// Semantic models
// ============================================================================

fn lower_semantic_model(
    raw: &RawSemanticModel,
    data_models: &BTreeMap<String, DataModel>,
    options: &BuildOptions,
) -> Result<ProcessedModel, Vec<BuildError>> {
    let mut errors = Vec::new();

    let data_model = match &raw.data_model {
        Some(name) => match data_models.get(name) {
            Some(dm) => Some(dm.clone()),
            None => {
                errors.push(
                    ResolutionError::UnknownDataModel {
                        model: raw.name.clone(),
                        data_model: name.clone(),
                    }
                    .into(),
                );
                None
            }
        },
        None => Some(
            data_models
                .get(&raw.name)
                .cloned()
                .unwrap_or_else(|| DataModel::implicit(&raw.name)),
        ),
    };
    let dialect = data_model.as_ref().and_then(|dm| dm.dialect);

    // Entities, dimensions and measures share one field namespace.
    validation::check_unique_names(
        &raw.name,
        "field",
        raw.entities
            .iter()
            .map(|e| e.name.as_str())
            .chain(raw.dimensions.iter().map(|d| d.name.as_str()))
            .chain(raw.measures.iter().map(|m| m.name.as_str())),
        &mut errors,
    );
    validation::validate_entities(&raw.name, &raw.entities, &mut errors);

    let model_defaults = raw.defaults.clone().unwrap_or_default();

    let entities: Vec<Entity> = raw
        .entities
        .iter()
        .map(|e| lower_entity(&raw.name, e, dialect, &mut errors))
        .collect();
    let dimensions: Vec<Dimension> = raw
        .dimensions
        .iter()
        .filter_map(|d| lower_dimension(&raw.name, d, &model_defaults, dialect, options, &mut errors))
        .collect();
    let measures: Vec<Measure> = raw
        .measures
        .iter()
        .filter_map(|m| lower_measure(&raw.name, m, dialect, &mut errors))
        .collect();

    let default_time_dimension = match &model_defaults.agg_time_dimension {
        Some(name) => {
            if dimensions.iter().any(|d| &d.name == name && d.is_time()) {
                Some(name.clone())
            } else {
                errors.push(
                    ValidationError::NotATimeDimension {
                        path: format!("Semantic model '{}' defaults.agg_time_dimension", raw.name),
                        dimension: name.clone(),
                    }
                    .into(),
                );
                None
            }
        }
        None => dimensions.iter().find(|d| d.is_time()).map(|d| d.name.clone()),
    };

    let date_selector = raw
        .date_selector
        .as_ref()
        .and_then(|selector| lower_date_selector(&raw.name, selector, &dimensions, &mut errors));

    match data_model {
        Some(data_model) if errors.is_empty() => Ok(ProcessedModel {
            name: raw.name.clone(),
            label: defaults::label(raw.label.as_deref(), &raw.name),
            description: raw.description.clone(),
            data_model,
            entities,
            dimensions,
            measures,
            metrics: Vec::new(),
            date_selector,
            default_time_dimension,
        }),
        _ => Err(errors),
    }
}

fn push_sql_error(
    path: &str,
    expr: &str,
    dialect: Option<Dialect>,
    errors: &mut Vec<BuildError>,
) -> bool {
    match validation::validate_sql(path, expr, dialect) {
        Ok(()) => true,
        Err(err) => {
            errors.push(err.into());
            false
        }
    }
}

fn lower_entity(
    model: &str,
    raw: &RawEntity,
    dialect: Option<Dialect>,
    errors: &mut Vec<BuildError>,
) -> Entity {
    let expr = raw.expr.clone().unwrap_or_else(|| raw.name.clone());
    push_sql_error(&format!("entity {}.{}", model, raw.name), &expr, dialect, errors);
    Entity {
        name: raw.name.clone(),
        kind: raw.kind,
        expr,
        complete: raw.complete,
    }
}

fn lower_dimension(
    model: &str,
    raw: &RawDimension,
    model_defaults: &RawModelDefaults,
    dialect: Option<Dialect>,
    options: &BuildOptions,
    errors: &mut Vec<BuildError>,
) -> Option<Dimension> {
    let path = format!("{}.{}", model, raw.name);

    let sql = match (&raw.expr, &raw.variants) {
        (Some(_), Some(_)) => {
            errors.push(ValidationError::ConflictingDimensionSql { path }.into());
            return None;
        }
        (None, None) => {
            errors.push(ValidationError::MissingDimensionSql { path }.into());
            return None;
        }
        (Some(expr), None) => DimensionSql::Expr(expr.clone()),
        (None, Some(variants)) => {
            if raw.kind != DimensionType::Time {
                errors.push(ValidationError::VariantsOnCategorical { path }.into());
                return None;
            }
            let Some(primary) = defaults::primary_variant(raw.primary_variant.as_deref(), variants)
            else {
                errors.push(ValidationError::MissingDimensionSql { path }.into());
                return None;
            };
            if !variants.contains_key(&primary) {
                errors.push(
                    ValidationError::UnknownPrimaryVariant {
                        path,
                        variant: primary,
                    }
                    .into(),
                );
                return None;
            }
            DimensionSql::Variants {
                variants: variants.clone(),
                primary,
            }
        }
    };

    let valid = match &sql {
        DimensionSql::Expr(expr) => push_sql_error(&format!("dimension {}", path), expr, dialect, errors),
        DimensionSql::Variants { variants, .. } => variants.iter().fold(true, |ok, (variant, expr)| {
            push_sql_error(&format!("dimension {}[{}]", path, variant), expr, dialect, errors) && ok
        }),
    };
    if !valid {
        return None;
    }

    let kind = match raw.kind {
        DimensionType::Categorical => DimensionKind::Categorical {
            data_type: raw.data_type.unwrap_or_default(),
        },
        DimensionType::Time => DimensionKind::Time {
            granularity: raw.granularity.unwrap_or(Granularity::Day),
            convert_tz: defaults::convert_tz(
                raw.convert_tz,
                model_defaults.convert_tz,
                options.convert_tz,
            ),
        },
    };

    Some(Dimension {
        name: raw.name.clone(),
        kind,
        sql,
        label: defaults::label(raw.label.as_deref(), &raw.name),
        description: raw.description.clone(),
        group: raw.group.as_deref().and_then(GroupPath::parse),
        hidden: raw.hidden,
    })
}

fn lower_measure(
    model: &str,
    raw: &RawMeasure,
    dialect: Option<Dialect>,
    errors: &mut Vec<BuildError>,
) -> Option<Measure> {
    let expr = raw.expr.clone().unwrap_or_else(|| raw.name.clone());
    if !push_sql_error(&format!("measure {}.{}", model, raw.name), &expr, dialect, errors) {
        return None;
    }
    Some(Measure {
        name: raw.name.clone(),
        agg: raw.agg,
        expr,
        format: raw.format.clone(),
        label: defaults::label(raw.label.as_deref(), &raw.name),
        description: raw.description.clone(),
        group: raw.group.as_deref().and_then(GroupPath::parse),
        hidden: raw.hidden,
    })
}

fn lower_date_selector(
    model: &str,
    raw: &RawDateSelector,
    dimensions: &[Dimension],
    errors: &mut Vec<BuildError>,
) -> Option<DateSelectorConfig> {
    let names: Vec<String> = if raw.dimensions.is_empty() {
        dimensions
            .iter()
            .filter(|d| d.is_time())
            .map(|d| d.name.clone())
            .collect()
    } else {
        raw.dimensions
            .iter()
            .filter(|name| {
                let ok = dimensions.iter().any(|d| &d.name == *name && d.is_time());
                if !ok {
                    errors.push(
                        ValidationError::NotATimeDimension {
                            path: format!("Semantic model '{}' date_selector", model),
                            dimension: (*name).clone(),
                        }
                        .into(),
                    );
                }
                ok
            })
            .cloned()
            .collect()
    };

    if names.is_empty() {
        None
    } else {
        Some(DateSelectorConfig { dimensions: names })
    }
}

fn lower_explore(raw: &RawExplore) -> ExploreConfig {
    ExploreConfig {
        name: raw.name.clone(),
        fact_model: raw.fact_model.clone(),
        label: raw.label.clone(),
        description: raw.description.clone(),
        joins: raw
            .joins
            .iter()
            .map(|j| JoinOverride {
                model: j.model.clone(),
                expose: j.expose,
                relationship: j.relationship,
            })
            .collect(),
        exclusions: raw.exclusions.clone(),
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Resolves metric ownership and references against the built models.
struct MetricResolver<'a> {
    models: &'a BTreeMap<String, ProcessedModel>,
    raws: &'a [&'a RawMetric],
    by_name: HashMap<&'a str, &'a RawMetric>,
    /// Measure name → models declaring it (in model-name order).
    measure_owners: HashMap<&'a str, Vec<&'a str>>,
    options: &'a BuildOptions,
}

impl<'a> MetricResolver<'a> {
    fn new(
        models: &'a BTreeMap<String, ProcessedModel>,
        raws: &'a [&'a RawMetric],
        options: &'a BuildOptions,
    ) -> Self {
        let by_name = raws.iter().map(|raw| (raw.name.as_str(), *raw)).collect();
        let mut measure_owners: HashMap<&str, Vec<&str>> = HashMap::new();
        for model in models.values() {
            for measure in &model.measures {
                measure_owners
                    .entry(measure.name.as_str())
                    .or_default()
                    .push(model.name.as_str());
            }
        }
        Self {
            models,
            raws,
            by_name,
            measure_owners,
            options,
        }
    }

    fn resolve(&self, errors: &mut Vec<BuildError>) -> Vec<Metric> {
        let mut failed: HashSet<&str> = HashSet::new();

        // Dependency names of complex metrics.
        let mut dependencies: HashMap<&str, Vec<String>> = HashMap::new();
        for raw in self.raws {
            match metric_dependencies(raw) {
                Ok(deps) => {
                    dependencies.insert(raw.name.as_str(), deps);
                }
                Err(err) => {
                    errors.push(err);
                    failed.insert(raw.name.as_str());
                }
            }
        }

        let owners = self.resolve_owners(&dependencies, &mut failed, errors);

        let mut metrics = Vec::new();
        for raw in self.raws {
            if failed.contains(raw.name.as_str()) {
                continue;
            }
            let (Some(owner), Some(deps)) = (
                owners.get(raw.name.as_str()).and_then(|o| self.models.get(o)),
                dependencies.get(raw.name.as_str()),
            ) else {
                continue;
            };
            match self.build_metric(raw, owner, deps, &owners) {
                Ok(metric) => {
                    debug!(
                        metric = %metric.name,
                        model = %metric.model,
                        variants = metric.variants.len(),
                        "expanded metric"
                    );
                    metrics.push(metric);
                }
                Err(metric_errors) => {
                    warn!(metric = %raw.name, errors = metric_errors.len(), "dropping metric");
                    errors.extend(metric_errors);
                }
            }
        }

        let metrics = drop_unresolvable(metrics, errors);
        // Dropping a metric without anchors can strand metrics built on it.
        drop_unresolvable(anchor_pop_inputs(metrics, self.models, errors), errors)
    }

    /// Owner of every metric: explicit `model`, else the model owning the
    /// measure of a simple metric, else the owner of the first dependency
    /// whose owner is known. Iterates until no more owners can be found.
    fn resolve_owners(
        &self,
        dependencies: &HashMap<&str, Vec<String>>,
        failed: &mut HashSet<&'a str>,
        errors: &mut Vec<BuildError>,
    ) -> HashMap<&'a str, String> {
        let mut owners: HashMap<&str, String> = HashMap::new();

        for raw in self.raws {
            let name = raw.name.as_str();
            if failed.contains(name) {
                continue;
            }
            if let Some(model) = &raw.model {
                if self.models.contains_key(model) {
                    owners.insert(name, model.clone());
                } else {
                    errors.push(
                        ResolutionError::UnknownModel {
                            metric: raw.name.clone(),
                            model: model.clone(),
                        }
                        .into(),
                    );
                    failed.insert(name);
                }
                continue;
            }
            if let (MetricType::Simple, Some(measure)) = (raw.kind, &raw.measure) {
                match self.unique_measure_owner(&raw.name, measure) {
                    Ok(model) => {
                        owners.insert(name, model.to_string());
                    }
                    Err(err) => {
                        errors.push(err.into());
                        failed.insert(name);
                    }
                }
            }
        }

        loop {
            let mut progressed = false;
            for raw in self.raws {
                let name = raw.name.as_str();
                if failed.contains(name) || owners.contains_key(name) {
                    continue;
                }
                let deps = dependencies.get(name).map(Vec::as_slice).unwrap_or_default();
                let owner = deps.iter().find_map(|dep| {
                    if let Some(owner) = owners.get(dep.as_str()) {
                        return Some(owner.clone());
                    }
                    if self.by_name.contains_key(dep.as_str()) {
                        return None;
                    }
                    match self.measure_owners.get(dep.as_str()).map(Vec::as_slice) {
                        Some([single]) => Some(single.to_string()),
                        _ => None,
                    }
                });
                if let Some(owner) = owner {
                    owners.insert(name, owner);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        for raw in self.raws {
            let name = raw.name.as_str();
            if !failed.contains(name) && !owners.contains_key(name) {
                errors.push(
                    ResolutionError::UnresolvedOwner {
                        metric: raw.name.clone(),
                    }
                    .into(),
                );
                failed.insert(name);
            }
        }

        owners
    }

    fn unique_measure_owner(&self, metric: &str, measure: &str) -> Result<&'a str, ResolutionError> {
        match self.measure_owners.get(measure).map(Vec::as_slice) {
            Some([single]) => Ok(*single),
            Some(many) if many.len() > 1 => Err(ResolutionError::AmbiguousMeasure {
                metric: metric.to_string(),
                measure: measure.to_string(),
                models: many.iter().map(|m| m.to_string()).collect(),
            }),
            _ => Err(ResolutionError::UnknownMeasure {
                metric: metric.to_string(),
                measure: measure.to_string(),
            }),
        }
    }

    /// Resolve a complex metric's reference: metric first, then a measure of
    /// the owner model, then a uniquely named measure anywhere.
    fn resolve_reference(
        &self,
        metric: &str,
        owner: &ProcessedModel,
        name: &str,
        owners: &HashMap<&str, String>,
    ) -> Result<FieldRef, ResolutionError> {
        if self.by_name.contains_key(name) {
            return match owners.get(name) {
                Some(model) => Ok(FieldRef {
                    name: name.to_string(),
                    model: model.clone(),
                    target: RefTarget::Metric,
                }),
                None => Err(ResolutionError::UnknownReference {
                    metric: metric.to_string(),
                    reference: name.to_string(),
                }),
            };
        }
        if owner.measure(name).is_some() {
            return Ok(FieldRef {
                name: name.to_string(),
                model: owner.name.clone(),
                target: RefTarget::Measure,
            });
        }
        match self.unique_measure_owner(metric, name) {
            Ok(model) => Ok(FieldRef {
                name: name.to_string(),
                model: model.to_string(),
                target: RefTarget::Measure,
            }),
            Err(ResolutionError::UnknownMeasure { .. }) => Err(ResolutionError::UnknownReference {
                metric: metric.to_string(),
                reference: name.to_string(),
            }),
            Err(other) => Err(other),
        }
    }

    fn build_metric(
        &self,
        raw: &RawMetric,
        owner: &ProcessedModel,
        deps: &[String],
        owners: &HashMap<&str, String>,
    ) -> Result<Metric, Vec<BuildError>> {
        let mut errors: Vec<BuildError> = Vec::new();
        let dialect = owner.data_model.dialect;
        let mut measure: Option<&Measure> = None;

        let kind = match raw.kind {
            MetricType::Simple => {
                let name = raw.measure.clone().unwrap_or_default();
                measure = owner.measure(&name);
                if measure.is_none() {
                    errors.push(
                        ResolutionError::UnknownMeasure {
                            metric: raw.name.clone(),
                            measure: name.clone(),
                        }
                        .into(),
                    );
                }
                Some(MetricKind::Simple { measure: name })
            }
            MetricType::Ratio => {
                let mut refs = deps
                    .iter()
                    .map(|dep| self.resolve_reference(&raw.name, owner, dep, owners));
                match (refs.next(), refs.next()) {
                    (Some(Ok(numerator)), Some(Ok(denominator))) => Some(MetricKind::Ratio {
                        numerator,
                        denominator,
                    }),
                    (numerator, denominator) => {
                        for err in [numerator, denominator].into_iter().flatten().filter_map(Result::err) {
                            errors.push(err.into());
                        }
                        None
                    }
                }
            }
            MetricType::Derived => {
                let expr = raw.expr.clone().unwrap_or_default();
                push_sql_error(&format!("metric {}", raw.name), &expr, dialect, &mut errors);
                let mut refs = Vec::with_capacity(deps.len());
                for dep in deps {
                    match self.resolve_reference(&raw.name, owner, dep, owners) {
                        Ok(field) => refs.push(field),
                        Err(err) => errors.push(err.into()),
                    }
                }
                Some(MetricKind::Derived { expr, refs })
            }
        };

        // Metric field names must not clash with the owner's fields; a simple
        // metric may share its measure's name since it replaces it.
        let clashes_with_measure = owner.measure(&raw.name).is_some()
            && !matches!(&kind, Some(MetricKind::Simple { measure }) if measure == &raw.name);
        if owner.entity(&raw.name).is_some()
            || owner.dimension(&raw.name).is_some()
            || clashes_with_measure
        {
            errors.push(
                ValidationError::DuplicateName {
                    scope: owner.name.clone(),
                    kind: "field".to_string(),
                    name: raw.name.clone(),
                }
                .into(),
            );
        }

        let filter = raw.filter.clone().map(|spec| Filter {
            conditions: spec.into_conditions(),
        });
        if let Some(filter) = &filter {
            for condition in &filter.conditions {
                push_sql_error(&format!("filter of metric {}", raw.name), condition, dialect, &mut errors);
            }
        }
        // A filter is pushed down into measure-level aggregates, so a filtered
        // complex metric may only reference measures and simple metrics.
        if let (Some(_), Some(kind)) = (&filter, &kind) {
            for field in kind.references() {
                let nested = field.target == RefTarget::Metric
                    && self
                        .by_name
                        .get(field.name.as_str())
                        .is_some_and(|m| m.kind != MetricType::Simple);
                if nested {
                    errors.push(
                        ValidationError::FilteredNestedMetric {
                            metric: raw.name.clone(),
                            reference: field.name.clone(),
                        }
                        .into(),
                    );
                }
            }
        }

        let pop = self.lower_pop(raw, owner, &mut errors);
        let benchmark = lower_benchmark(raw, owner, &mut errors);

        let Some(kind) = kind else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }

        let metric_group = raw.group.as_deref().and_then(GroupPath::parse);
        let variants = variants::expand(pop.as_ref(), benchmark.as_ref());

        Ok(Metric {
            name: raw.name.clone(),
            model: owner.name.clone(),
            kind,
            label: defaults::label(raw.label.as_deref(), &raw.name),
            description: raw
                .description
                .clone()
                .or_else(|| measure.and_then(|m| m.description.clone())),
            group: defaults::group(metric_group.as_ref(), measure.and_then(|m| m.group.as_ref())),
            format: defaults::format(
                raw.format.as_deref(),
                measure.and_then(|m| m.format.as_deref()),
            ),
            hidden: raw.hidden,
            filter,
            pop,
            benchmark,
            variants,
        })
    }

    fn lower_pop(
        &self,
        raw: &RawMetric,
        owner: &ProcessedModel,
        errors: &mut Vec<BuildError>,
    ) -> Option<PopConfig> {
        let pop = raw.pop.as_ref()?;
        if pop.comparisons.is_empty() {
            errors.push(
                ValidationError::EmptyPopComparisons {
                    metric: raw.name.clone(),
                }
                .into(),
            );
            return None;
        }

        let first_time = owner.time_dimensions().next().map(|d| d.name.as_str());
        let Some(date_dimension) = defaults::pop_date_dimension(
            pop.date_dimension.as_deref(),
            owner.default_time_dimension.as_deref(),
            first_time,
        ) else {
            errors.push(
                ValidationError::MissingPopTimeDimension {
                    metric: raw.name.clone(),
                }
                .into(),
            );
            return None;
        };
        if !owner.dimension(date_dimension).is_some_and(Dimension::is_time) {
            errors.push(
                ValidationError::NotATimeDimension {
                    path: format!("Metric '{}' pop.date_dimension", raw.name),
                    dimension: date_dimension.to_string(),
                }
                .into(),
            );
            return None;
        }

        Some(PopConfig {
            comparisons: defaults::dedup(&pop.comparisons),
            outputs: defaults::pop_outputs(pop.outputs.as_deref(), &self.options.default_pop_outputs),
            date_dimension: date_dimension.to_string(),
            anchors: [(owner.name.clone(), date_dimension.to_string())].into(),
        })
    }
}

fn lower_benchmark(
    raw: &RawMetric,
    owner: &ProcessedModel,
    errors: &mut Vec<BuildError>,
) -> Option<BenchmarkConfig> {
    let benchmark = raw.benchmark.as_ref()?;
    validation::check_unique_names(
        &format!("benchmarks of metric '{}'", raw.name),
        "benchmark group",
        benchmark.groups.iter().map(|g| g.name.as_str()),
        errors,
    );

    let mut groups = Vec::with_capacity(benchmark.groups.len());
    for group in &benchmark.groups {
        for dimension in &group.partition_by {
            let categorical = owner
                .dimension(dimension)
                .is_some_and(|d| matches!(d.kind, DimensionKind::Categorical { .. }));
            if !categorical {
                errors.push(
                    ValidationError::UnknownBenchmarkDimension {
                        metric: raw.name.clone(),
                        group: group.name.clone(),
                        dimension: dimension.clone(),
                    }
                    .into(),
                );
            }
        }
        groups.push(BenchmarkParams {
            group: group.name.clone(),
            partition_by: group.partition_by.clone(),
            agg: group.agg,
        });
    }
    Some(BenchmarkConfig { groups })
}

/// Names a metric depends on, checking that its type's required fields are
/// present. Simple metrics have none (their measure is resolved separately).
fn metric_dependencies(raw: &RawMetric) -> Result<Vec<String>, BuildError> {
    let missing = |field: &str| -> BuildError {
        ValidationError::MissingMetricField {
            metric: raw.name.clone(),
            metric_type: format!("{:?}", raw.kind).to_lowercase(),
            field: field.to_string(),
        }
        .into()
    };

    match raw.kind {
        MetricType::Simple => match raw.measure {
            Some(_) => Ok(Vec::new()),
            None => Err(missing("measure")),
        },
        MetricType::Ratio => match (&raw.numerator, &raw.denominator) {
            (Some(num), Some(den)) => Ok(vec![num.clone(), den.clone()]),
            (None, _) => Err(missing("numerator")),
            (_, None) => Err(missing("denominator")),
        },
        MetricType::Derived => {
            let Some(expr) = &raw.expr else {
                return Err(missing("expr"));
            };
            match &raw.metrics {
                Some(names) => Ok(names.clone()),
                None => sql::referenced_columns(expr, None).map_err(|e| {
                    ValidationError::InvalidSql {
                        path: format!("metric {}", raw.name),
                        expr: expr.clone(),
                        message: e.to_string(),
                    }
                    .into()
                }),
            }
        }
    }
}

/// Remove metrics in dependency cycles and metrics referencing a metric that
/// did not survive, reporting each.
fn drop_unresolvable(mut metrics: Vec<Metric>, errors: &mut Vec<BuildError>) -> Vec<Metric> {
    let graph: BTreeMap<String, Vec<String>> = metrics
        .iter()
        .map(|m| (m.name.clone(), metric_refs(m).map(str::to_string).collect()))
        .collect();

    let mut in_cycle: BTreeSet<String> = BTreeSet::new();
    for cycle in validation::find_cycles(&graph) {
        in_cycle.extend(cycle.iter().cloned());
        errors.push(ValidationError::CircularDependency { cycle }.into());
    }
    metrics.retain(|m| !in_cycle.contains(&m.name));

    loop {
        let alive: HashSet<String> = metrics.iter().map(|m| m.name.clone()).collect();
        let before = metrics.len();
        metrics.retain(|m| {
            let missing = metric_refs(m).find(|r| !alive.contains(*r));
            if let Some(reference) = missing {
                errors.push(
                    ResolutionError::UnknownReference {
                        metric: m.name.clone(),
                        reference: reference.to_string(),
                    }
                    .into(),
                );
            }
            metric_refs(m).all(|r| alive.contains(r))
        });
        if metrics.len() == before {
            break;
        }
    }
    metrics
}

/// Resolve the time dimension every PoP metric compares periods on in each
/// model it reads from: its own date dimension in the owner model, the
/// default time dimension elsewhere. Metrics reading from a model without
/// one are dropped.
fn anchor_pop_inputs(
    mut metrics: Vec<Metric>,
    models: &BTreeMap<String, ProcessedModel>,
    errors: &mut Vec<BuildError>,
) -> Vec<Metric> {
    let by_name: HashMap<String, Metric> = metrics.iter().map(|m| (m.name.clone(), m.clone())).collect();
    let mut unanchored: HashSet<String> = HashSet::new();

    for metric in metrics.iter_mut() {
        let Some(pop) = metric.pop.as_mut() else {
            continue;
        };
        let mut read: BTreeSet<String> = BTreeSet::new();
        let mut pending: Vec<&Metric> = by_name.get(&metric.name).into_iter().collect();
        let mut seen: HashSet<&str> = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(current.name.as_str()) {
                continue;
            }
            for field in current.kind.references() {
                read.insert(field.model.clone());
                if field.target == RefTarget::Metric {
                    pending.extend(by_name.get(&field.name));
                }
            }
        }

        for model in read {
            if pop.anchors.contains_key(&model) {
                continue;
            }
            match models.get(&model).and_then(|m| m.default_time_dimension.clone()) {
                Some(dimension) => {
                    pop.anchors.insert(model, dimension);
                }
                None => {
                    errors.push(
                        ValidationError::UnanchoredPopInput {
                            metric: metric.name.clone(),
                            model,
                        }
                        .into(),
                    );
                    unanchored.insert(metric.name.clone());
                }
            }
        }
    }

    metrics.retain(|m| !unanchored.contains(&m.name));
    metrics
}

fn metric_refs(metric: &Metric) -> impl Iterator<Item = &str> {
    metric
        .kind
        .references()
        .into_iter()
        .filter(|r| r.target == RefTarget::Metric)
        .map(|r| r.name.as_str())
}
