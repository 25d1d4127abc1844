//! End-to-end generation from declarations to LookML files.
//!
//! ```text
//! Declarations → Lower → ModelSet ─┬─→ Infer joins ─┐
//!                                  └────────────────┴─→ Render → GeneratedFiles
//! ```
//!
//! Every run is a pure function of (models, explores, options): the same
//! input always yields byte-identical files.
//!
//! # Example
//!
//! ```
//! use semantic_patterns::generate::{compile, GeneratorOptions};
//! use semantic_patterns::loader::{load_str, Format};
//!
//! let yaml = r#"
//! - kind: semantic_model
//!   name: rentals
//!   entities:
//!     - { name: rental, type: primary, expr: rental_id }
//!   dimensions:
//!     - { name: status, type: categorical, expr: status }
//!   measures:
//!     - { name: amount, agg: sum }
//! - kind: metric
//!   name: revenue
//!   type: simple
//!   measure: amount
//! "#;
//!
//! let declarations = load_str(yaml, Format::Yaml, "example.yml").unwrap();
//! let options = GeneratorOptions {
//!     fact_models: vec!["rentals".to_string()],
//!     ..GeneratorOptions::default()
//! };
//! let output = compile(&declarations, &options).unwrap();
//! assert!(output.files.get("views/rentals.view.lkml").is_some());
//! assert!(output.files.get("explores/rentals.explore.lkml").is_some());
//! ```

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::emitter::calendar::render_calendar;
use crate::emitter::dimension::render_base_view;
use crate::emitter::explore::render_explore;
use crate::emitter::measure::render_metrics_view;
use crate::emitter::{PopRenderer, PopStrategy, RenderContext};
use crate::inference::{with_default_explores, JoinInference};
use crate::loader::{Declaration, LoadError};
use crate::lowering::{self, BuildOptions};
use crate::model::{ExploreConfig, InferredJoin, ModelSet, PopOutput, ProcessedModel};
use crate::sql::{Dialect, SqlExprError};
use crate::validation::{BuildError, ResolutionError};

// ============================================================================
// Error Types
// ============================================================================

/// An invariant violated while rendering. Never expected for input that
/// lowered successfully.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("cannot render SQL of {field}: {source}")]
    Sql { field: String, source: SqlExprError },

    #[error("{context} refers to unknown field '{field}'")]
    UnknownField { context: String, field: String },

    #[error("no time dimension '{dimension}' to anchor the comparison fields of '{metric}'")]
    MissingTimeDimension { metric: String, dimension: String },

    #[error("metric '{metric}' has no time dimension anchoring its inputs in '{model}'")]
    UnanchoredInput { metric: String, model: String },

    #[error("more than one renderer produced '{path}'")]
    DuplicateFile { path: String },
}

/// Anything that can stop a compile run.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{} error(s) while building the model", .0.len())]
    Build(Vec<BuildError>),

    #[error("{} error(s) while inferring joins", .0.len())]
    Inference(Vec<ResolutionError>),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl CompileError {
    /// One message per underlying error.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CompileError::Build(errors) => errors.iter().map(ToString::to_string).collect(),
            CompileError::Inference(errors) => errors.iter().map(ToString::to_string).collect(),
            other => vec![other.to_string()],
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// Options
// ============================================================================

/// Flat, immutable options of one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorOptions {
    /// Target SQL dialect.
    pub dialect: Dialect,
    /// Timezone conversion for time dimensions that do not set it.
    pub convert_tz: bool,
    pub view_prefix: String,
    pub explore_prefix: String,
    /// Join alias of explore calendars.
    pub calendar_alias: String,
    pub pop_strategy: PopStrategy,
    /// PoP outputs of metrics that do not list any.
    pub default_pop_outputs: Vec<PopOutput>,
    /// Models that get an explore even when none is declared.
    pub fact_models: Vec<String>,
    /// Drop failing declarations instead of failing the run.
    pub lenient: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            convert_tz: false,
            view_prefix: String::new(),
            explore_prefix: String::new(),
            calendar_alias: "calendar".to_string(),
            pop_strategy: PopStrategy::default(),
            default_pop_outputs: vec![PopOutput::Previous],
            fact_models: Vec::new(),
            lenient: false,
        }
    }
}

impl GeneratorOptions {
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_pop_strategy(mut self, strategy: PopStrategy) -> Self {
        self.pop_strategy = strategy;
        self
    }

    /// The subset of options the domain builder needs.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            convert_tz: self.convert_tz,
            default_pop_outputs: self.default_pop_outputs.clone(),
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// Generated files keyed by relative path, iterated in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct GeneratedFiles {
    files: BTreeMap<String, String>,
}

impl GeneratedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file; a path may only be produced once.
    pub fn insert(&mut self, path: String, content: String) -> Result<(), GenerationError> {
        if self.files.contains_key(&path) {
            return Err(GenerationError::DuplicateFile { path });
        }
        self.files.insert(path, content);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.files
    }

    /// SHA-256 over every path and content, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, content) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(content.as_bytes());
            hasher.update([0u8]);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Paths of the files generated for a model or explore.
pub mod paths {
    pub fn base_view(model: &str) -> String {
        format!("views/{}.view.lkml", model)
    }

    pub fn metrics_view(model: &str) -> String {
        format!("views/{}.metrics.view.lkml", model)
    }

    pub fn pop_view(model: &str) -> String {
        format!("views/{}.pop.view.lkml", model)
    }

    pub fn explore(explore_name: &str) -> String {
        format!("explores/{}.explore.lkml", explore_name)
    }

    pub fn calendar(calendar_view: &str) -> String {
        format!("explores/{}.view.lkml", calendar_view)
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Renders a model set and its explores.
#[derive(Debug)]
pub struct Generator {
    options: GeneratorOptions,
    pop: Box<dyn PopRenderer>,
}

impl Generator {
    /// Generator using the PoP strategy named in `options`.
    pub fn new(options: GeneratorOptions) -> Self {
        let pop = options.pop_strategy.renderer();
        Self { options, pop }
    }

    /// Replace the PoP strategy.
    pub fn with_pop_renderer(mut self, pop: Box<dyn PopRenderer>) -> Self {
        self.pop = pop;
        self
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Infer the joins of every explore (plus default explores for fact
    /// models), then render everything.
    pub fn generate(&self, models: &ModelSet, explores: &[ExploreConfig]) -> CompileResult<GeneratedFiles> {
        let explores = with_default_explores(explores, &self.options.fact_models);
        let joins = JoinInference::new(models)
            .with_dialect(self.options.dialect)
            .with_view_prefix(&self.options.view_prefix)
            .infer_all(&explores)
            .map_err(CompileError::Inference)?;

        let planned: Vec<(ExploreConfig, Vec<InferredJoin>)> = explores.into_iter().zip(joins).collect();
        Ok(self.render(models, &planned)?)
    }

    /// Render models and explores whose joins are already known.
    pub fn render(
        &self,
        models: &ModelSet,
        explores: &[(ExploreConfig, Vec<InferredJoin>)],
    ) -> Result<GeneratedFiles, GenerationError> {
        let ctx = RenderContext::new(models, &self.options);

        let model_list: Vec<&ProcessedModel> = models.iter().collect();
        let model_files = first_error(
            model_list
                .par_iter()
                .map(|model| self.render_model(model, &ctx))
                .collect(),
        )?;

        let explore_files = first_error(
            explores
                .par_iter()
                .map(|(explore, joins)| self.render_explore(explore, joins, &ctx))
                .collect(),
        )?;

        let mut files = GeneratedFiles::new();
        for (path, content) in model_files.into_iter().chain(explore_files).flatten() {
            files.insert(path, content)?;
        }

        info!(
            models = models.len(),
            explores = explores.len(),
            files = files.len(),
            strategy = %self.pop.strategy(),
            "generated LookML"
        );
        Ok(files)
    }

    fn render_model(
        &self,
        model: &ProcessedModel,
        ctx: &RenderContext,
    ) -> Result<Vec<(String, String)>, GenerationError> {
        let mut files = vec![(paths::base_view(&model.name), render_base_view(model, ctx)?)];
        if let Some(content) = render_metrics_view(model, ctx)? {
            files.push((paths::metrics_view(&model.name), content));
        }
        if let Some(content) = self.pop.render_view(model, ctx)? {
            files.push((paths::pop_view(&model.name), content));
        }
        debug!(model = %model.name, files = files.len(), "rendered model");
        Ok(files)
    }

    fn render_explore(
        &self,
        explore: &ExploreConfig,
        joins: &[InferredJoin],
        ctx: &RenderContext,
    ) -> Result<Vec<(String, String)>, GenerationError> {
        let context = format!("explore {}", explore.name);
        let mut participants = vec![ctx.model(&explore.fact_model, &context)?];
        for join in joins {
            participants.push(ctx.model(&join.to_model, &context)?);
        }

        let mut files = Vec::with_capacity(2);
        let calendar = render_calendar(&explore.name, &participants, self.pop.as_ref(), ctx)?;
        files.push((
            paths::explore(&ctx.explore_name(&explore.name)),
            render_explore(explore, joins, calendar.as_ref(), ctx),
        ));
        let with_calendar = calendar.is_some();
        if let Some(calendar) = calendar {
            files.push((
                paths::calendar(&ctx.calendar_view_name(&explore.name)),
                calendar.content,
            ));
        }
        debug!(explore = %explore.name, joins = joins.len(), calendar = with_calendar, "rendered explore");
        Ok(files)
    }
}

/// Unwrap results gathered in input order, reporting the earliest failure
/// rather than whichever worker failed first.
fn first_error<T>(results: Vec<Result<T, GenerationError>>) -> Result<Vec<T>, GenerationError> {
    results.into_iter().collect()
}

// ============================================================================
// Compile
// ============================================================================

/// Result of [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub files: GeneratedFiles,
    pub models: ModelSet,
    /// Errors of declarations dropped in lenient mode.
    pub warnings: Vec<BuildError>,
}

/// Lower, infer and render in one go.
pub fn compile(declarations: &[Declaration], options: &GeneratorOptions) -> CompileResult<CompileOutput> {
    let build_options = options.build_options();
    let (lowered, warnings) = if options.lenient {
        let result = lowering::lower_lenient(declarations, &build_options);
        for error in &result.errors {
            warn!(%error, "skipped declaration");
        }
        (result.output, result.errors)
    } else {
        (
            lowering::lower(declarations, &build_options).map_err(CompileError::Build)?,
            Vec::new(),
        )
    };

    let files = Generator::new(options.clone()).generate(&lowered.models, &lowered.explores)?;
    Ok(CompileOutput {
        files,
        models: lowered.models,
        warnings,
    })
}
