//! # semantic-patterns
//!
//! Compiles a declarative semantic layer (semantic models, metrics, data
//! models and explores written in YAML or JSON) into LookML.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Declarations (YAML / JSON documents)            │
//! │  (data_models, semantic_models, metrics, explores)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [loader]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Raw records (serde)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [lowering + validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │      ModelSet (processed models, metric variants)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [inference]
//! ┌─────────────────────────────────────────────────────────┐
//! │          Explores + inferred joins (petgraph)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [emitter, sql]
//! ┌─────────────────────────────────────────────────────────┐
//! │   LookML files: views, refinements, explores, calendars  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`generate::compile`] runs the whole pipeline; the `sp` binary wraps it
//! with settings and file output.

pub mod config;
pub mod emitter;
pub mod generate;
pub mod inference;
pub mod loader;
pub mod lowering;
pub mod model;
pub mod sql;
pub mod validation;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::emitter::{PopRenderer, PopStrategy};
    pub use crate::generate::{
        compile, CompileError, CompileOutput, GeneratedFiles, Generator, GeneratorOptions,
    };
    pub use crate::inference::{infer_joins, JoinInference};
    pub use crate::loader::{load_many, load_path, load_str, Declaration, Format};
    pub use crate::lowering::{lower, lower_lenient, BuildOptions, LoweringOutput};
    pub use crate::model::{
        ExploreConfig, InferredJoin, Metric, ModelSet, ProcessedModel,
    };
    pub use crate::sql::{Dialect, SqlDialect};
    pub use crate::validation::{BuildError, ResolutionError, ValidationError};
}
