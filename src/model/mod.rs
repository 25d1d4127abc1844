//! Typed domain model produced by lowering.
//!
//! Everything here is immutable once built: renderers and the join
//! inference engine only read it.

pub mod data_model;
pub mod dimension;
pub mod entity;
pub mod explore;
pub mod group;
pub mod measure;
pub mod metric;
pub mod processed;
pub mod types;

pub use data_model::DataModel;
pub use dimension::{Dimension, DimensionKind, DimensionSql, RenderedVariant};
pub use entity::Entity;
pub use explore::{ExploreConfig, InferredJoin, JoinOverride};
pub use group::GroupPath;
pub use measure::Measure;
pub use metric::{
    BenchmarkConfig, BenchmarkParams, FieldRef, Filter, Metric, MetricKind, MetricVariant,
    PopConfig, RefTarget, VariantKind,
};
pub use processed::{DateSelectorConfig, ModelSet, ProcessedModel};
pub use types::{
    Aggregation, BenchmarkAgg, DataType, EntityKind, ExposeLevel, Granularity, PopComparison,
    PopOutput, Relationship,
};
