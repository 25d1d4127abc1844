//! Declaration loaders.
//!
//! Declarations are authored in YAML (JSON is accepted too). A document is
//! either a list of records tagged with `kind`:
//!
//! ```yaml
//! - kind: data_model
//!   name: rentals
//!   schema: analytics
//! - kind: semantic_model
//!   name: rentals
//!   entities:
//!     - { name: rental, type: primary, expr: rental_id }
//! ```
//!
//! or a mapping with `data_models`, `semantic_models`, `metrics` and
//! `explores` sections. Both shapes flatten into the same ordered list of
//! [`Declaration`]s. Cross-references are not checked here; that is the
//! job of [`crate::lowering`].
//!
//! # Example
//!
//! ```rust,ignore
//! use semantic_patterns::loader::load_path;
//! use std::path::Path;
//!
//! let declarations = load_path(Path::new("models/"))?;
//! ```

pub mod records;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use records::{
    Declaration, DimensionType, FilterSpec, MetricType, RawBenchmark, RawBenchmarkGroup,
    RawDataModel, RawDateSelector, RawDimension, RawEntity, RawExplore, RawJoin, RawMeasure,
    RawMetric, RawModelDefaults, RawPop, RawSemanticModel, Sections,
};

/// Errors that can occur when loading declarations.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Unsupported file extension
    #[error("Unsupported file extension: {extension}. Supported: .yml, .yaml, .json")]
    UnsupportedExtension { extension: String },

    /// IO error reading file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML syntax or shape error
    #[error("YAML error in {file}: {message}")]
    Yaml { file: String, message: String },

    /// JSON syntax or shape error
    #[error("JSON error in {file}: {message}")]
    Json { file: String, message: String },

    /// Document is neither a record list nor a section mapping
    #[error("Invalid document {file}: {message}")]
    InvalidDocument { file: String, message: String },
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Source format of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> LoadResult<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "yml" | "yaml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            _ => Err(LoadError::UnsupportedExtension {
                extension: extension.to_string(),
            }),
        }
    }
}

/// Load declarations from a file, or from every supported file in a
/// directory (recursively, in path order).
pub fn load_path(path: &Path) -> LoadResult<Vec<Declaration>> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    if path.is_dir() {
        let mut files = Vec::new();
        collect_files(path, &mut files)?;
        files.sort();
        return load_many(&files);
    }

    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    load_str(&content, format, &path.display().to_string())
}

/// Load several paths and concatenate their declarations in argument order.
pub fn load_many<P: AsRef<Path>>(paths: &[P]) -> LoadResult<Vec<Declaration>> {
    let mut declarations = Vec::new();
    for path in paths {
        declarations.extend(load_path(path.as_ref())?);
    }
    Ok(declarations)
}

/// Load declarations from a string (useful for testing).
///
/// `source` names the document in error messages.
pub fn load_str(content: &str, format: Format, source: &str) -> LoadResult<Vec<Declaration>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let declarations = match format {
        Format::Yaml => load_yaml(content, source)?,
        Format::Json => load_json(content, source)?,
    };
    debug!(source, count = declarations.len(), "loaded declarations");
    Ok(declarations)
}

fn load_yaml(content: &str, source: &str) -> LoadResult<Vec<Declaration>> {
    use serde_yaml::Value;

    let yaml_err = |e: serde_yaml::Error| LoadError::Yaml {
        file: source.to_string(),
        message: e.to_string(),
    };

    let value: Value = serde_yaml::from_str(content).map_err(yaml_err)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(_) => serde_yaml::from_value(value).map_err(yaml_err),
        Value::Mapping(_) => serde_yaml::from_value::<Sections>(value)
            .map(Sections::into_declarations)
            .map_err(yaml_err),
        _ => Err(LoadError::InvalidDocument {
            file: source.to_string(),
            message: "expected a list of records or a mapping of sections".to_string(),
        }),
    }
}

fn load_json(content: &str, source: &str) -> LoadResult<Vec<Declaration>> {
    use serde_json::Value;

    let json_err = |e: serde_json::Error| LoadError::Json {
        file: source.to_string(),
        message: e.to_string(),
    };

    let value: Value = serde_json::from_str(content).map_err(json_err)?;
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => serde_json::from_value(value).map_err(json_err),
        Value::Object(_) => serde_json::from_value::<Sections>(value)
            .map(Sections::into_declarations)
            .map_err(json_err),
        _ => Err(LoadError::InvalidDocument {
            file: source.to_string(),
            message: "expected a list of records or a mapping of sections".to_string(),
        }),
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> LoadResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if Format::from_path(&path).is_ok() {
            files.push(path);
        }
    }
    Ok(())
}
