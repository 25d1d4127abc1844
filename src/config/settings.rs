//! TOML-based configuration for the `sp` binary.
//!
//! Supports a config file (`sp.toml`) with environment variable expansion
//! in string values.
//!
//! Example configuration:
//! ```toml
//! [generator]
//! dialect = "snowflake"
//! pop_strategy = "dynamic"
//! view_prefix = "${SP_VIEW_PREFIX}"
//! fact_models = ["rentals"]
//!
//! [input]
//! paths = ["semantic/"]
//!
//! [output]
//! dir = "lookml/generated"
//! ```

use regex::{Captures, Regex};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::generate::GeneratorOptions;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SP_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "sp.toml";

static ENV_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").unwrap());

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Options handed to the generator.
    pub generator: GeneratorOptions,

    /// Where declarations are read from.
    pub input: InputSettings,

    /// Where generated files are written.
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSettings {
    /// Files or directories of YAML/JSON declarations.
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSettings {
    pub dir: Option<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings and expand `${VAR}` references in string values.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.expand_env()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SP_CONFIG`
    /// 2. `./sp.toml`
    /// 3. `~/.config/semantic-patterns/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var(CONFIG_ENV) {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG);
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("semantic-patterns").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn expand_env(&mut self) -> Result<(), SettingsError> {
        let generator = &mut self.generator;
        for value in [
            &mut generator.view_prefix,
            &mut generator.explore_prefix,
            &mut generator.calendar_alias,
        ] {
            *value = expand_env_vars(value)?;
        }
        for model in &mut generator.fact_models {
            *model = expand_env_vars(model)?;
        }
        for path in &mut self.input.paths {
            *path = expand_env_vars(path)?;
        }
        if let Some(dir) = &mut self.output.dir {
            *dir = expand_env_vars(dir)?;
        }
        Ok(())
    }
}

/// Expand `${VAR}` references in a string.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut missing = None;
    let expanded = ENV_REF.replace_all(s, |caps: &Captures| match env::var(&caps[1]) {
        Ok(value) => value,
        Err(_) => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });
    match missing {
        Some(var) => Err(SettingsError::MissingEnvVar(var)),
        None => Ok(expanded.into_owned()),
    }
}
