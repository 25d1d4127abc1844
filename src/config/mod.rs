//! Configuration for the `sp` binary.
//!
//! The compiler itself only consumes [`GeneratorOptions`](crate::generate::GeneratorOptions);
//! this module maps a TOML settings file onto them.

mod settings;

pub use settings::{
    expand_env_vars, InputSettings, OutputSettings, Settings, SettingsError, CONFIG_ENV,
    LOCAL_CONFIG,
};
