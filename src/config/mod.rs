pub mod loader;
pub mod settings;

pub use loader::*;
pub use settings::{load_env, Settings};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parsing failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("No {kind} named '{name}' in configuration")]
    MissingEntry { kind: &'static str, name: String },
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
    #[error("Environment file error: {0}")]
    Env(String),
}
