use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ConfigError;
use crate::agent::provider::ModelDefaults;

/// Runtime settings: defaults < `merco-crews.toml` < `MERCO_*` environment variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding `<crew>/agents.yaml` and `<crew>/tasks.yaml` overrides
    pub config_dir: PathBuf,
    /// Root that task output files are resolved against
    pub output_root: PathBuf,
    /// Where kickoff logs for replay are kept
    pub storage_dir: PathBuf,
    /// Training results applied to agents on every run
    pub trained_agents_file: PathBuf,
    pub ollama_base_url: String,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("crews"),
            output_root: PathBuf::from("."),
            storage_dir: PathBuf::from(".merco"),
            trained_agents_file: PathBuf::from("trained_agents_data.json"),
            ollama_base_url: "http://localhost:11434".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings, reading `merco-crews.toml` from the working directory when present
    /// or the given file, which must then exist.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = config::Config::builder()
            .set_default("config_dir", defaults.config_dir.to_string_lossy().to_string())?
            .set_default("output_root", defaults.output_root.to_string_lossy().to_string())?
            .set_default("storage_dir", defaults.storage_dir.to_string_lossy().to_string())?
            .set_default(
                "trained_agents_file",
                defaults.trained_agents_file.to_string_lossy().to_string(),
            )?
            .set_default("ollama_base_url", defaults.ollama_base_url)?
            .set_default("log_level", defaults.log_level)?;

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("merco-crews").required(false)),
        };

        let settings: Settings = builder
            .add_source(config::Environment::with_prefix("MERCO"))
            .build()?
            .try_deserialize()?;

        debug!(?settings, "Settings loaded");
        Ok(settings)
    }

    pub fn model_defaults(&self) -> ModelDefaults {
        ModelDefaults {
            ollama_base_url: self.ollama_base_url.clone(),
            ..ModelDefaults::default()
        }
    }

    /// Kickoff log location of one crew
    pub fn kickoff_db_path(&self, crew: &str) -> PathBuf {
        self.storage_dir
            .join(crew)
            .join("latest_kickoff_task_outputs.db")
    }
}

/// Load a `.env` file.
///
/// Without a path the usual `.env` lookup applies and existing variables win.
/// With an explicit path its values override the process environment.
/// Call it before any other thread starts, since it writes the process environment.
pub fn load_env(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        None => {
            if let Ok(path) = dotenv::dotenv() {
                debug!("Loaded environment from {}", path.display());
            }
            Ok(())
        }
        Some(path) => {
            let iter = dotenv::from_path_iter(path).map_err(|e| ConfigError::Env(e.to_string()))?;
            for item in iter {
                let (key, value) = item.map_err(|e| ConfigError::Env(e.to_string()))?;
                std::env::set_var(key, value);
            }
            debug!("Loaded environment from {}", path.display());
            Ok(())
        }
    }
}
