use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::ConfigError;

/// Agent record as written in `agents.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    /// Free-form note describing what the agent hands off to the rest of the crew
    #[serde(default)]
    pub handoff: Option<String>,
    /// Model override in `provider/model` form
    #[serde(default)]
    pub llm: Option<String>,
    #[serde(default)]
    pub max_iter: Option<usize>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

/// Task record as written in `tasks.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub description: String,
    pub expected_output: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub handoff: Option<String>,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

pub type AgentsConfig = HashMap<String, AgentConfig>;
pub type TasksConfig = HashMap<String, TaskConfig>;

pub fn parse_agents_config(yaml: &str) -> Result<AgentsConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn parse_tasks_config(yaml: &str) -> Result<TasksConfig, ConfigError> {
    Ok(serde_yaml::from_str(yaml)?)
}

pub fn load_agents_config(path: impl AsRef<Path>) -> Result<AgentsConfig, ConfigError> {
    let content = read(path.as_ref())?;
    parse_agents_config(&content)
}

pub fn load_tasks_config(path: impl AsRef<Path>) -> Result<TasksConfig, ConfigError> {
    let content = read(path.as_ref())?;
    parse_tasks_config(&content)
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Agent and task records of one crew
#[derive(Debug, Clone)]
pub struct CrewFiles {
    pub agents: AgentsConfig,
    pub tasks: TasksConfig,
}

impl CrewFiles {
    /// Load `<config_dir>/<crew>/agents.yaml` and `tasks.yaml`, falling back to the
    /// records compiled into the binary when a file is absent.
    pub fn load(
        config_dir: &Path,
        crew: &str,
        embedded_agents: &str,
        embedded_tasks: &str,
    ) -> Result<Self, ConfigError> {
        let crew_dir = config_dir.join(crew);
        let agents_path = crew_dir.join("agents.yaml");
        let tasks_path = crew_dir.join("tasks.yaml");

        let agents = if agents_path.is_file() {
            debug!("Loading agents from {}", agents_path.display());
            load_agents_config(&agents_path)?
        } else {
            parse_agents_config(embedded_agents)?
        };

        let tasks = if tasks_path.is_file() {
            debug!("Loading tasks from {}", tasks_path.display());
            load_tasks_config(&tasks_path)?
        } else {
            parse_tasks_config(embedded_tasks)?
        };

        Ok(Self { agents, tasks })
    }

    pub fn agent(&self, name: &str) -> Result<&AgentConfig, ConfigError> {
        self.agents.get(name).ok_or_else(|| ConfigError::MissingEntry {
            kind: "agent",
            name: name.to_string(),
        })
    }

    pub fn task(&self, name: &str) -> Result<&TaskConfig, ConfigError> {
        self.tasks.get(name).ok_or_else(|| ConfigError::MissingEntry {
            kind: "task",
            name: name.to_string(),
        })
    }
}
