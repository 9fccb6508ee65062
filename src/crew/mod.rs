pub mod crew;
pub mod delegation;
pub mod evaluator;
pub mod output;
pub mod process;
pub mod storage;
pub mod training;

pub use crew::{Crew, CrewBuilder, MANAGER_NAME};
pub use delegation::{AskQuestionTool, Coworkers, DelegateWorkTool, MAX_DELEGATION_DEPTH};
pub use evaluator::{TaskScores, TestReport};
pub use output::{CrewOutput, UsageMetrics};
pub use process::Process;
pub use storage::{KickoffRecord, KickoffTaskOutputsStorage, StorageError};
pub use training::{
    blocking_io, load_trained_agents, save_trained_agents, FeedbackSource, StdinFeedback, TrainedAgentSuggestions,
    TrainedAgents, TrainingEntry,
};

use std::path::PathBuf;

use crate::agent::AgentError;
use crate::config::ConfigError;

/// Crew error types
#[derive(Debug, thiserror::Error)]
pub enum CrewError {
    #[error("Invalid crew: {0}")]
    Validation(String),
    #[error("Task '{task}' failed: {source}")]
    Task {
        task: String,
        #[source]
        source: AgentError,
    },
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Kickoff log error: {0}")]
    Storage(#[from] StorageError),
    #[error("Task '{0}' not found in the latest kickoff")]
    TaskNotFound(String),
    #[error("No agent named '{0}' in the crew")]
    AgentNotFound(String),
    #[error("Training error: {0}")]
    Training(String),
    #[error("Evaluation error: {0}")]
    Evaluation(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrewError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrewError::Io {
            path: path.into(),
            source,
        }
    }
}
