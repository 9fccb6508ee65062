//! Process types for crew execution

use serde::{Deserialize, Serialize};

/// How a crew assigns its tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    /// Each task is executed by the agent it names, in declaration order
    #[default]
    Sequential,

    /// A manager agent receives every task and delegates to the crew
    Hierarchical,
}

impl Process {
    pub fn as_str(&self) -> &'static str {
        match self {
            Process::Sequential => "sequential",
            Process::Hierarchical => "hierarchical",
        }
    }
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
