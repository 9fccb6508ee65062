use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;
use crate::task::{interpolate, Inputs};

/// Role, goal and backstory that shape how an agent behaves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRole {
    /// Name of the role (e.g., "Senior Data Analyst")
    pub role: String,
    /// What the agent is trying to achieve
    pub goal: String,
    /// Background that frames the agent's answers
    pub backstory: String,
}

impl AgentRole {
    pub fn new(role: impl Into<String>, goal: impl Into<String>, backstory: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
        }
    }

    pub fn interpolated(&self, inputs: &Inputs) -> Self {
        Self {
            role: interpolate(&self.role, inputs),
            goal: interpolate(&self.goal, inputs),
            backstory: interpolate(&self.backstory, inputs),
        }
    }
}

impl From<&AgentConfig> for AgentRole {
    fn from(config: &AgentConfig) -> Self {
        Self::new(
            config.role.clone(),
            config.goal.clone(),
            config.backstory.clone(),
        )
    }
}
