use serde::{Deserialize, Serialize};

use crate::agent::AgentResponse;
use crate::task::TaskOutput;

/// Token usage summed over every task of a kickoff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub successful_requests: u64,
}

impl UsageMetrics {
    pub fn record(&mut self, response: &AgentResponse) {
        self.prompt_tokens += response.input_tokens as u64;
        self.completion_tokens += response.output_tokens as u64;
        self.total_tokens += response.total_tokens as u64;
        self.successful_requests += 1;
    }
}

/// Result of a kickoff or replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Output of the last task
    pub raw: String,
    pub tasks_output: Vec<TaskOutput>,
    pub token_usage: UsageMetrics,
}

impl CrewOutput {
    pub fn new(tasks_output: Vec<TaskOutput>, token_usage: UsageMetrics) -> Self {
        let raw = tasks_output
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();
        Self {
            raw,
            tasks_output,
            token_usage,
        }
    }

    pub fn task_output(&self, name: &str) -> Option<&TaskOutput> {
        self.tasks_output.iter().find(|output| output.name == name)
    }
}

impl std::fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}
