//! Tools that let a manager, or an agent allowed to delegate, hand work to coworkers.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::agent::Agent;
use crate::task::{OutputFormat, Task};
use crate::tools::{optional_str, required_str, Tool, ToolError};

/// Delegated agents may delegate again, but only this many levels deep
pub const MAX_DELEGATION_DEPTH: usize = 2;

const COWORKER_EXPECTED_OUTPUT: &str =
    "Your best answer to your coworker asking you this, accounting for the context shared.";

/// The agents a delegating agent may reach
#[derive(Clone)]
pub struct Coworkers {
    agents: Vec<Arc<Agent>>,
    depth: usize,
}

impl Coworkers {
    pub fn new(agents: Vec<Arc<Agent>>) -> Self {
        Self { agents, depth: 0 }
    }

    /// The same coworkers without `agent`, so nobody delegates to themselves
    pub fn excluding(&self, agent: &Agent) -> Self {
        Self {
            agents: self
                .agents
                .iter()
                .filter(|candidate| candidate.id != agent.id)
                .cloned()
                .collect(),
            depth: self.depth,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Delegation tools over these coworkers; empty when there is nobody to delegate to
    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        if self.agents.is_empty() || self.depth >= MAX_DELEGATION_DEPTH {
            return Vec::new();
        }
        vec![
            Arc::new(DelegateWorkTool {
                coworkers: self.clone(),
            }),
            Arc::new(AskQuestionTool {
                coworkers: self.clone(),
            }),
        ]
    }

    fn names(&self) -> String {
        self.agents
            .iter()
            .map(|agent| agent.role.role.trim().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn find(&self, reference: &str) -> Result<&Arc<Agent>, ToolError> {
        self.agents
            .iter()
            .find(|agent| agent.matches_name(reference))
            .ok_or_else(|| {
                ToolError::InvalidArguments(format!(
                    "coworker '{}' not found, choose one of: {}",
                    reference,
                    self.names()
                ))
            })
    }

    async fn dispatch(&self, reference: &str, description: &str, context: &str) -> Result<String, ToolError> {
        let agent = self.find(reference)?;

        let nested = if agent.allow_delegation {
            Coworkers {
                agents: self.excluding(agent).agents,
                depth: self.depth + 1,
            }
            .tools()
        } else {
            Vec::new()
        };

        info!(coworker = %agent.name, depth = self.depth, "Delegating work");
        let task = Task::new("delegated_work", description, COWORKER_EXPECTED_OUTPUT)
            .with_output_format(OutputFormat::Text);

        let response = agent
            .execute_task(&task, Some(context), nested)
            .await
            .map_err(|e| {
                ToolError::Execution(format!("{} could not complete the work: {}", agent.role.role.trim(), e))
            })?;
        Ok(response.content)
    }
}

pub struct DelegateWorkTool {
    coworkers: Coworkers,
}

#[async_trait]
impl Tool for DelegateWorkTool {
    fn name(&self) -> &str {
        "delegate_work_to_coworker"
    }

    fn description(&self) -> String {
        format!(
            "Delegate a specific task to one of the following coworkers: {}. \
            The input to this tool should be the coworker, the task you want them to do, and ALL necessary context to execute the task; \
            they know nothing about the task, so share absolutely everything you know, don't reference things but instead explain them.",
            self.coworkers.names()
        )
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "The task to delegate" },
                "context": { "type": "string", "description": "The context for the task" },
                "coworker": { "type": "string", "description": "The role/name of the coworker to delegate to" }
            },
            "required": ["task", "context", "coworker"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let task = required_str(&args, "task")?;
        let coworker = required_str(&args, "coworker")?;
        let context = optional_str(&args, "context").unwrap_or_default();
        self.coworkers.dispatch(coworker, task, context).await
    }
}

pub struct AskQuestionTool {
    coworkers: Coworkers,
}

#[async_trait]
impl Tool for AskQuestionTool {
    fn name(&self) -> &str {
        "ask_question_to_coworker"
    }

    fn description(&self) -> String {
        format!(
            "Ask a specific question to one of the following coworkers: {}. \
            The input to this tool should be the coworker, the question you have for them, and ALL necessary context to ask the question properly; \
            they know nothing about the question, so share absolutely everything you know, don't reference things but instead explain them.",
            self.coworkers.names()
        )
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "description": "The question to ask" },
                "context": { "type": "string", "description": "The context for the question" },
                "coworker": { "type": "string", "description": "The role/name of the coworker to ask" }
            },
            "required": ["question", "context", "coworker"]
        })
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let question = required_str(&args, "question")?;
        let coworker = required_str(&args, "coworker")?;
        let context = optional_str(&args, "context").unwrap_or_default();
        self.coworkers.dispatch(coworker, question, context).await
    }
}
