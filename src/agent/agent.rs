use crate::agent::output_handler::OutputHandler;
use crate::agent::provider::{LlmConfig, ModelDefaults};
use crate::agent::role::AgentRole;
use crate::agent::state::AgentState;
use crate::llm::{LlmError, LlmProvider};
use crate::tools::Tool;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Core Agent structure
pub struct Agent {
    // Basic Information
    pub id: String,
    pub name: String,
    pub role: AgentRole,

    // LLM Configuration
    pub llm_config: AgentModelConfig,
    pub provider: Arc<dyn LlmProvider>,

    // Tools bound at declaration time; delegation tools are added per execution
    pub tools: Vec<Arc<dyn Tool>>,

    // Behaviour flags
    pub allow_delegation: bool,
    pub planning: bool,
    pub async_delegation: bool,
    pub verbose: bool,
    pub max_iter: usize,

    pub handoff: Option<String>,
    /// Suggestions collected by `train`, appended to the system prompt
    pub trained_suggestions: Vec<String>,

    pub output_handler: OutputHandler,

    pub(crate) state: Mutex<AgentState>,
}

impl Agent {
    pub(crate) fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clone for Agent {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
            llm_config: self.llm_config.clone(),
            provider: Arc::clone(&self.provider),
            tools: self.tools.clone(),
            allow_delegation: self.allow_delegation,
            planning: self.planning,
            async_delegation: self.async_delegation,
            verbose: self.verbose,
            max_iter: self.max_iter,
            handoff: self.handoff.clone(),
            trained_suggestions: self.trained_suggestions.clone(),
            output_handler: self.output_handler.clone(),
            state: Mutex::new(self.state().clone()),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role.role)
            .field("model", &self.llm_config.model_name)
            .field("tools", &self.tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>())
            .field("allow_delegation", &self.allow_delegation)
            .field("planning", &self.planning)
            .finish_non_exhaustive()
    }
}

/// LLM Configuration for agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentModelConfig {
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub llm_config: LlmConfig,
}

impl AgentModelConfig {
    pub fn new(llm_config: LlmConfig, model_name: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            model_name,
            temperature,
            max_tokens,
            llm_config,
        }
    }

    /// Resolve a `provider/model` string such as `ollama/llama3.2:latest`
    pub fn from_model(model: &str, defaults: &ModelDefaults) -> Self {
        let (llm_config, model_name) = defaults.resolve(model);
        Self::new(llm_config, model_name, defaults.temperature, defaults.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Agent error types
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
    #[error("Tool error: {0}")]
    Tool(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Agent '{agent}' gave no final answer within {max_iter} iterations")]
    MaxIterations { agent: String, max_iter: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Detailed information about a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool that was called
    pub tool_name: String,
    /// Parameters passed to the tool (as JSON string)
    pub parameters: String,
    /// Result returned by the tool
    pub result: String,
    /// Time taken to execute the tool in milliseconds
    pub execution_time_ms: u64,
    /// Any error that occurred during tool execution
    pub error: Option<String>,
}

impl ToolCall {
    pub fn new(tool_name: String, parameters: String, result: String, execution_time_ms: u64) -> Self {
        Self {
            tool_name,
            parameters,
            result,
            execution_time_ms,
            error: None,
        }
    }

    pub fn with_error(tool_name: String, parameters: String, error: String, execution_time_ms: u64) -> Self {
        Self {
            tool_name,
            parameters,
            result: String::new(),
            execution_time_ms,
            error: Some(error),
        }
    }

    /// Content sent back to the model as the tool message
    pub fn message(&self) -> String {
        match &self.error {
            Some(error) => format!(
                "Error: {}. Fix the arguments or use a different tool.",
                error
            ),
            None => self.result.clone(),
        }
    }
}

// Agent Response structure with execution metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The final answer of the agent
    pub content: String,
    /// Time taken to complete the task in milliseconds
    pub execution_time_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    /// Tools that were used during execution
    pub tools_used: Vec<String>,
    /// Detailed information about tool calls made during execution
    pub tool_calls: Vec<ToolCall>,
    /// Plan produced before execution when planning is enabled
    pub plan: Option<String>,
    pub model_used: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AgentResponse {
    pub fn new(
        content: String,
        input_tokens: u32,
        output_tokens: u32,
        tool_calls: Vec<ToolCall>,
        plan: Option<String>,
        model_used: String,
    ) -> Self {
        let mut tools_used: Vec<String> = Vec::new();
        for call in &tool_calls {
            if !tools_used.contains(&call.tool_name) {
                tools_used.push(call.tool_name.clone());
            }
        }
        Self {
            content,
            execution_time_ms: 0,
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            tools_used,
            tool_calls,
            plan,
            model_used,
            timestamp: chrono::Utc::now(),
        }
    }
}
