pub mod agent;
pub mod agent_constructors;
pub mod agent_execution;
pub mod agent_management;
pub mod agent_prompts;
pub mod output_handler;
pub mod provider;
pub mod role;
pub mod state;

// Re-export main types for easier access
pub use agent::Agent;
pub use agent::AgentError;
pub use agent::AgentModelConfig;
pub use agent::AgentResponse;
pub use agent::ToolCall;
pub use agent_constructors::{AgentBuilder, DEFAULT_MAX_ITER};
pub use output_handler::*;
pub use provider::*;
pub use role::*;
pub use state::*;
