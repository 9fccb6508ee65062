//! Tools agents can call during task execution.

mod code;
mod web;

pub use code::CodeInterpreterTool;
pub use web::{parse_html, ParsedPage, ScrapeWebsiteTool, SerperDevTool};

use async_trait::async_trait;
use serde_json::Value;

use crate::llm::ToolDefinition;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing configuration: {0}")]
    MissingConfig(String),
    #[error("Tool execution failed: {0}")]
    Execution(String),
    #[error("Tool timed out after {0} seconds")]
    Timeout(u64),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> String;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn call(&self, args: Value) -> Result<String, ToolError>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Read a required string argument
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing string field '{}'", key)))
}

/// Read an optional string argument, treating empty strings as absent
pub fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
}
