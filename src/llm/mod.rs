//! Chat-completion client used by every agent.
//!
//! All supported backends speak the OpenAI chat-completions protocol, so a
//! single HTTP provider covers OpenAI, OpenRouter, Ollama (through its `/v1`
//! compatibility layer) and custom gateways.

mod openai;
mod types;

pub use openai::OpenAICompatibleProvider;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

use crate::agent::provider::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Empty response from LLM provider")]
    EmptyResponse,
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn completion(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Factory function to create the provider for a configuration
pub fn get_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let base_url = config.resolved_base_url();
    if base_url.trim().is_empty() {
        return Err(LlmError::Config(format!(
            "No base URL configured for provider {:?}",
            config.provider
        )));
    }

    Ok(Arc::new(OpenAICompatibleProvider::new(
        base_url,
        config.api_key.clone(),
        config.headers.clone().unwrap_or_default(),
    )))
}
