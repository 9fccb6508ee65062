use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// LLM Provider types supported by merco-crews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Provider {
    /// OpenAI API
    OpenAI,
    /// OpenRouter gateway
    OpenRouter,
    /// Ollama local models, through the OpenAI compatible endpoint
    Ollama,
    /// Custom provider with custom base URL
    Custom(String),
}

impl Provider {
    /// Get the base URL for the provider
    pub fn get_base_url(&self) -> String {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1".to_string(),
            Provider::OpenRouter => "https://openrouter.ai/api/v1".to_string(),
            Provider::Ollama => "http://localhost:11434/v1".to_string(),
            Provider::Custom(url) => url.clone(),
        }
    }

    /// Environment variable holding the API key, if the provider needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Ollama | Provider::Custom(_) => None,
        }
    }

    /// Resolve a model prefix such as `ollama` in `ollama/llama3.2:latest`
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAI),
            "openrouter" => Some(Provider::OpenRouter),
            "ollama" | "ollama_chat" => Some(Provider::Ollama),
            _ => None,
        }
    }
}

/// LLM Configuration for merco-crews
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// The provider to use
    pub provider: Provider,
    /// API key for the provider
    pub api_key: Option<String>,
    /// Custom base URL (overrides default for provider)
    pub base_url: Option<String>,
    /// Additional headers for the request
    pub headers: Option<HashMap<String, String>>,
}

impl LlmConfig {
    /// Create a new LLM configuration
    pub fn new(provider: Provider, api_key: Option<String>) -> Self {
        Self {
            provider,
            api_key,
            base_url: None,
            headers: None,
        }
    }

    /// Configuration with the API key taken from the provider's environment variable
    pub fn from_env(provider: Provider) -> Self {
        let api_key = provider
            .api_key_env()
            .and_then(|name| std::env::var(name).ok());
        Self::new(provider, api_key)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Base URL actually used for requests
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.get_base_url())
    }
}

/// Defaults applied when a model is given as a plain `provider/model` string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    /// Root URL of the Ollama server, without the `/v1` suffix
    pub ollama_base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            ollama_base_url: "http://localhost:11434".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl ModelDefaults {
    /// Split `provider/model` into a provider configuration and the bare model name.
    ///
    /// An unknown or missing prefix means OpenAI with the whole string as model name,
    /// so `gpt-4o` and `openai/gpt-4o` select the same model.
    pub fn resolve(&self, model: &str) -> (LlmConfig, String) {
        let model = model.trim();
        let (provider, name) = match model.split_once('/') {
            Some((prefix, rest)) => match Provider::from_prefix(prefix) {
                Some(provider) => (provider, rest.to_string()),
                None => (Provider::OpenAI, model.to_string()),
            },
            None => (Provider::OpenAI, model.to_string()),
        };

        let mut config = LlmConfig::from_env(provider.clone());
        if provider == Provider::Ollama {
            config.base_url = Some(format!(
                "{}/v1",
                self.ollama_base_url.trim_end_matches('/')
            ));
        }
        (config, name)
    }
}
