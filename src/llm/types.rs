use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single message in a chat completion conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatMessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn new(
        role: ChatMessageRole,
        content: Option<String>,
        tool_calls: Option<Vec<ToolCallRequest>>,
        tool_call_id: Option<String>,
    ) -> Self {
        Self {
            role,
            content,
            tool_calls,
            tool_call_id,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::System, Some(content.into()), None, None)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::User, Some(content.into()), None, None)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatMessageRole::Assistant, Some(content.into()), None, None)
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self::new(ChatMessageRole::Assistant, None, Some(calls), None)
    }

    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            ChatMessageRole::Tool,
            Some(content.into()),
            None,
            Some(call_id.into()),
        )
    }

    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the model produced them
    pub arguments: String,
}

/// Tool schema advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<ToolDefinition>,
}

impl CompletionRequest {
    pub fn new(
        messages: Vec<ChatMessage>,
        model: String,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            messages,
            model,
            temperature,
            max_tokens,
            tools,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionKind {
    Message { content: String },
    ToolCalls { calls: Vec<ToolCallRequest> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub kind: CompletionKind,
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: CompletionKind::Message {
                content: content.into(),
            },
            usage: None,
        }
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            kind: CompletionKind::ToolCalls { calls },
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}
