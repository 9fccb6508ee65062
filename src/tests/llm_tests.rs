use crate::agent::{LlmConfig, Provider};
use crate::llm::*;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(tools: Vec<ToolDefinition>) -> CompletionRequest {
    CompletionRequest::new(
        vec![ChatMessage::system("You are terse."), ChatMessage::user("Hello")],
        "llama3.2:latest".to_string(),
        Some(0.7),
        Some(128),
        tools,
    )
}

fn provider(server: &MockServer, api_key: Option<&str>) -> OpenAICompatibleProvider {
    OpenAICompatibleProvider::new(
        format!("{}/v1/", server.uri()),
        api_key.map(str::to_string),
        HashMap::new(),
    )
}

#[tokio::test]
async fn test_message_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "llama3.2:latest",
            "messages": [
                {"role": "system", "content": "You are terse."},
                {"role": "user", "content": "Hello"}
            ],
            "max_tokens": 128
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = provider(&server, Some("test-key")).completion(request(Vec::new())).await.unwrap();

    assert_eq!(
        response.kind,
        CompletionKind::Message {
            content: "Hi!".to_string()
        }
    );
    assert_eq!(
        response.usage,
        Some(TokenUsage {
            prompt_tokens: 12,
            completion_tokens: 3
        })
    );
}

#[tokio::test]
async fn test_tool_call_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "tools": [{"type": "function", "function": {"name": "echo"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "echo", "arguments": "{\"text\":\"hi\"}"}
                }]
            }}]
        })))
        .mount(&server)
        .await;

    let tools = vec![ToolDefinition {
        name: "echo".to_string(),
        description: "Repeats text".to_string(),
        parameters: json!({"type": "object", "properties": {"text": {"type": "string"}}}),
    }];
    let response = provider(&server, None).completion(request(tools)).await.unwrap();

    assert_eq!(
        response.kind,
        CompletionKind::ToolCalls {
            calls: vec![ToolCallRequest::new("call_1", "echo", "{\"text\":\"hi\"}")]
        }
    );
    assert_eq!(response.usage, None);
}

#[tokio::test]
async fn test_api_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let error = provider(&server, Some("bad")).completion(request(Vec::new())).await.unwrap_err();
    match error {
        LlmError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Unauthorized");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_empty_choices() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let error = provider(&server, None).completion(request(Vec::new())).await.unwrap_err();
    assert!(matches!(error, LlmError::EmptyResponse));
}

#[tokio::test]
async fn test_get_provider_sends_custom_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("x-title", "merco-crews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "ok"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = LlmConfig::new(Provider::Custom(server.uri()), None).with_header("X-Title", "merco-crews");
    let provider = get_provider(&config).unwrap();
    let response = provider.completion(request(Vec::new())).await.unwrap();
    assert_eq!(response.kind, CompletionKind::Message { content: "ok".to_string() });
}

#[test]
fn test_get_provider_rejects_empty_base_url() {
    let config = LlmConfig::new(Provider::Custom(String::new()), None);
    assert!(matches!(get_provider(&config), Err(LlmError::Config(_))));
}

#[test]
fn test_tool_message_serialization() {
    let message = ChatMessage::tool("call_1", "result");
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value, json!({"role": "tool", "content": "result", "tool_call_id": "call_1"}));

    let message = ChatMessage::assistant_tool_calls(vec![ToolCallRequest::new("call_1", "echo", "{}")]);
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["tool_calls"][0]["type"], "function");
    assert!(value.get("content").is_none());
}
