use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::agent::{Agent, AgentError, AgentResponse, ToolCall};
use crate::llm::{
    ChatMessage, CompletionKind, CompletionRequest, TokenUsage, ToolCallRequest, ToolDefinition,
};
use crate::task::Task;
use crate::tools::Tool;

const MAX_RETRIES: usize = 3;

const FORCE_FINAL_ANSWER: &str = "You have used the maximum number of tool iterations. \
Do not call any more tools; give your best final answer now using the information you already have.";

impl Agent {
    /// Execute a task and return the final answer with execution metrics.
    ///
    /// `extra_tools` are added for this execution only; crews use them to hand
    /// delegation tools to managers and to agents allowed to delegate.
    pub async fn execute_task(
        &self,
        task: &Task,
        context: Option<&str>,
        extra_tools: Vec<Arc<dyn Tool>>,
    ) -> Result<AgentResponse, AgentError> {
        let start_time = Instant::now();
        self.state().start_task(task.name.clone());
        self.log_step(&format!("Started task '{}'", task.name));

        let result = self.process_task(task, context, extra_tools).await;
        let elapsed_ms = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(mut response) => {
                response.execution_time_ms = elapsed_ms;
                self.state()
                    .complete_task(true, elapsed_ms as f64, response.total_tokens);
                self.log_step(&format!(
                    "Finished task '{}' in {} ms ({} tool calls)",
                    task.name,
                    elapsed_ms,
                    response.tool_calls.len()
                ));
                Ok(response)
            }
            Err(error) => {
                self.state().complete_task(false, elapsed_ms as f64, 0);
                warn!(agent = %self.name, task = %task.name, "Task failed: {}", error);
                Err(error)
            }
        }
    }

    /// Core task processing logic: optional planning, tool loop and output validation
    async fn process_task(
        &self,
        task: &Task,
        context: Option<&str>,
        extra_tools: Vec<Arc<dyn Tool>>,
    ) -> Result<AgentResponse, AgentError> {
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.clone();
        for tool in extra_tools {
            if !tools.iter().any(|t| t.name() == tool.name()) {
                tools.push(tool);
            }
        }

        let mut usage = TokenUsage::default();
        let plan = if self.planning {
            Some(self.create_plan(task, context, &mut usage).await?)
        } else {
            None
        };

        let initial_messages = self.build_initial_messages(task, context, plan.as_deref(), &tools);
        let mut messages = initial_messages.clone();
        let mut tool_calls = Vec::new();

        for attempt in 1..=MAX_RETRIES {
            let raw_result = match self
                .run_tool_loop(&mut messages, &tools, &mut usage, &mut tool_calls)
                .await
            {
                Ok(raw) => raw,
                Err(AgentError::Llm(e)) if attempt < MAX_RETRIES => {
                    warn!(agent = %self.name, attempt, "LLM call failed, retrying: {}", e);
                    messages = initial_messages.clone();
                    continue;
                }
                Err(e) => return Err(e),
            };

            let validated = self
                .output_handler
                .process_output(&raw_result)
                .and_then(|output| {
                    task.validate_output(&output)
                        .map(|_| output)
                        .map_err(|e| e.to_string())
                });

            match validated {
                Ok(content) => {
                    return Ok(AgentResponse::new(
                        content,
                        usage.prompt_tokens,
                        usage.completion_tokens,
                        tool_calls,
                        plan,
                        self.llm_config.model_name.clone(),
                    ))
                }
                Err(validation_error) => {
                    if attempt == MAX_RETRIES {
                        return Err(AgentError::Validation(format!(
                            "Output validation failed after {} attempts: {}",
                            MAX_RETRIES, validation_error
                        )));
                    }
                    debug!(agent = %self.name, attempt, "Invalid output: {}", validation_error);
                    messages.push(ChatMessage::assistant(raw_result));
                    messages.push(ChatMessage::user(format!(
                        "Your previous response was invalid: {}. Please provide a corrected response in the required format.",
                        validation_error
                    )));
                }
            }
        }

        Err(AgentError::Validation("Maximum retry attempts exceeded".to_string()))
    }

    /// Ask the model for a step-by-step plan before doing the task
    async fn create_plan(
        &self,
        task: &Task,
        context: Option<&str>,
        usage: &mut TokenUsage,
    ) -> Result<String, AgentError> {
        let messages = vec![
            ChatMessage::system(self.build_system_prompt(&[])),
            ChatMessage::user(self.build_planning_prompt(task, context)),
        ];

        match self.complete(messages, Vec::new(), usage).await? {
            CompletionKind::Message { content } => {
                let plan = self.output_handler.clean(&content);
                self.log_step(&format!("Plan for '{}':\n{}", task.name, plan));
                Ok(plan)
            }
            CompletionKind::ToolCalls { .. } => Err(AgentError::Validation(
                "planning step answered with tool calls instead of a plan".to_string(),
            )),
        }
    }

    /// Call the model until it answers without tool calls
    async fn run_tool_loop(
        &self,
        messages: &mut Vec<ChatMessage>,
        tools: &[Arc<dyn Tool>],
        usage: &mut TokenUsage,
        records: &mut Vec<ToolCall>,
    ) -> Result<String, AgentError> {
        let definitions: Vec<ToolDefinition> = tools.iter().map(|tool| tool.definition()).collect();

        for _ in 0..self.max_iter {
            match self.complete(messages.clone(), definitions.clone(), usage).await? {
                CompletionKind::Message { content } => return Ok(content),
                CompletionKind::ToolCalls { calls } => {
                    messages.push(ChatMessage::assistant_tool_calls(calls.clone()));
                    let results = self.execute_tool_calls(&calls, tools).await;
                    for (call, record) in calls.iter().zip(results) {
                        messages.push(ChatMessage::tool(call.id.clone(), record.message()));
                        records.push(record);
                    }
                }
            }
        }

        messages.push(ChatMessage::user(FORCE_FINAL_ANSWER));
        match self.complete(messages.clone(), Vec::new(), usage).await? {
            CompletionKind::Message { content } => Ok(content),
            CompletionKind::ToolCalls { .. } => Err(AgentError::MaxIterations {
                agent: self.name.clone(),
                max_iter: self.max_iter,
            }),
        }
    }

    /// Single completion call with token accounting
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
        usage: &mut TokenUsage,
    ) -> Result<CompletionKind, AgentError> {
        let input_estimate = count_input_tokens(&messages);
        let request = CompletionRequest::new(
            messages,
            self.llm_config.model_name.clone(),
            Some(self.llm_config.temperature),
            Some(self.llm_config.max_tokens),
            tools,
        );

        let response = self.provider.completion(request).await?;
        match response.usage {
            Some(reported) => {
                usage.prompt_tokens += reported.prompt_tokens;
                usage.completion_tokens += reported.completion_tokens;
            }
            None => {
                usage.prompt_tokens += input_estimate;
                if let CompletionKind::Message { content } = &response.kind {
                    usage.completion_tokens += count_output_tokens(content);
                }
            }
        }
        Ok(response.kind)
    }

    /// Run the tool calls of one model turn, concurrently when async delegation is enabled
    async fn execute_tool_calls(&self, calls: &[ToolCallRequest], tools: &[Arc<dyn Tool>]) -> Vec<ToolCall> {
        if self.async_delegation && calls.len() > 1 {
            join_all(calls.iter().map(|call| self.execute_tool_call(call, tools))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute_tool_call(call, tools).await);
            }
            results
        }
    }

    async fn execute_tool_call(&self, call: &ToolCallRequest, tools: &[Arc<dyn Tool>]) -> ToolCall {
        let tool_name = call.function.name.clone();
        let tool_args = call.function.arguments.clone();
        self.log_step(&format!("Using tool '{}' with {}", tool_name, tool_args));

        let tool_start = Instant::now();
        let outcome = match tools.iter().find(|tool| tool.name() == tool_name) {
            Some(tool) => tool
                .call(parse_arguments(&tool_args))
                .await
                .map_err(|e| e.to_string()),
            None => Err(format!(
                "Tool '{}' does not exist. Available tools: {}",
                tool_name,
                tools
                    .iter()
                    .map(|tool| tool.name().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        };
        let tool_execution_time = tool_start.elapsed().as_millis() as u64;

        self.state().performance_metrics.record_tool_usage(
            &tool_name,
            outcome.is_ok(),
            tool_execution_time as f64,
        );

        match outcome {
            Ok(result) => ToolCall::new(tool_name, tool_args, result, tool_execution_time),
            Err(error) => {
                warn!(agent = %self.name, tool = %tool_name, "Tool execution error: {}", error);
                ToolCall::with_error(tool_name, tool_args, error, tool_execution_time)
            }
        }
    }

    pub(crate) fn log_step(&self, message: &str) {
        if self.verbose {
            info!(agent = %self.name, "{}", message);
        } else {
            debug!(agent = %self.name, "{}", message);
        }
    }
}

/// Arguments arrive as a JSON string; tolerate double encoding and empty strings
fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::String(inner)) => serde_json::from_str(&inner).unwrap_or(Value::String(inner)),
        Ok(value) => value,
        Err(_) if raw.trim().is_empty() => Value::Object(Default::default()),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Estimate input tokens from messages: ~3.5 characters per token for English text
fn count_input_tokens(messages: &[ChatMessage]) -> u32 {
    let total_chars: usize = messages
        .iter()
        .map(|msg| msg.text().len() + 20)
        .sum();
    (total_chars as f64 / 3.5) as u32
}

fn count_output_tokens(content: &str) -> u32 {
    (content.len() as f64 / 3.5) as u32
}
