use std::sync::Arc;

use crate::agent::agent::Agent;
use crate::llm::ChatMessage;
use crate::task::Task;
use crate::tools::Tool;

impl Agent {
    /// Build initial messages for the agent
    pub fn build_initial_messages(
        &self,
        task: &Task,
        context: Option<&str>,
        plan: Option<&str>,
        tools: &[Arc<dyn Tool>],
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.build_system_prompt(tools)),
            ChatMessage::user(self.build_task_prompt(task, context, plan)),
        ]
    }

    /// Build system prompt for the agent
    pub(crate) fn build_system_prompt(&self, tools: &[Arc<dyn Tool>]) -> String {
        let mut prompt = format!(
            "You are {}. {}\nYour personal goal is: {}",
            self.role.role.trim(),
            self.role.backstory.trim(),
            self.role.goal.trim()
        );

        if !tools.is_empty() {
            prompt.push_str("\n\nYou ONLY have access to the following tools, and should NEVER make up tools that are not listed here:\n");
            for tool in tools {
                prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
            }
            prompt.push_str("Use a tool only when it helps; once you know the final answer, reply with it directly.");
        }

        if !self.trained_suggestions.is_empty() {
            prompt.push_str("\n\nApply these suggestions collected while training this crew:\n");
            for suggestion in &self.trained_suggestions {
                prompt.push_str(&format!("- {}\n", suggestion));
            }
        }

        prompt
    }

    /// Build task-specific prompt
    pub(crate) fn build_task_prompt(&self, task: &Task, context: Option<&str>, plan: Option<&str>) -> String {
        let mut prompt = format!("Current Task: {}", task.description.trim());

        prompt.push_str(&format!(
            "\n\nThis is the expected criteria for your final answer: {}\nyou MUST return the actual complete content as the final answer, not a summary.",
            task.expected_output.trim()
        ));

        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!(
                "\n\nThis is the context you're working with:\n{}",
                context.trim()
            ));
        }

        if let Some(plan) = plan.filter(|p| !p.trim().is_empty()) {
            prompt.push_str(&format!("\n\nFollow the plan you prepared:\n{}", plan.trim()));
        }

        prompt.push_str(&format!("\n\nIMPORTANT - Output Format: {}", task.get_format_prompt()));
        prompt
    }

    /// Prompt asking the agent for a plan before it starts working
    pub(crate) fn build_planning_prompt(&self, task: &Task, context: Option<&str>) -> String {
        let mut prompt = format!(
            "Before working on the task below, write a concise, numbered step-by-step plan for how you will complete it. \
            Do not do the task yet; return only the plan.\n\nTask: {}\n\nExpected output: {}",
            task.description.trim(),
            task.expected_output.trim()
        );
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("\n\nAvailable context:\n{}", context.trim()));
        }
        prompt
    }
}
