use crate::agent::agent::Agent;
use crate::agent::state::{AgentState, AgentStatus, PerformanceMetrics};
use crate::task::Inputs;

impl Agent {
    pub fn get_performance_metrics(&self) -> PerformanceMetrics {
        self.state().performance_metrics.clone()
    }

    pub fn get_total_tasks(&self) -> u64 {
        self.state().performance_metrics.total_tasks
    }

    pub fn is_idle(&self) -> bool {
        self.state().status == AgentStatus::Idle
    }

    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == tool_name)
    }

    /// Copy of the agent with kickoff inputs substituted into its role, goal and backstory
    pub fn interpolated(&self, inputs: &Inputs) -> Self {
        let mut agent = self.clone();
        agent.role = self.role.interpolated(inputs);
        agent.state = std::sync::Mutex::new(AgentState::new());
        agent
    }

    pub fn with_trained_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.trained_suggestions = suggestions;
        self
    }

    /// Whether a coworker reference names this agent, by declaration name or role.
    ///
    /// Models often quote names or change their case, so both are normalised.
    pub fn matches_name(&self, reference: &str) -> bool {
        let wanted = normalize(reference);
        !wanted.is_empty() && (normalize(&self.name) == wanted || normalize(&self.role.role) == wanted)
    }

    pub fn get_status_summary(&self) -> String {
        let state = self.state();
        format!(
            "{} - Status: {:?}, Tasks: {}/{}, Success Rate: {:.1}%",
            self.name,
            state.status,
            state.performance_metrics.successful_tasks,
            state.performance_metrics.total_tasks,
            state.performance_metrics.get_success_rate() * 100.0
        )
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
}
