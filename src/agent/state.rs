use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current state of an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub status: AgentStatus,
    pub current_task: Option<String>, // Task name
    pub last_activity: DateTime<Utc>,
    pub performance_metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentStatus {
    Idle,
    Processing,
    Error,
}

/// Performance metrics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_tasks: u64,
    pub successful_tasks: u64,
    pub failed_tasks: u64,
    pub average_response_time_ms: f64,
    pub average_tokens_used: f64,
    pub tool_usage_stats: HashMap<String, ToolUsageStats>,
    pub last_reset: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageStats {
    pub usage_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub average_execution_time_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl AgentState {
    pub fn new() -> Self {
        Self {
            status: AgentStatus::Idle,
            current_task: None,
            last_activity: Utc::now(),
            performance_metrics: PerformanceMetrics::new(),
        }
    }

    pub fn update_status(&mut self, status: AgentStatus) {
        self.status = status;
        self.last_activity = Utc::now();
    }

    pub fn start_task(&mut self, task_name: String) {
        self.current_task = Some(task_name);
        self.update_status(AgentStatus::Processing);
    }

    pub fn complete_task(&mut self, success: bool, response_time_ms: f64, tokens_used: u32) {
        self.current_task = None;
        self.update_status(if success { AgentStatus::Idle } else { AgentStatus::Error });
        self.performance_metrics
            .record_task_completion(success, response_time_ms, tokens_used);
    }
}

impl Default for AgentState {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self {
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            average_response_time_ms: 0.0,
            average_tokens_used: 0.0,
            tool_usage_stats: HashMap::new(),
            last_reset: Utc::now(),
        }
    }

    pub fn record_task_completion(&mut self, success: bool, response_time_ms: f64, tokens_used: u32) {
        self.total_tasks += 1;
        if success {
            self.successful_tasks += 1;
        } else {
            self.failed_tasks += 1;
        }

        // Update running averages
        self.average_response_time_ms =
            (self.average_response_time_ms * (self.total_tasks - 1) as f64 + response_time_ms) / self.total_tasks as f64;
        self.average_tokens_used =
            (self.average_tokens_used * (self.total_tasks - 1) as f64 + tokens_used as f64) / self.total_tasks as f64;
    }

    pub fn record_tool_usage(&mut self, tool_name: &str, success: bool, execution_time_ms: f64) {
        let stats = self
            .tool_usage_stats
            .entry(tool_name.to_string())
            .or_insert(ToolUsageStats {
                usage_count: 0,
                success_count: 0,
                failure_count: 0,
                average_execution_time_ms: 0.0,
                last_used: None,
            });

        stats.usage_count += 1;
        if success {
            stats.success_count += 1;
        } else {
            stats.failure_count += 1;
        }
        stats.average_execution_time_ms =
            (stats.average_execution_time_ms * (stats.usage_count - 1) as f64 + execution_time_ms) / stats.usage_count as f64;
        stats.last_used = Some(Utc::now());
    }

    pub fn get_success_rate(&self) -> f64 {
        if self.total_tasks == 0 {
            0.0
        } else {
            self.successful_tasks as f64 / self.total_tasks as f64
        }
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
