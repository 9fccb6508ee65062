use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::agent::{Agent, AgentModelConfig};
use crate::crew::{Crew, CrewError};
use crate::task::{Inputs, JsonField, JsonFieldType, Task, TaskOutput};

/// Scores one task received across test runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskScores {
    pub task_name: String,
    pub scores: Vec<f64>,
}

impl TaskScores {
    pub fn average(&self) -> f64 {
        average(&self.scores)
    }
}

/// Scores and timings of `Crew::test`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub iterations: u32,
    pub tasks: Vec<TaskScores>,
    pub execution_times_secs: Vec<f64>,
}

impl TestReport {
    /// Average task score of one run, 1-based; 0 for a run that never happened
    pub fn crew_score(&self, run: usize) -> f64 {
        let Some(index) = run.checked_sub(1) else {
            return 0.0;
        };
        let scores: Vec<f64> = self
            .tasks
            .iter()
            .filter_map(|task| task.scores.get(index).copied())
            .collect();
        average(&scores)
    }

    pub fn overall_average(&self) -> f64 {
        let scores: Vec<f64> = (1..=self.iterations as usize).map(|run| self.crew_score(run)).collect();
        average(&scores)
    }

    /// Plain text table: one row per task, one column per run and the average
    pub fn render_table(&self) -> String {
        let label_width = self
            .tasks
            .iter()
            .map(|task| task.task_name.len())
            .chain(["Tasks/Crew".len(), "Execution Time (s)".len()])
            .max()
            .unwrap_or(10);

        let mut header = format!("{:<width$}", "Tasks/Crew", width = label_width);
        for run in 1..=self.iterations {
            header.push_str(&format!(" | {:>7}", format!("Run {}", run)));
        }
        header.push_str(&format!(" | {:>10}", "Avg. Total"));

        let mut lines = vec![header.clone(), "-".repeat(header.len())];
        for task in &self.tasks {
            let mut line = format!("{:<width$}", task.task_name, width = label_width);
            for score in &task.scores {
                line.push_str(&format!(" | {:>7.1}", score));
            }
            line.push_str(&format!(" | {:>10.1}", task.average()));
            lines.push(line);
        }

        let mut crew_line = format!("{:<width$}", "Crew", width = label_width);
        for run in 1..=self.iterations as usize {
            crew_line.push_str(&format!(" | {:>7.1}", self.crew_score(run)));
        }
        crew_line.push_str(&format!(" | {:>10.1}", self.overall_average()));
        lines.push(crew_line);

        let mut time_line = format!("{:<width$}", "Execution Time (s)", width = label_width);
        for secs in &self.execution_times_secs {
            time_line.push_str(&format!(" | {:>7.0}", secs));
        }
        time_line.push_str(&format!(" | {:>10.0}", average(&self.execution_times_secs)));
        lines.push(time_line);

        lines.join("\n")
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Crew {
    /// Run the crew `n_iterations` times and score each task output with `eval_llm`
    pub async fn test(&self, n_iterations: u32, eval_llm: &str, inputs: &Inputs) -> Result<TestReport, CrewError> {
        let llm = AgentModelConfig::from_model(eval_llm, &self.model_defaults);
        let evaluator = self.evaluator_agent(Some(llm))?;
        self.test_with_evaluator(n_iterations, &evaluator, inputs).await
    }

    pub async fn test_with_evaluator(
        &self,
        n_iterations: u32,
        evaluator: &Agent,
        inputs: &Inputs,
    ) -> Result<TestReport, CrewError> {
        if n_iterations == 0 {
            return Err(CrewError::Evaluation(
                "the number of iterations must be at least 1".to_string(),
            ));
        }

        let mut tasks: Vec<TaskScores> = self
            .tasks()
            .iter()
            .map(|task| TaskScores {
                task_name: task.name.clone(),
                scores: Vec::new(),
            })
            .collect();
        let mut execution_times_secs = Vec::new();

        for run in 1..=n_iterations {
            info!(crew = %self.name, run, n_iterations, "Test run");
            let started = Instant::now();
            let output = self.kickoff(inputs).await?;
            execution_times_secs.push(started.elapsed().as_secs_f64());

            for task_output in &output.tasks_output {
                let score = score_task_output(evaluator, task_output).await?;
                if let Some(entry) = tasks.iter_mut().find(|entry| entry.task_name == task_output.name) {
                    entry.scores.push(score);
                }
            }
        }

        let report = TestReport {
            iterations: n_iterations,
            tasks,
            execution_times_secs,
        };
        info!("Task scores (1-10 higher is better):\n{}", report.render_table());
        Ok(report)
    }
}

async fn score_task_output(evaluator: &Agent, output: &TaskOutput) -> Result<f64, CrewError> {
    let task = Task::new_with_json_output(
        "evaluate_task_output",
        format!(
            "Based on the task description and the expected output, compare and evaluate the performance of the agents \
            in the crew based on the Task Output they have performed using score from 1 to 10 evaluating on completion, \
            quality, and overall performance.\n\n\
            task_description: {}\n\n\
            task_expected_output: {}\n\n\
            agent: {}\n\n\
            Task Output: {}",
            output.description, output.expected_output, output.agent, output.raw
        ),
        "Evaluation score from 1 to 10 based on the performance of the agents on the tasks",
        vec![JsonField::new(
            "quality",
            JsonFieldType::Number,
            "score from 1 to 10",
        )],
        Vec::new(),
        false,
    );

    let response = evaluator
        .execute_task(&task, None, Vec::new())
        .await
        .map_err(|source| CrewError::Task {
            task: task.name.clone(),
            source,
        })?;

    let value: serde_json::Value = serde_json::from_str(response.content.trim())?;
    let quality = value
        .get("quality")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| CrewError::Evaluation(format!("evaluator gave no quality score: {}", response.content)))?;
    Ok(quality.clamp(1.0, 10.0))
}
