//! Human-in-the-loop training.
//!
//! Every task output of every training iteration is shown to a [`FeedbackSource`].
//! Once all iterations ran, the evaluator turns the feedback of each agent into
//! suggestions that are stored as JSON and added to that agent's prompt on later runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio::runtime::RuntimeFlavor;
use tracing::{info, warn};

use crate::agent::Agent;
use crate::crew::{Crew, CrewError};
use crate::task::{Inputs, JsonField, JsonFieldType, Task, TaskOutput};

/// Where training feedback comes from
pub trait FeedbackSource: Send + Sync {
    fn feedback(&self, output: &TaskOutput) -> Result<String, CrewError>;
}

/// Ask for feedback on the terminal
pub struct StdinFeedback;

impl FeedbackSource for StdinFeedback {
    fn feedback(&self, output: &TaskOutput) -> Result<String, CrewError> {
        let mut stdout = std::io::stdout();
        writeln!(
            stdout,
            "\n## Final Result of '{}' ({}):\n{}\n",
            output.name, output.agent, output.raw
        )
        .and_then(|_| {
            write!(
                stdout,
                "Provide feedback on the Final Result and Agent's actions. \
                Respond with 'looks good' to accept or provide specific improvement requests: "
            )
        })
        .and_then(|_| stdout.flush())
        .map_err(|e| CrewError::io("stdout", e))?;

        let mut line = String::new();
        blocking_io(|| std::io::stdin().lock().read_line(&mut line))
            .map_err(|e| CrewError::io("stdin", e))?;
        Ok(line.trim().to_string())
    }
}

/// Run blocking terminal IO from inside a kickoff.
///
/// On a multi-threaded runtime the worker hands its other tasks off while `f` blocks.
/// Elsewhere `f` simply runs in place.
pub fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Observes finished tasks during a kickoff
pub(crate) trait TaskObserver: Send + Sync {
    fn on_task_output(&self, output: &TaskOutput) -> Result<(), CrewError>;
}

/// One output of a training iteration with the feedback it received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingEntry {
    pub iteration: u32,
    pub agent: String,
    pub task_name: String,
    pub output: String,
    pub human_feedback: String,
}

/// What training learned about one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedAgentSuggestions {
    pub suggestions: Vec<String>,
    pub quality: f64,
    pub final_summary: String,
}

/// Trained suggestions by agent name
pub type TrainedAgents = BTreeMap<String, TrainedAgentSuggestions>;

/// Read trained suggestions; a missing file means nothing was trained yet
pub fn load_trained_agents(path: &Path) -> Result<TrainedAgents, CrewError> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(TrainedAgents::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TrainedAgents::new()),
        Err(e) => Err(CrewError::io(path, e)),
    }
}

pub fn save_trained_agents(path: &Path, trained: &TrainedAgents) -> Result<(), CrewError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| CrewError::io(parent, e))?;
        }
    }
    let content = serde_json::to_string_pretty(trained)?;
    std::fs::write(path, content).map_err(|e| CrewError::io(path, e))
}

struct FeedbackCollector<'a> {
    source: &'a dyn FeedbackSource,
    iteration: AtomicU32,
    entries: Mutex<Vec<TrainingEntry>>,
}

impl<'a> FeedbackCollector<'a> {
    fn new(source: &'a dyn FeedbackSource) -> Self {
        Self {
            source,
            iteration: AtomicU32::new(0),
            entries: Mutex::new(Vec::new()),
        }
    }

    fn into_entries(self) -> Vec<TrainingEntry> {
        self.entries
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskObserver for FeedbackCollector<'_> {
    fn on_task_output(&self, output: &TaskOutput) -> Result<(), CrewError> {
        let human_feedback = self.source.feedback(output)?;
        let entry = TrainingEntry {
            iteration: self.iteration.load(Ordering::SeqCst),
            agent: output.agent.clone(),
            task_name: output.name.clone(),
            output: output.raw.clone(),
            human_feedback,
        };
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
        Ok(())
    }
}

impl Crew {
    /// Run the crew `n_iterations` times collecting feedback, then store what each agent
    /// should do differently in `filename`, merged with earlier training results.
    pub async fn train(
        &self,
        n_iterations: u32,
        filename: &Path,
        inputs: &Inputs,
        feedback: &dyn FeedbackSource,
    ) -> Result<TrainedAgents, CrewError> {
        if n_iterations == 0 {
            return Err(CrewError::Training(
                "the number of iterations must be at least 1".to_string(),
            ));
        }

        let collector = FeedbackCollector::new(feedback);
        for iteration in 1..=n_iterations {
            info!(crew = %self.name, iteration, n_iterations, "Training iteration");
            collector.iteration.store(iteration, Ordering::SeqCst);
            self.kickoff_observed(inputs, Some(&collector)).await?;
        }

        let mut by_agent: BTreeMap<String, Vec<TrainingEntry>> = BTreeMap::new();
        for entry in collector.into_entries() {
            by_agent.entry(entry.agent.clone()).or_default().push(entry);
        }

        let evaluator = self.evaluator_agent(None)?;
        let mut trained = load_trained_agents(filename)?;
        for (agent, entries) in by_agent {
            let result = evaluate_training(&evaluator, &agent, &entries).await?;
            info!(agent = %agent, quality = result.quality, "Training evaluated");
            trained.insert(agent, result);
        }

        save_trained_agents(filename, &trained)?;
        info!("Training results saved to {}", filename.display());
        Ok(trained)
    }
}

async fn evaluate_training(
    evaluator: &Agent,
    agent: &str,
    entries: &[TrainingEntry],
) -> Result<TrainedAgentSuggestions, CrewError> {
    let mut data = String::new();
    for entry in entries {
        data.push_str(&format!(
            "Iteration {} - Task '{}':\nInitial Output:\n{}\n\nHuman Feedback:\n{}\n\n",
            entry.iteration, entry.task_name, entry.output, entry.human_feedback
        ));
    }

    let task = Task::new_with_json_output(
        "training_evaluation",
        format!(
            "Assess the quality of the training data of agent '{}' based on its outputs and the human feedback they received.\n\n\
            {}\
            Please provide:\n\
            - A list of clear, actionable instructions derived from the human feedback to enhance the agent's performance. \
            Analyze the differences between the outputs and what the feedback asked for.\n\
            - A score from 0 to 10 evaluating on completion, quality, and overall performance from the outputs and feedback.\n\
            - A short summary of the training.",
            agent, data
        ),
        "Suggestions for the agent, a quality score and a summary",
        vec![
            JsonField::new(
                "suggestions",
                JsonFieldType::Array(Box::new(JsonFieldType::String)),
                "actionable instructions for the agent",
            ),
            JsonField::new("quality", JsonFieldType::Number, "score from 0 to 10"),
            JsonField::new("final_summary", JsonFieldType::String, "summary of the training"),
        ],
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

    let mut result: TrainedAgentSuggestions = serde_json::from_str(response.content.trim())?;
    if !(0.0..=10.0).contains(&result.quality) {
        warn!(agent = %agent, quality = result.quality, "Training quality out of range, clamping");
        result.quality = result.quality.clamp(0.0, 10.0);
    }
    Ok(result)
}
