use super::*;
use crate::commands;
use crate::config::Settings;
use crate::crew::{Crew, CrewError, FeedbackSource};
use crate::crews::{default_inputs, CrewDefinition};
use crate::task::{Inputs, Task, TaskOutput};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Crew whose definition cannot be assembled
struct BrokenCrew;

impl CrewDefinition for BrokenCrew {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn description(&self) -> &'static str {
        "Always fails to build"
    }

    fn build(&self, _settings: &Settings) -> Result<Crew, CrewError> {
        Err(CrewError::Validation("no agents declared".to_string()))
    }

    fn run_inputs(&self) -> Inputs {
        default_inputs("nothing")
    }
}

/// Single-agent crew backed by a mock provider
struct EchoCrew {
    provider: Arc<MockProvider>,
}

impl CrewDefinition for EchoCrew {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Writes one note"
    }

    fn build(&self, settings: &Settings) -> Result<Crew, CrewError> {
        let agent = mock_agent("writer", "Writer", self.provider.clone()).build()?;
        Crew::builder(self.name())
            .agent(agent)
            .task(
                Task::new("note_task", "Write a note about {topic}", "A note")
                    .with_agent("writer")
                    .with_output_file("note.md"),
            )
            .output_root(settings.output_root.clone())
            .storage_path(settings.kickoff_db_path(self.name()))
            .build()
    }

    fn run_inputs(&self) -> Inputs {
        default_inputs("default topic")
    }
}

struct LooksGood;

impl FeedbackSource for LooksGood {
    fn feedback(&self, _output: &TaskOutput) -> Result<String, CrewError> {
        Ok("looks good".to_string())
    }
}

fn settings(root: &Path) -> Settings {
    Settings {
        output_root: root.join("output"),
        storage_dir: root.join("state"),
        ..Settings::default()
    }
}

#[tokio::test]
async fn test_run_failure_is_wrapped() {
    let temp_dir = TempDir::new().unwrap();
    let error = commands::run(&BrokenCrew, &settings(temp_dir.path()), None)
        .await
        .unwrap_err();

    assert_eq!(
        format!("{:#}", error),
        "An error occurred while running the crew: Invalid crew: no agents declared"
    );
}

#[tokio::test]
async fn test_every_command_names_its_operation() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());

    let error = commands::train(
        &BrokenCrew,
        &settings,
        1,
        &temp_dir.path().join("trained.json"),
        &Inputs::new(),
        &LooksGood,
    )
    .await
    .unwrap_err();
    assert!(format!("{:#}", error).starts_with("An error occurred while training the crew: "));

    let error = commands::replay(&BrokenCrew, &settings, "task").await.unwrap_err();
    assert!(format!("{:#}", error).starts_with("An error occurred while replaying the crew: "));

    let error = commands::test(&BrokenCrew, &settings, 1, "openai/gpt-4o-mini")
        .await
        .unwrap_err();
    assert!(format!("{:#}", error).starts_with("An error occurred while testing the crew: "));

    let error = commands::log_tasks_outputs(&BrokenCrew, &settings).await.unwrap_err();
    assert!(format!("{:#}", error)
        .starts_with("An error occurred while reading the task outputs of the crew: "));
}

#[tokio::test]
async fn test_run_with_topic_override() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    let provider = MockProvider::replying("A note on tide pools");
    let crew = EchoCrew {
        provider: provider.clone(),
    };

    let output = commands::run(&crew, &settings, Some("tide pools".to_string()))
        .await
        .unwrap();

    assert_eq!(output.raw, "A note on tide pools");
    assert!(user_text(&provider.requests()[0]).contains("Write a note about tide pools"));
    let note = std::fs::read_to_string(settings.output_root.join("note.md")).unwrap();
    assert_eq!(note, "A note on tide pools\n");

    let records = commands::log_tasks_outputs(&crew, &settings).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task_name, "note_task");
    assert_eq!(records[0].inputs["topic"], "tide pools");
}

#[tokio::test]
async fn test_replay_of_unknown_task_is_wrapped() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    let crew = EchoCrew {
        provider: MockProvider::replying("note"),
    };

    commands::run(&crew, &settings, None).await.unwrap();
    let error = commands::replay(&crew, &settings, "missing").await.unwrap_err();
    assert_eq!(
        format!("{:#}", error),
        "An error occurred while replaying the crew: Task 'missing' not found in the latest kickoff"
    );

    let output = commands::replay(&crew, &settings, "note_task").await.unwrap();
    assert_eq!(output.tasks_output.len(), 1);
}
