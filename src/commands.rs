//! Entry points behind the CLI subcommands.
//!
//! Each one builds the crew, invokes a single crew operation and wraps any failure,
//! including a failed build, with the operation it was attempting.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

use crate::config::Settings;
use crate::crew::{CrewOutput, FeedbackSource, KickoffRecord, TestReport, TrainedAgents};
use crate::crews::CrewDefinition;
use crate::task::Inputs;

pub async fn run(crew: &dyn CrewDefinition, settings: &Settings, topic: Option<String>) -> Result<CrewOutput> {
    let mut inputs = crew.run_inputs();
    if let Some(topic) = topic {
        inputs.insert("topic".to_string(), topic);
    }

    let result = async {
        let crew = crew.build(settings)?;
        crew.kickoff(&inputs).await
    }
    .await;

    if let Err(e) = &result {
        error!(crew = crew.name(), "Crew run failed: {:?}", e);
    }
    result.context("An error occurred while running the crew")
}

pub async fn train(
    crew: &dyn CrewDefinition,
    settings: &Settings,
    n_iterations: u32,
    filename: &Path,
    inputs: &Inputs,
    feedback: &dyn FeedbackSource,
) -> Result<TrainedAgents> {
    let result = async {
        let crew = crew.build(settings)?;
        crew.train(n_iterations, filename, inputs, feedback).await
    }
    .await;

    result.context("An error occurred while training the crew")
}

pub async fn replay(crew: &dyn CrewDefinition, settings: &Settings, task_id: &str) -> Result<CrewOutput> {
    let result = async {
        let crew = crew.build(settings)?;
        crew.replay(task_id).await
    }
    .await;

    result.context("An error occurred while replaying the crew")
}

pub async fn test(
    crew: &dyn CrewDefinition,
    settings: &Settings,
    n_iterations: u32,
    eval_llm: &str,
) -> Result<TestReport> {
    let inputs = crew.test_inputs();
    let result = async {
        let crew = crew.build(settings)?;
        crew.test(n_iterations, eval_llm, &inputs).await
    }
    .await;

    result.context("An error occurred while testing the crew")
}

/// Task outputs of the latest kickoff, used to pick a task to replay from
pub async fn log_tasks_outputs(crew: &dyn CrewDefinition, settings: &Settings) -> Result<Vec<KickoffRecord>> {
    let result = async {
        let crew = crew.build(settings)?;
        crew.task_outputs_log().await
    }
    .await;

    let records = result.context("An error occurred while reading the task outputs of the crew")?;
    info!(crew = crew.name(), "{} task outputs in the latest kickoff", records.len());
    Ok(records)
}
