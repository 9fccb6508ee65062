//! The crews this binary ships, declared on top of the crew framework.

pub mod coding;
pub mod distressed_homes;

use chrono::Datelike;
use std::io::BufRead;
use tracing::info;

use crate::agent::{Agent, AgentBuilder, ModelDefaults};
use crate::config::{CrewFiles, Settings};
use crate::crew::{Crew, CrewBuilder, CrewError};
use crate::task::{Inputs, Task};

pub use coding::CodingCrew;
pub use distressed_homes::DistressedHomesCrew;

/// Topic used by `train` and `test` unless a crew asks for one
pub const DEFAULT_TEST_TOPIC: &str = "AI LLMs";

/// A crew that can be assembled from settings and driven from the command line
pub trait CrewDefinition: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Declare agents and tasks and assemble the crew
    fn build(&self, settings: &Settings) -> Result<Crew, CrewError>;

    /// Inputs of a normal run
    fn run_inputs(&self) -> Inputs;

    /// Inputs of a training session; `input` is where interactive crews read from
    fn train_inputs(&self, _input: &mut dyn BufRead) -> Result<Inputs, CrewError> {
        Ok(default_inputs(DEFAULT_TEST_TOPIC))
    }

    fn test_inputs(&self) -> Inputs {
        default_inputs(DEFAULT_TEST_TOPIC)
    }
}

/// Every registered crew
pub fn registry() -> Vec<Box<dyn CrewDefinition>> {
    vec![Box::new(CodingCrew), Box::new(DistressedHomesCrew)]
}

/// Look a crew up by name; `_` and `-` are interchangeable
pub fn find(name: &str) -> Option<Box<dyn CrewDefinition>> {
    let wanted = name.trim().replace('_', "-");
    registry()
        .into_iter()
        .find(|crew| crew.name().eq_ignore_ascii_case(&wanted))
}

/// `topic` plus `current_year`
pub fn default_inputs(topic: &str) -> Inputs {
    let mut inputs = Inputs::new();
    inputs.insert("topic".to_string(), topic.to_string());
    inputs.insert("current_year".to_string(), chrono::Local::now().year().to_string());
    inputs
}

/// Crew builder with the storage, output and training locations from the settings
pub(crate) fn crew_builder(name: &str, settings: &Settings) -> CrewBuilder {
    Crew::builder(name)
        .output_root(settings.output_root.clone())
        .storage_path(settings.kickoff_db_path(name))
        .trained_agents_file(settings.trained_agents_file.clone())
        .model_defaults(settings.model_defaults())
}

/// Start an agent from its YAML record, logging the handoff note it declares
pub(crate) fn declare_agent(
    files: &CrewFiles,
    name: &str,
    defaults: &ModelDefaults,
) -> Result<AgentBuilder, CrewError> {
    let config = files.agent(name)?;
    if let Some(handoff) = &config.handoff {
        info!("[HANDOFF] {} handoff: {}", name, handoff.trim());
    }
    Ok(Agent::from_config(name, config, defaults))
}

pub(crate) fn declare_task(files: &CrewFiles, name: &str, output_file: &str) -> Result<Task, CrewError> {
    let config = files.task(name)?;
    if let Some(handoff) = &config.handoff {
        info!("[HANDOFF] {} handoff: {}", name, handoff.trim());
    }
    Ok(Task::from_config(name, config).with_output_file(output_file))
}
