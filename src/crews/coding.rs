use std::io::BufRead;
use std::sync::Arc;

use super::{crew_builder, declare_agent, declare_task, default_inputs, CrewDefinition};
use crate::agent::AgentModelConfig;
use crate::config::{CrewFiles, Settings};
use crate::crew::{Crew, CrewError, Process};
use crate::task::Inputs;
use crate::tools::{CodeInterpreterTool, SerperDevTool, Tool};

pub const NAME: &str = "coding";

/// Model of the manager and of the hierarchical crew manager
pub const GENERAL_MODEL: &str = "ollama/llama3.2:latest";
/// Model of the coding experts
pub const CODE_MODEL: &str = "ollama/deepseek-r1:latest";

const AGENTS_YAML: &str = include_str!("../../crews/coding/agents.yaml");
const TASKS_YAML: &str = include_str!("../../crews/coding/tasks.yaml");

const RUN_TOPIC: &str = "You are tasked with building a powerful, user-friendly desktop application that enables users to \
visually create, configure, and orchestrate AI agents, tasks, and tools utilizing the crewAI framework as the backend for \
agent and task orchestration, with a modern React.jsx frontend delivering an intuitive GUI. The app must be packaged using a \
desktop runtime (such as Electron, Tauri, or similar) to ensure cross-platform compatibility. Core features should include \
modules for agent creation (with configuration and visualization), comprehensive GUI for adding, editing, and deleting tasks \
and tools, clear assignment and ordering of tasks to agents, and a real-time project visualization dashboard showing \
agent-task relationships, execution progress, and logs. Implement robust export functionality that allows users to select \
any output folder and export the entire configured project, including configuration files, source code, and supporting \
assets, ready for deployment or sharing. The user journey must support starting new or existing projects, using a stepwise, \
guided interface to create agents, define tasks/tools, visually link tasks to agents and manage dependencies, preview \
orchestration flows, and finalize exports. Ensure modular code for extensibility (e.g., plug-ins for agent/task types), \
strict frontend-backend separation, thorough input validation, informative error messages, onboarding guides, and include \
templates/sample agents/tasks for rapid onboarding. Final deliverables are the complete, production-ready application, full \
source code, and comprehensive setup/usage/customization documentation. Usability, modularity, and seamless export must be \
prioritized for future extensibility.";

/// Manager plus full-stack, backend and visualization experts building an application
pub struct CodingCrew;

impl CrewDefinition for CodingCrew {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Coding experts coordinated by a manager to design and build a desktop application"
    }

    fn build(&self, settings: &Settings) -> Result<Crew, CrewError> {
        let files = CrewFiles::load(&settings.config_dir, NAME, AGENTS_YAML, TASKS_YAML)?;
        let defaults = settings.model_defaults();
        let llm = AgentModelConfig::from_model(GENERAL_MODEL, &defaults);
        let code_llm = AgentModelConfig::from_model(CODE_MODEL, &defaults);

        let search_tool: Arc<dyn Tool> = Arc::new(SerperDevTool::from_env());
        let code_interpreter: Arc<dyn Tool> = Arc::new(CodeInterpreterTool::new());

        let manager = declare_agent(&files, "manager_llm", &defaults)?
            .llm(llm.clone())
            .tool(Arc::clone(&search_tool))
            .allow_delegation(true)
            .planning(true)
            .async_delegation(true)
            .verbose(true)
            .build()?;

        let mut agents = vec![manager];
        for name in ["fullstack_coding_expert", "backend_coding_expert", "visualization_engineer"] {
            agents.push(
                declare_agent(&files, name, &defaults)?
                    .llm(code_llm.clone())
                    .tool(Arc::clone(&code_interpreter))
                    .allow_delegation(true)
                    .planning(true)
                    .verbose(true)
                    .build()?,
            );
        }

        let tasks = vec![
            declare_task(&files, "fullstack_coding_task", "fullstack_solution.md")?,
            declare_task(&files, "backend_coding_task", "backend_solution.md")?,
            declare_task(&files, "visualization_task", "visualization.md")?,
            declare_task(&files, "manager_task", "manager_meta_report.md")?,
        ];

        crew_builder(NAME, settings)
            .agents(agents)
            .tasks(tasks)
            .process(Process::Hierarchical)
            .manager_llm(llm)
            .verbose(true)
            .async_delegation(true)
            .allow_delegation(true)
            .build()
    }

    fn run_inputs(&self) -> Inputs {
        default_inputs(RUN_TOPIC)
    }

    /// Asks for the topic on the terminal
    fn train_inputs(&self, input: &mut dyn BufRead) -> Result<Inputs, CrewError> {
        print!("Enter the topic for the crew: ");
        std::io::Write::flush(&mut std::io::stdout()).map_err(|e| CrewError::io("stdout", e))?;

        let mut topic = String::new();
        input
            .read_line(&mut topic)
            .map_err(|e| CrewError::io("stdin", e))?;
        Ok(default_inputs(topic.trim()))
    }
}
