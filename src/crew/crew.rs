use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::{Agent, AgentModelConfig, AgentRole, ModelDefaults};
use crate::crew::delegation::Coworkers;
use crate::crew::output::{CrewOutput, UsageMetrics};
use crate::crew::process::Process;
use crate::crew::storage::{KickoffRecord, KickoffTaskOutputsStorage};
use crate::crew::training::{load_trained_agents, TaskObserver, TrainedAgents};
use crate::crew::CrewError;
use crate::task::{Inputs, Task, TaskOutput};

/// Name of the manager agent a hierarchical crew creates from its manager LLM
pub const MANAGER_NAME: &str = "crew_manager";

const CONTEXT_SEPARATOR: &str = "\n\n----------\n\n";

/// A set of agents working through an ordered list of tasks
pub struct Crew {
    pub name: String,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    pub process: Process,
    manager: Option<Agent>,
    pub verbose: bool,
    output_root: PathBuf,
    results_dir: Option<PathBuf>,
    storage_path: Option<PathBuf>,
    trained_agents_file: Option<PathBuf>,
    pub(crate) model_defaults: ModelDefaults,
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("name", &self.name)
            .field("process", &self.process)
            .field("agents", &self.agents.iter().map(|a| a.name.as_str()).collect::<Vec<_>>())
            .field("tasks", &self.tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>())
            .field("manager", &self.manager.as_ref().map(|m| m.name.as_str()))
            .finish_non_exhaustive()
    }
}

pub struct CrewBuilder {
    name: String,
    agents: Vec<Agent>,
    tasks: Vec<Task>,
    process: Process,
    manager_llm: Option<AgentModelConfig>,
    manager_agent: Option<Agent>,
    verbose: bool,
    allow_delegation: bool,
    async_delegation: bool,
    planning: bool,
    output_root: PathBuf,
    results_dir: Option<PathBuf>,
    storage_path: Option<PathBuf>,
    trained_agents_file: Option<PathBuf>,
    model_defaults: ModelDefaults,
}

impl Crew {
    pub fn builder(name: impl Into<String>) -> CrewBuilder {
        CrewBuilder {
            name: name.into(),
            agents: Vec::new(),
            tasks: Vec::new(),
            process: Process::Sequential,
            manager_llm: None,
            manager_agent: None,
            verbose: false,
            allow_delegation: false,
            async_delegation: false,
            planning: false,
            output_root: PathBuf::from("."),
            results_dir: None,
            storage_path: None,
            trained_agents_file: None,
            model_defaults: ModelDefaults::default(),
        }
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn manager(&self) -> Option<&Agent> {
        self.manager.as_ref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Run every task in order with the given inputs
    pub async fn kickoff(&self, inputs: &Inputs) -> Result<CrewOutput, CrewError> {
        self.kickoff_observed(inputs, None).await
    }

    pub(crate) async fn kickoff_observed(
        &self,
        inputs: &Inputs,
        observer: Option<&dyn TaskObserver>,
    ) -> Result<CrewOutput, CrewError> {
        info!(
            crew = %self.name,
            process = %self.process,
            tasks = self.tasks.len(),
            "Crew kickoff"
        );

        let storage = self.open_storage().await?;
        if let Some(storage) = &storage {
            storage.reset().await?;
        }

        self.execute(inputs, 0, Vec::new(), storage.as_ref(), false, observer)
            .await
    }

    /// Re-run the crew from a task of the latest kickoff, reusing the outputs before it.
    ///
    /// `task_id` may be the task id recorded in the kickoff log or the task name.
    pub async fn replay(&self, task_id: &str) -> Result<CrewOutput, CrewError> {
        // Without a kickoff log no task of a latest kickoff can be found
        let Some(storage) = self.open_storage().await? else {
            return Err(CrewError::TaskNotFound(task_id.to_string()));
        };

        let records = storage.load().await?;
        let record = records
            .iter()
            .find(|record| record.task_id == task_id || record.task_name == task_id)
            .ok_or_else(|| CrewError::TaskNotFound(task_id.to_string()))?;

        let start = record.task_index;
        if start >= self.tasks.len() || self.tasks[start].name != record.task_name {
            return Err(CrewError::Validation(format!(
                "kickoff log entry '{}' does not match the tasks of crew '{}'",
                record.task_name, self.name
            )));
        }

        let inputs = record.inputs.clone();
        let prior: Vec<TaskOutput> = records
            .iter()
            .filter(|earlier| earlier.task_index < start)
            .map(|earlier| earlier.output.clone())
            .collect();

        info!(crew = %self.name, task = %record.task_name, "Replaying from task");
        storage.delete_from(start).await?;
        self.execute(&inputs, start, prior, Some(&storage), true, None)
            .await
    }

    /// Task outputs recorded by the latest kickoff
    pub async fn task_outputs_log(&self) -> Result<Vec<KickoffRecord>, CrewError> {
        match self.open_storage().await? {
            Some(storage) => Ok(storage.load().await?),
            None => Ok(Vec::new()),
        }
    }

    async fn open_storage(&self) -> Result<Option<KickoffTaskOutputsStorage>, CrewError> {
        match &self.storage_path {
            Some(path) => Ok(Some(KickoffTaskOutputsStorage::new(path).await?)),
            None => Ok(None),
        }
    }

    async fn execute(
        &self,
        inputs: &Inputs,
        start: usize,
        prior: Vec<TaskOutput>,
        storage: Option<&KickoffTaskOutputsStorage>,
        replayed: bool,
        observer: Option<&dyn TaskObserver>,
    ) -> Result<CrewOutput, CrewError> {
        let trained = self.load_trained()?;
        let agents: Vec<Arc<Agent>> = self
            .agents
            .iter()
            .map(|agent| Arc::new(prepare_agent(agent, inputs, &trained)))
            .collect();
        let manager = self
            .manager
            .as_ref()
            .map(|agent| Arc::new(prepare_agent(agent, inputs, &trained)));
        let tasks: Vec<Task> = self.tasks.iter().map(|task| task.interpolated(inputs)).collect();

        self.prepare_output_dirs(&tasks).await?;

        let coworkers = Coworkers::new(agents.clone());
        let mut outputs = prior;
        let mut usage = UsageMetrics::default();

        for (index, task) in tasks.iter().enumerate().skip(start) {
            let (executor, extra_tools) = match self.process {
                Process::Sequential => {
                    let agent_name = task.agent.as_deref().unwrap_or_default();
                    let agent = agents
                        .iter()
                        .find(|agent| agent.name == agent_name)
                        .ok_or_else(|| CrewError::AgentNotFound(agent_name.to_string()))?;
                    let tools = if agent.allow_delegation {
                        coworkers.excluding(agent).tools()
                    } else {
                        Vec::new()
                    };
                    (Arc::clone(agent), tools)
                }
                Process::Hierarchical => {
                    let manager = manager.as_ref().ok_or_else(|| {
                        CrewError::Validation("hierarchical crew has no manager".to_string())
                    })?;
                    (Arc::clone(manager), coworkers.tools())
                }
            };

            let context = build_context(task, &outputs);
            debug!(task = %task.name, agent = %executor.name, "Executing task");

            let response = executor
                .execute_task(task, context.as_deref(), extra_tools)
                .await
                .map_err(|source| CrewError::Task {
                    task: task.name.clone(),
                    source,
                })?;
            usage.record(&response);

            let output = TaskOutput {
                task_id: task.id.clone(),
                name: task.name.clone(),
                description: task.description.clone(),
                expected_output: task.expected_output.clone(),
                agent: executor.name.clone(),
                raw: response.content,
                output_file: task.output_file.clone(),
            };

            if let Some(path) = task.output_path(&self.output_root) {
                tokio::fs::write(&path, output.to_markdown())
                    .await
                    .map_err(|e| CrewError::io(&path, e))?;
                debug!("Wrote {}", path.display());
            }
            if let Some(storage) = storage {
                storage
                    .add(&KickoffRecord::new(index, task, &output, inputs, replayed))
                    .await?;
            }
            if let Some(observer) = observer {
                observer.on_task_output(&output)?;
            }

            info!(crew = %self.name, "Task completed: {}", output.summary());
            outputs.push(output);
        }

        for agent in agents.iter().chain(manager.iter()) {
            debug!("{}", agent.get_status_summary());
        }

        Ok(CrewOutput::new(outputs, usage))
    }

    /// Results and output directories exist before the first task runs
    async fn prepare_output_dirs(&self, tasks: &[Task]) -> Result<(), CrewError> {
        let mut dirs = vec![self.output_root.clone()];
        if let Some(results_dir) = &self.results_dir {
            dirs.push(self.output_root.join(results_dir));
        }
        for task in tasks {
            if let Some(parent) = task.output_path(&self.output_root).and_then(|p| p.parent().map(Path::to_path_buf)) {
                dirs.push(parent);
            }
        }

        for dir in dirs {
            if dir.as_os_str().is_empty() {
                continue;
            }
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| CrewError::io(&dir, e))?;
        }
        Ok(())
    }

    fn load_trained(&self) -> Result<TrainedAgents, CrewError> {
        match &self.trained_agents_file {
            Some(path) => load_trained_agents(path),
            None => Ok(TrainedAgents::new()),
        }
    }

    /// Agent that scores outputs for `train` and `test`.
    ///
    /// Without an explicit model it reuses the manager's LLM, or the first agent's.
    pub(crate) fn evaluator_agent(&self, llm: Option<AgentModelConfig>) -> Result<Agent, CrewError> {
        let role = AgentRole::new(
            "Task Execution Evaluator",
            "Your goal is to evaluate the performance of the agents in the crew based on the tasks they have performed \
            using score from 1 to 10 evaluating on completion, quality, and overall performance.",
            "Evaluator agent for crew evaluation with precise capabilities to evaluate the performance of the agents \
            in the crew based on the tasks they have performed",
        );
        let builder = Agent::builder("task_evaluator", role).verbose(self.verbose);

        let builder = match llm {
            Some(llm) => builder.llm(llm),
            None => {
                let base = self
                    .manager
                    .as_ref()
                    .or_else(|| self.agents.first())
                    .ok_or_else(|| CrewError::Validation("crew has no agents".to_string()))?;
                builder
                    .llm(base.llm_config.clone())
                    .provider(Arc::clone(&base.provider))
            }
        };

        Ok(builder.build()?)
    }
}

fn prepare_agent(agent: &Agent, inputs: &Inputs, trained: &TrainedAgents) -> Agent {
    let agent = agent.interpolated(inputs);
    match trained.get(&agent.name) {
        Some(entry) => {
            let suggestions = entry.suggestions.clone();
            agent.with_trained_suggestions(suggestions)
        }
        None => agent,
    }
}

/// Outputs of the tasks named in `task.context`, or every earlier output when it names none
fn build_context(task: &Task, outputs: &[TaskOutput]) -> Option<String> {
    let selected: Vec<&str> = outputs
        .iter()
        .filter(|output| task.context.is_empty() || task.context.contains(&output.name))
        .map(|output| output.raw.as_str())
        .collect();

    if selected.is_empty() {
        None
    } else {
        Some(selected.join(CONTEXT_SEPARATOR))
    }
}

impl CrewBuilder {
    pub fn agent(mut self, agent: Agent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents.extend(agents);
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(mut self, tasks: Vec<Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    /// Model for the manager agent a hierarchical crew creates
    pub fn manager_llm(mut self, llm: AgentModelConfig) -> Self {
        self.manager_llm = Some(llm);
        self
    }

    pub fn manager_agent(mut self, agent: Agent) -> Self {
        self.manager_agent = Some(agent);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Let every agent delegate, not only those declared with delegation
    pub fn allow_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn async_delegation(mut self, async_delegation: bool) -> Self {
        self.async_delegation = async_delegation;
        self
    }

    /// Have every agent, the manager included, plan before working on a task
    pub fn planning(mut self, planning: bool) -> Self {
        self.planning = planning;
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    /// Directory under the output root created before the crew runs
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = Some(dir.into());
        self
    }

    /// SQLite file of the kickoff log; without one the crew cannot replay
    pub fn storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    pub fn trained_agents_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.trained_agents_file = Some(path.into());
        self
    }

    pub fn model_defaults(mut self, defaults: ModelDefaults) -> Self {
        self.model_defaults = defaults;
        self
    }

    pub fn build(self) -> Result<Crew, CrewError> {
        if self.agents.is_empty() {
            return Err(CrewError::Validation(format!("crew '{}' has no agents", self.name)));
        }
        if self.tasks.is_empty() {
            return Err(CrewError::Validation(format!("crew '{}' has no tasks", self.name)));
        }

        let mut agent_names = HashSet::new();
        for agent in &self.agents {
            if !agent_names.insert(agent.name.as_str()) {
                return Err(CrewError::Validation(format!("duplicate agent '{}'", agent.name)));
            }
        }

        let mut task_names: HashSet<&str> = HashSet::new();
        for task in &self.tasks {
            for reference in &task.context {
                if !task_names.contains(reference.as_str()) {
                    return Err(CrewError::Validation(format!(
                        "task '{}' uses '{}' as context, which is not an earlier task",
                        task.name, reference
                    )));
                }
            }
            if !task_names.insert(task.name.as_str()) {
                return Err(CrewError::Validation(format!("duplicate task '{}'", task.name)));
            }

            match (&task.agent, self.process) {
                (Some(agent), _) if !agent_names.contains(agent.as_str()) => {
                    return Err(CrewError::AgentNotFound(agent.clone()));
                }
                (None, Process::Sequential) => {
                    return Err(CrewError::Validation(format!(
                        "task '{}' has no agent in a sequential crew",
                        task.name
                    )));
                }
                _ => {}
            }
        }

        let manager = match self.process {
            Process::Hierarchical => Some(self.build_manager()?),
            Process::Sequential => None,
        };

        let allow_delegation = self.allow_delegation;
        let async_delegation = self.async_delegation;
        let planning = self.planning;
        let agents = self
            .agents
            .into_iter()
            .map(|mut agent| {
                agent.allow_delegation |= allow_delegation;
                agent.async_delegation |= async_delegation;
                agent.planning |= planning;
                agent
            })
            .collect();

        Ok(Crew {
            name: self.name,
            agents,
            tasks: self.tasks,
            process: self.process,
            manager,
            verbose: self.verbose,
            output_root: self.output_root,
            results_dir: self.results_dir,
            storage_path: self.storage_path,
            trained_agents_file: self.trained_agents_file,
            model_defaults: self.model_defaults,
        })
    }

    fn build_manager(&self) -> Result<Agent, CrewError> {
        if let Some(agent) = &self.manager_agent {
            let mut manager = agent.clone();
            manager.allow_delegation = true;
            manager.async_delegation |= self.async_delegation;
            manager.planning |= self.planning;
            return Ok(manager);
        }

        let llm = self.manager_llm.clone().ok_or_else(|| {
            CrewError::Validation(format!(
                "hierarchical crew '{}' needs a manager LLM or a manager agent",
                self.name
            ))
        })?;

        let role = AgentRole::new(
            "Crew Manager",
            "Manage the team to complete the task in the best way possible.",
            "You are a seasoned manager with a knack for getting the best out of your team.\n\
            You are also known for your ability to delegate work to the right people, and to ask the right questions to get the best out of your team.\n\
            Even though you don't perform tasks by yourself, you have a lot of experience in the field, \
            which allows you to properly evaluate the work of your team members.",
        );

        Ok(Agent::builder(MANAGER_NAME, role)
            .llm(llm)
            .allow_delegation(true)
            .async_delegation(self.async_delegation)
            .planning(self.planning)
            .verbose(self.verbose)
            .build()?)
    }
}
