use std::sync::{Arc, Mutex};

use crate::agent::agent::{Agent, AgentError, AgentModelConfig};
use crate::agent::output_handler::OutputHandler;
use crate::agent::provider::ModelDefaults;
use crate::agent::role::AgentRole;
use crate::agent::state::AgentState;
use crate::config::AgentConfig;
use crate::llm::{get_provider, LlmProvider};
use crate::tools::Tool;

pub const DEFAULT_MAX_ITER: usize = 15;

/// Builder for agents declared by a crew
pub struct AgentBuilder {
    name: String,
    role: AgentRole,
    llm: Option<AgentModelConfig>,
    /// Model named in the YAML record; wins over the code default
    llm_override: Option<AgentModelConfig>,
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Vec<Arc<dyn Tool>>,
    allow_delegation: bool,
    planning: bool,
    async_delegation: bool,
    verbose: bool,
    max_iter: usize,
    handoff: Option<String>,
}

impl Agent {
    /// Start building an agent with an explicit role
    pub fn builder(name: impl Into<String>, role: AgentRole) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            role,
            llm: None,
            llm_override: None,
            provider: None,
            tools: Vec::new(),
            allow_delegation: false,
            planning: false,
            async_delegation: false,
            verbose: false,
            max_iter: DEFAULT_MAX_ITER,
            handoff: None,
        }
    }

    /// Start building an agent from its YAML record
    pub fn from_config(name: impl Into<String>, config: &AgentConfig, defaults: &ModelDefaults) -> AgentBuilder {
        let mut builder = Self::builder(name, AgentRole::from(config));
        builder.llm_override = config
            .llm
            .as_deref()
            .map(|model| AgentModelConfig::from_model(model, defaults));
        builder.handoff = config.handoff.clone();
        if let Some(max_iter) = config.max_iter {
            builder.max_iter = max_iter;
        }
        if let Some(verbose) = config.verbose {
            builder.verbose = verbose;
        }
        builder
    }
}

impl AgentBuilder {
    pub fn llm(mut self, llm: AgentModelConfig) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Use an already constructed provider instead of creating one from the LLM config
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        if !self.tools.iter().any(|t| t.name() == tool.name()) {
            self.tools.push(tool);
        }
        self
    }

    pub fn tools(self, tools: Vec<Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, |builder, tool| builder.tool(tool))
    }

    pub fn allow_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn planning(mut self, planning: bool) -> Self {
        self.planning = planning;
        self
    }

    pub fn async_delegation(mut self, async_delegation: bool) -> Self {
        self.async_delegation = async_delegation;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn handoff(mut self, handoff: impl Into<String>) -> Self {
        self.handoff = Some(handoff.into());
        self
    }

    pub fn build(self) -> Result<Agent, AgentError> {
        let llm_config = self.llm_override.or(self.llm).ok_or_else(|| {
            AgentError::InvalidConfiguration(format!("agent '{}' has no LLM configured", self.name))
        })?;

        if self.max_iter == 0 {
            return Err(AgentError::InvalidConfiguration(format!(
                "agent '{}' needs max_iter of at least 1",
                self.name
            )));
        }

        let provider = match self.provider {
            Some(provider) => provider,
            None => get_provider(&llm_config.llm_config)?,
        };

        Ok(Agent {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            role: self.role,
            llm_config,
            provider,
            tools: self.tools,
            allow_delegation: self.allow_delegation,
            planning: self.planning,
            async_delegation: self.async_delegation,
            verbose: self.verbose,
            max_iter: self.max_iter,
            handoff: self.handoff,
            trained_suggestions: Vec::new(),
            output_handler: OutputHandler::new(),
            state: Mutex::new(AgentState::new()),
        })
    }
}
