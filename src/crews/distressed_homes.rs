use std::sync::Arc;

use tracing::info;

use super::{crew_builder, declare_agent, declare_task, default_inputs, CrewDefinition};
use crate::agent::AgentModelConfig;
use crate::config::{CrewFiles, Settings};
use crate::crew::{Crew, CrewError, Process};
use crate::task::Inputs;
use crate::tools::{ScrapeWebsiteTool, SerperDevTool, Tool};

pub const NAME: &str = "distressed-homes";

/// Environment variable naming the model; `openai/gpt-4o` when unset
pub const MODEL_ENV: &str = "GPT41";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Directory under the output root holding every report
pub const RESULTS_DIR: &str = "results";

const AGENTS_YAML: &str = include_str!("../../crews/distressed-homes/agents.yaml");
const TASKS_YAML: &str = include_str!("../../crews/distressed-homes/tasks.yaml");

const RUN_TOPIC: &str = "Scrape and aggregate real estate data on distressed properties, utilizing multiple sources such as \
MLS listings, public records, and auction sites; identify and extract distress indicators including pre-foreclosure status, \
auction postings, tax lien status, price reductions, extended time-on-market, code violations, absentee ownership, and other \
relevant signs; weight and score each property based on customizable indicator values reflecting investment potential; \
process, clean, normalize, and deduplicate data, filtering properties with the strongest distress signals; rank the top 20 \
properties by combined distress and investment score, providing for each a summary of key indicators, market context, and \
actionable next steps for investment teams (e.g., outreach, due diligence, estimated ROI); output the dashboard, with \
adaptability for custom markets, indicator weights, and report standards, flagging ambiguous or non-compliant cases for review.";

const AGENTS: [&str; 6] = [
    "manager_llm",
    "scraper_agent",
    "analyst_agent",
    "writer_agent",
    "acquisitions_prep_agent",
    "investor_strategy_agent",
];

const TASKS: [(&str, &str); 6] = [
    ("manager_task", "results/manager_output.md"),
    ("scrape_task", "results/scraped_properties.md"),
    ("analyst_task", "results/analyzed_properties.md"),
    ("report_task", "results/distressed_report.md"),
    ("acquisitions_prep_task", "results/prepared_properties.md"),
    ("investor_strategy_task", "results/investor_strategy.md"),
];

/// Scrapes, scores and reports distressed properties for investors
pub struct DistressedHomesCrew;

impl DistressedHomesCrew {
    /// Model string from `GPT41`, falling back to `openai/gpt-4o`
    pub fn model() -> String {
        std::env::var(MODEL_ENV)
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }
}

impl CrewDefinition for DistressedHomesCrew {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Finds distressed properties, scores them and prepares acquisition and investor reports"
    }

    fn build(&self, settings: &Settings) -> Result<Crew, CrewError> {
        info!(
            "Loading agents and tasks of '{}' from {}",
            NAME,
            settings.config_dir.join(NAME).display()
        );
        let files = CrewFiles::load(&settings.config_dir, NAME, AGENTS_YAML, TASKS_YAML)?;
        let defaults = settings.model_defaults();
        let llm = AgentModelConfig::from_model(&Self::model(), &defaults).with_temperature(0.7);

        let scrape_tool: Arc<dyn Tool> = Arc::new(ScrapeWebsiteTool::new());
        let search_tool: Arc<dyn Tool> = Arc::new(SerperDevTool::from_env());

        let mut agents = Vec::with_capacity(AGENTS.len());
        for name in AGENTS {
            let mut builder = declare_agent(&files, name, &defaults)?
                .llm(llm.clone())
                .verbose(true);
            if name == "scraper_agent" {
                builder = builder.tools(vec![Arc::clone(&scrape_tool), Arc::clone(&search_tool)]);
            }
            agents.push(builder.build()?);
        }

        let tasks = TASKS
            .iter()
            .map(|(name, output_file)| declare_task(&files, name, output_file))
            .collect::<Result<Vec<_>, _>>()?;

        crew_builder(NAME, settings)
            .agents(agents)
            .tasks(tasks)
            .process(Process::Hierarchical)
            .manager_llm(llm)
            .verbose(true)
            .allow_delegation(true)
            .results_dir(RESULTS_DIR)
            .build()
    }

    fn run_inputs(&self) -> Inputs {
        default_inputs(RUN_TOPIC)
    }
}
