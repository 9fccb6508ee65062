use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use merco_crews::commands;
use merco_crews::config::{load_env, Settings};
use merco_crews::crew::{blocking_io, StdinFeedback};
use merco_crews::crews::{self, CrewDefinition};

#[derive(Parser)]
#[command(name = "merco-crews")]
#[command(about = "Run, train, replay and test the bundled agent crews")]
#[command(version)]
struct Cli {
    /// Environment file whose values override the process environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Settings file (defaults to merco-crews.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the available crews
    List,
    /// Run a crew once
    Run {
        crew: String,
        /// Replace the default topic
        #[arg(long)]
        topic: Option<String>,
    },
    /// Train a crew with human feedback
    Train {
        crew: String,
        n_iterations: u32,
        filename: PathBuf,
    },
    /// Re-run a crew from a task of its latest kickoff
    Replay { crew: String, task_id: String },
    /// Score a crew's outputs with an evaluation model
    Test {
        crew: String,
        n_iterations: u32,
        eval_llm: String,
    },
    /// Show the task outputs of a crew's latest kickoff
    LogTasksOutputs { crew: String },
}

fn find_crew(name: &str) -> Result<Box<dyn CrewDefinition>> {
    crews::find(name).ok_or_else(|| {
        let available: Vec<&str> = crews::registry().iter().map(|crew| crew.name()).collect();
        anyhow!("Unknown crew '{}'. Available crews: {}", name, available.join(", "))
    })
}

fn main() {
    let cli = Cli::parse();

    // The environment is only written while the process is still single-threaded
    let started = load_env(cli.env_file.as_deref())
        .map_err(anyhow::Error::from)
        .and_then(|_| Ok(tokio::runtime::Runtime::new()?))
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(e) = started {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Command::List => {
            for crew in crews::registry() {
                println!("{:<18} {}", crew.name(), crew.description());
            }
        }
        Command::Run { crew, topic } => {
            let crew = find_crew(&crew)?;
            let output = commands::run(crew.as_ref(), &settings, topic).await?;
            println!("{}", output.raw);
        }
        Command::Train {
            crew,
            n_iterations,
            filename,
        } => {
            let crew = find_crew(&crew)?;
            let inputs = blocking_io(|| crew.train_inputs(&mut std::io::stdin().lock()))?;
            let trained = commands::train(
                crew.as_ref(),
                &settings,
                n_iterations,
                &filename,
                &inputs,
                &StdinFeedback,
            )
            .await?;
            for (agent, result) in &trained {
                println!("{}: quality {:.1}, {} suggestions", agent, result.quality, result.suggestions.len());
            }
        }
        Command::Replay { crew, task_id } => {
            let crew = find_crew(&crew)?;
            let output = commands::replay(crew.as_ref(), &settings, &task_id).await?;
            println!("{}", output.raw);
        }
        Command::Test {
            crew,
            n_iterations,
            eval_llm,
        } => {
            let crew = find_crew(&crew)?;
            let report = commands::test(crew.as_ref(), &settings, n_iterations, &eval_llm).await?;
            println!("{}", report.render_table());
        }
        Command::LogTasksOutputs { crew } => {
            let crew = find_crew(&crew)?;
            let records = commands::log_tasks_outputs(crew.as_ref(), &settings).await?;
            if records.is_empty() {
                println!("No task outputs recorded for crew '{}'.", crew.name());
            }
            for record in records {
                println!(
                    "{:>2}. {} ({}){} - {}",
                    record.task_index + 1,
                    record.task_name,
                    record.task_id,
                    if record.was_replayed { " [replayed]" } else { "" },
                    record.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}
