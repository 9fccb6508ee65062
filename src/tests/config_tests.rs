use crate::agent::{ModelDefaults, Provider};
use crate::config::*;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const AGENTS: &str = r#"
writer:
  role: Writer
  goal: Write about {topic}
  backstory: Seasoned
"#;

const TASKS: &str = r#"
write_task:
  description: Write about {topic}
  expected_output: An article
  agent: writer
"#;

#[test]
fn test_parse_agents_config() {
    let agents = parse_agents_config(
        r#"
manager_llm:
  role: >
    Project Manager
  goal: Coordinate
  backstory: Experienced
  handoff: Hands work to the experts
  verbose: true
"#,
    )
    .unwrap();

    let manager = &agents["manager_llm"];
    assert_eq!(manager.role.trim(), "Project Manager");
    assert_eq!(manager.handoff.as_deref(), Some("Hands work to the experts"));
    assert_eq!(manager.verbose, Some(true));
    assert_eq!(manager.llm, None);
    assert_eq!(manager.max_iter, None);
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let result = parse_agents_config("writer: [unclosed");
    assert!(matches!(result, Err(ConfigError::Yaml(_))));

    let result = parse_tasks_config("task:\n  description: only a description\n");
    assert!(matches!(result, Err(ConfigError::Yaml(_))));
}

#[test]
fn test_crew_files_fall_back_to_embedded() {
    let temp_dir = TempDir::new().unwrap();
    let files = CrewFiles::load(temp_dir.path(), "blog", AGENTS, TASKS).unwrap();

    assert_eq!(files.agent("writer").unwrap().role, "Writer");
    assert_eq!(files.task("write_task").unwrap().agent.as_deref(), Some("writer"));
}

#[test]
fn test_crew_files_prefer_files_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let crew_dir = temp_dir.path().join("blog");
    std::fs::create_dir_all(&crew_dir).unwrap();
    std::fs::write(
        crew_dir.join("agents.yaml"),
        "writer:\n  role: Editor\n  goal: Edit\n  backstory: Careful\n",
    )
    .unwrap();

    let files = CrewFiles::load(temp_dir.path(), "blog", AGENTS, TASKS).unwrap();
    assert_eq!(files.agent("writer").unwrap().role, "Editor");
    // tasks.yaml is absent on disk, so the embedded one is used
    assert!(files.task("write_task").is_ok());
}

#[test]
fn test_missing_entry() {
    let files = CrewFiles::load(Path::new("does-not-exist"), "blog", AGENTS, TASKS).unwrap();
    let error = files.agent("analyst").unwrap_err();
    assert!(matches!(error, ConfigError::MissingEntry { kind: "agent", .. }));
    assert_eq!(error.to_string(), "No agent named 'analyst' in configuration");
}

#[test]
fn test_load_missing_file_reports_path() {
    let error = load_agents_config("nowhere/agents.yaml").unwrap_err();
    match error {
        ConfigError::Read { path, .. } => assert_eq!(path, PathBuf::from("nowhere/agents.yaml")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.config_dir, PathBuf::from("crews"));
    assert_eq!(settings.output_root, PathBuf::from("."));
    assert_eq!(settings.trained_agents_file, PathBuf::from("trained_agents_data.json"));
    assert_eq!(settings.ollama_base_url, "http://localhost:11434");
    assert_eq!(settings.log_level, "info");
    assert_eq!(
        settings.kickoff_db_path("coding"),
        PathBuf::from(".merco/coding/latest_kickoff_task_outputs.db")
    );
}

#[test]
fn test_settings_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &path,
        "output_root = \"out\"\nollama_base_url = \"http://gpu-box:11434\"\n",
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    assert_eq!(settings.output_root, PathBuf::from("out"));
    assert_eq!(settings.ollama_base_url, "http://gpu-box:11434");
    assert_eq!(settings.storage_dir, PathBuf::from(".merco"));
    assert_eq!(settings.model_defaults().ollama_base_url, "http://gpu-box:11434");
}

#[test]
fn test_settings_file_must_exist_when_given() {
    let result = Settings::load(Some(Path::new("missing-settings.toml")));
    assert!(matches!(result, Err(ConfigError::Settings(_))));
}

#[test]
fn test_env_file_overrides_process_environment() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".env");
    std::fs::write(&path, "MERCO_CREWS_TEST_OVERRIDE=from-file\n").unwrap();
    env::set_var("MERCO_CREWS_TEST_OVERRIDE", "from-process");

    load_env(Some(&path)).unwrap();
    assert_eq!(env::var("MERCO_CREWS_TEST_OVERRIDE").unwrap(), "from-file");

    env::remove_var("MERCO_CREWS_TEST_OVERRIDE");
}

#[test]
fn test_missing_env_file_is_an_error() {
    let result = load_env(Some(Path::new("no-such-dir/.env")));
    assert!(matches!(result, Err(ConfigError::Env(_))));
}

#[test]
fn test_model_string_resolution() {
    let defaults = ModelDefaults {
        ollama_base_url: "http://localhost:11434/".to_string(),
        ..ModelDefaults::default()
    };

    let (config, model) = defaults.resolve("ollama/llama3.2:latest");
    assert_eq!(config.provider, Provider::Ollama);
    assert_eq!(model, "llama3.2:latest");
    assert_eq!(config.resolved_base_url(), "http://localhost:11434/v1");

    let (config, model) = defaults.resolve("openai/gpt-4o");
    assert_eq!(config.provider, Provider::OpenAI);
    assert_eq!(model, "gpt-4o");
    assert_eq!(config.resolved_base_url(), "https://api.openai.com/v1");

    let (config, model) = defaults.resolve("openrouter/anthropic/claude-3.5-sonnet");
    assert_eq!(config.provider, Provider::OpenRouter);
    assert_eq!(model, "anthropic/claude-3.5-sonnet");

    let (config, model) = defaults.resolve("gpt-4o-mini");
    assert_eq!(config.provider, Provider::OpenAI);
    assert_eq!(model, "gpt-4o-mini");

    let (config, model) = defaults.resolve("mystery/model");
    assert_eq!(config.provider, Provider::OpenAI);
    assert_eq!(model, "mystery/model");
}
