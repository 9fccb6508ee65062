use super::*;
use crate::crew::*;
use crate::llm::{CompletionResponse, LlmError};
use crate::task::{Inputs, Task, TaskOutput};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn topic_inputs(topic: &str) -> Inputs {
    let mut inputs = Inputs::new();
    inputs.insert("topic".to_string(), topic.to_string());
    inputs
}

/// Two-task sequential crew: researcher then writer
fn sequential_crew(
    root: &Path,
    researcher: Arc<MockProvider>,
    writer: Arc<MockProvider>,
) -> Crew {
    Crew::builder("blog")
        .agent(mock_agent("researcher", "Researcher", researcher).build().unwrap())
        .agent(mock_agent("writer", "Writer", writer).build().unwrap())
        .task(
            Task::new("research_task", "Research {topic}", "Key facts about {topic}")
                .with_agent("researcher")
                .with_output_file("research.md"),
        )
        .task(
            Task::new("write_task", "Write an article about {topic}", "An article")
                .with_agent("writer")
                .with_context(vec!["research_task".to_string()])
                .with_output_file("out/article.md"),
        )
        .output_root(root)
        .storage_path(root.join("state/kickoff.db"))
        .build()
        .unwrap()
}

#[test]
fn test_build_requires_agents_and_tasks() {
    let result = Crew::builder("empty").build();
    assert!(matches!(result, Err(CrewError::Validation(_))));

    let result = Crew::builder("no-tasks")
        .agent(mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap())
        .build();
    assert!(matches!(result, Err(CrewError::Validation(_))));
}

#[test]
fn test_build_validates_task_agents() {
    let writer = || mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap();

    let result = Crew::builder("blog")
        .agent(writer())
        .task(Task::new("t", "d", "e"))
        .build();
    assert!(matches!(result, Err(CrewError::Validation(_))));

    let result = Crew::builder("blog")
        .agent(writer())
        .task(Task::new("t", "d", "e").with_agent("editor"))
        .build();
    assert!(matches!(result, Err(CrewError::AgentNotFound(name)) if name == "editor"));
}

#[test]
fn test_build_rejects_duplicates_and_forward_context() {
    let writer = || mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap();

    let result = Crew::builder("blog")
        .agent(writer())
        .agent(writer())
        .task(Task::new("t", "d", "e").with_agent("writer"))
        .build();
    assert!(matches!(result, Err(CrewError::Validation(_))));

    let result = Crew::builder("blog")
        .agent(writer())
        .task(
            Task::new("first", "d", "e")
                .with_agent("writer")
                .with_context(vec!["second".to_string()]),
        )
        .task(Task::new("second", "d", "e").with_agent("writer"))
        .build();
    assert!(matches!(result, Err(CrewError::Validation(message)) if message.contains("not an earlier task")));
}

#[test]
fn test_hierarchical_crew_needs_a_manager() {
    let result = Crew::builder("blog")
        .agent(mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap())
        .task(Task::new("t", "d", "e"))
        .process(Process::Hierarchical)
        .build();
    assert!(matches!(result, Err(CrewError::Validation(_))));

    let crew = Crew::builder("blog")
        .agent(mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap())
        .task(Task::new("t", "d", "e"))
        .process(Process::Hierarchical)
        .manager_llm(mock_llm())
        .build()
        .unwrap();
    let manager = crew.manager().unwrap();
    assert_eq!(manager.name, MANAGER_NAME);
    assert_eq!(manager.role.role, "Crew Manager");
    assert!(manager.allow_delegation);
}

#[test]
fn test_crew_flags_reach_agents_and_manager() {
    let crew = Crew::builder("blog")
        .agent(mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap())
        .task(Task::new("t", "d", "e"))
        .process(Process::Hierarchical)
        .manager_llm(mock_llm())
        .planning(true)
        .async_delegation(true)
        .build()
        .unwrap();

    let writer = &crew.agents()[0];
    assert!(writer.planning && writer.async_delegation);
    assert!(!writer.allow_delegation);
    let manager = crew.manager().unwrap();
    assert!(manager.planning && manager.async_delegation);
}

#[tokio::test]
async fn test_sequential_kickoff_writes_outputs_and_passes_context() {
    let temp_dir = TempDir::new().unwrap();
    let researcher = MockProvider::replying("Fact: prices fell 12%");
    let writer = MockProvider::replying("# Article\nPrices fell.");
    let crew = sequential_crew(temp_dir.path(), researcher.clone(), writer.clone());

    let output = crew.kickoff(&topic_inputs("housing")).await.unwrap();

    assert_eq!(output.raw, "# Article\nPrices fell.");
    assert_eq!(output.tasks_output.len(), 2);
    assert_eq!(output.tasks_output[0].agent, "researcher");
    assert_eq!(output.token_usage.successful_requests, 2);
    assert_eq!(output.to_string(), output.raw);

    assert!(user_text(&researcher.requests()[0]).contains("Research housing"));
    let writer_prompt = user_text(&writer.requests()[0]);
    assert!(writer_prompt.contains("Write an article about housing"));
    assert!(writer_prompt.contains("Fact: prices fell 12%"));

    let research = std::fs::read_to_string(temp_dir.path().join("research.md")).unwrap();
    assert_eq!(research, "Fact: prices fell 12%\n");
    let article = std::fs::read_to_string(temp_dir.path().join("out/article.md")).unwrap();
    assert_eq!(article, "# Article\nPrices fell.\n");
}

#[tokio::test]
async fn test_output_directories_exist_before_first_task() {
    let temp_dir = TempDir::new().unwrap();
    let results = temp_dir.path().join("results");
    let nested = temp_dir.path().join("reports/final");

    let seen_results = results.clone();
    let seen_nested = nested.clone();
    let provider = MockProvider::new(move |_| {
        let ready = seen_results.is_dir() && seen_nested.is_dir();
        Ok(CompletionResponse::message(if ready { "dirs ready" } else { "dirs missing" }))
    });

    let crew = Crew::builder("dirs")
        .agent(mock_agent("worker", "Worker", provider).build().unwrap())
        .task(
            Task::new("first", "d", "e")
                .with_agent("worker")
                .with_output_file("results/first.md"),
        )
        .task(
            Task::new("second", "d", "e")
                .with_agent("worker")
                .with_output_file("reports/final/second.md"),
        )
        .output_root(temp_dir.path())
        .results_dir("results")
        .build()
        .unwrap();

    let output = crew.kickoff(&Inputs::new()).await.unwrap();
    assert_eq!(output.tasks_output[0].raw, "dirs ready");
}

#[tokio::test]
async fn test_task_without_context_sees_all_previous_outputs() {
    let writer = MockProvider::replying("final");
    let crew = Crew::builder("chain")
        .agent(mock_agent("a", "A", MockProvider::replying("alpha")).build().unwrap())
        .agent(mock_agent("b", "B", MockProvider::replying("beta")).build().unwrap())
        .agent(mock_agent("c", "C", writer.clone()).build().unwrap())
        .task(Task::new("one", "d", "e").with_agent("a"))
        .task(Task::new("two", "d", "e").with_agent("b"))
        .task(Task::new("three", "d", "e").with_agent("c"))
        .build()
        .unwrap();

    crew.kickoff(&Inputs::new()).await.unwrap();

    let prompt = user_text(&writer.requests()[0]);
    assert!(prompt.contains("alpha\n\n----------\n\nbeta"));
}

#[tokio::test]
async fn test_failed_task_names_the_task() {
    let crew = Crew::builder("broken")
        .agent(
            mock_agent(
                "writer",
                "Writer",
                MockProvider::new(|_| Err(LlmError::EmptyResponse)),
            )
            .build()
            .unwrap(),
        )
        .task(Task::new("write_task", "d", "e").with_agent("writer"))
        .build()
        .unwrap();

    let error = crew.kickoff(&Inputs::new()).await.unwrap_err();
    assert!(matches!(&error, CrewError::Task { task, .. } if task == "write_task"));
}

#[tokio::test]
async fn test_hierarchical_manager_delegates_to_coworker() {
    let temp_dir = TempDir::new().unwrap();
    let manager_provider = MockProvider::new(|request| {
        if has_tool_result(request) {
            let delegated = request
                .messages
                .iter()
                .find(|m| m.role == crate::llm::ChatMessageRole::Tool)
                .map(|m| m.text().to_string())
                .unwrap_or_default();
            Ok(CompletionResponse::message(format!("Manager summary: {}", delegated)))
        } else {
            Ok(CompletionResponse::tool_calls(vec![tool_call(
                "call_1",
                "delegate_work_to_coworker",
                json!({
                    "task": "Draft the report on distressed homes",
                    "context": "Focus on Austin",
                    "coworker": "Report Writer"
                }),
            )]))
        }
    });
    let writer_provider = MockProvider::replying("Draft: 3 properties");
    let analyst_provider = MockProvider::replying("unused");

    let manager = mock_agent("manager", "Project Manager", manager_provider.clone())
        .build()
        .unwrap();
    let crew = Crew::builder("homes")
        .agent(mock_agent("writer", "Report Writer", writer_provider.clone()).build().unwrap())
        .agent(mock_agent("analyst", "Analyst", analyst_provider.clone()).build().unwrap())
        .task(Task::new("report_task", "Write the report", "A report").with_output_file("report.md"))
        .process(Process::Hierarchical)
        .manager_agent(manager)
        .output_root(temp_dir.path())
        .build()
        .unwrap();

    let output = crew.kickoff(&Inputs::new()).await.unwrap();

    assert_eq!(output.raw, "Manager summary: Draft: 3 properties");
    assert_eq!(output.tasks_output[0].agent, "manager");

    let first = &manager_provider.requests()[0];
    assert!(offers_tool(first, "delegate_work_to_coworker"));
    assert!(offers_tool(first, "ask_question_to_coworker"));

    let delegated = user_text(&writer_provider.requests()[0]);
    assert!(delegated.contains("Draft the report on distressed homes"));
    assert!(delegated.contains("Focus on Austin"));
    assert_eq!(analyst_provider.call_count(), 0);

    let report = std::fs::read_to_string(temp_dir.path().join("report.md")).unwrap();
    assert_eq!(report, "Manager summary: Draft: 3 properties\n");
}

#[tokio::test]
async fn test_delegation_to_unknown_coworker_is_reported() {
    let provider = MockProvider::new(|request| {
        if has_tool_result(request) {
            Ok(CompletionResponse::message("done alone"))
        } else {
            Ok(CompletionResponse::tool_calls(vec![tool_call(
                "call_1",
                "ask_question_to_coworker",
                json!({"question": "?", "context": "", "coworker": "Astronaut"}),
            )]))
        }
    });
    let coworkers = Coworkers::new(vec![Arc::new(
        mock_agent("writer", "Writer", MockProvider::replying("x")).build().unwrap(),
    )]);
    let agent = mock_agent("lead", "Lead", provider).build().unwrap();

    let response = agent
        .execute_task(&Task::new("t", "d", "e"), None, coworkers.tools())
        .await
        .unwrap();

    assert_eq!(response.content, "done alone");
    let error = response.tool_calls[0].error.as_deref().unwrap();
    assert!(error.contains("coworker 'Astronaut' not found, choose one of: Writer"));
}

#[tokio::test]
async fn test_delegation_depth_is_limited() {
    // Every agent tries to delegate whenever it is offered the tool
    fn delegating(target: &'static str, answer: &'static str) -> Arc<MockProvider> {
        MockProvider::new(move |request| {
            if offers_tool(request, "delegate_work_to_coworker") && !has_tool_result(request) {
                Ok(CompletionResponse::tool_calls(vec![tool_call(
                    "call",
                    "delegate_work_to_coworker",
                    json!({"task": "help", "context": "", "coworker": target}),
                )]))
            } else {
                Ok(CompletionResponse::message(answer))
            }
        })
    }

    let a = delegating("b", "from a");
    let b = delegating("c", "from b");
    let c = delegating("a", "from c");

    let agents: Vec<Arc<crate::agent::Agent>> = vec![
        Arc::new(mock_agent("a", "A", a.clone()).allow_delegation(true).build().unwrap()),
        Arc::new(mock_agent("b", "B", b.clone()).allow_delegation(true).build().unwrap()),
        Arc::new(mock_agent("c", "C", c.clone()).allow_delegation(true).build().unwrap()),
    ];
    let coworkers = Coworkers::new(agents.clone());

    let response = agents[0]
        .execute_task(&Task::new("t", "d", "e"), None, coworkers.excluding(&agents[0]).tools())
        .await
        .unwrap();

    assert_eq!(response.content, "from a");
    // a delegates to b (depth 1), b delegates to c (depth 2), c may not delegate further
    assert!(offers_tool(&b.requests()[0], "delegate_work_to_coworker"));
    assert!(!offers_tool(&c.requests()[0], "delegate_work_to_coworker"));
    assert_eq!(c.call_count(), 1);
}

#[tokio::test]
async fn test_kickoff_log_and_replay() {
    let temp_dir = TempDir::new().unwrap();
    let researcher = MockProvider::replying("facts");
    let writer = MockProvider::replying("article");
    let crew = sequential_crew(temp_dir.path(), researcher.clone(), writer.clone());

    crew.kickoff(&topic_inputs("housing")).await.unwrap();

    let log = crew.task_outputs_log().await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].task_name, "research_task");
    assert_eq!(log[1].inputs["topic"], "housing");
    assert!(!log[1].was_replayed);

    let output = crew.replay(&log[1].task_id).await.unwrap();

    assert_eq!(researcher.call_count(), 1);
    assert_eq!(writer.call_count(), 2);
    assert_eq!(output.tasks_output.len(), 2);
    assert_eq!(output.tasks_output[0].raw, "facts");

    // Stored inputs and context are reused
    let replayed_prompt = user_text(&writer.requests()[1]);
    assert!(replayed_prompt.contains("Write an article about housing"));
    assert!(replayed_prompt.contains("facts"));

    let log = crew.task_outputs_log().await.unwrap();
    assert_eq!(log.len(), 2);
    assert!(!log[0].was_replayed);
    assert!(log[1].was_replayed);
}

#[tokio::test]
async fn test_replay_by_task_name() {
    let temp_dir = TempDir::new().unwrap();
    let researcher = MockProvider::replying("facts");
    let writer = MockProvider::replying("article");
    let crew = sequential_crew(temp_dir.path(), researcher.clone(), writer.clone());

    crew.kickoff(&topic_inputs("housing")).await.unwrap();
    crew.replay("research_task").await.unwrap();

    assert_eq!(researcher.call_count(), 2);
    assert_eq!(writer.call_count(), 2);
}

#[tokio::test]
async fn test_replay_unknown_task_fails() {
    let temp_dir = TempDir::new().unwrap();
    let crew = sequential_crew(
        temp_dir.path(),
        MockProvider::replying("facts"),
        MockProvider::replying("article"),
    );

    let error = crew.replay("no-such-task").await.unwrap_err();
    assert!(matches!(error, CrewError::TaskNotFound(id) if id == "no-such-task"));

    crew.kickoff(&topic_inputs("housing")).await.unwrap();
    let error = crew.replay("still-missing").await.unwrap_err();
    assert!(matches!(error, CrewError::TaskNotFound(_)));
}

#[tokio::test]
async fn test_replay_without_storage_fails() {
    let crew = Crew::builder("stateless")
        .agent(mock_agent("writer", "Writer", MockProvider::replying("ok")).build().unwrap())
        .task(Task::new("t", "d", "e").with_agent("writer"))
        .build()
        .unwrap();

    assert!(matches!(crew.replay("t").await, Err(CrewError::TaskNotFound(task)) if task == "t"));
    assert!(crew.task_outputs_log().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_kickoff_storage_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let storage = KickoffTaskOutputsStorage::new(&temp_dir.path().join("nested/log.db"))
        .await
        .unwrap();

    let task = Task::new("t", "d", "e");
    let output = TaskOutput {
        task_id: task.id.clone(),
        name: "t".to_string(),
        description: "d".to_string(),
        expected_output: "e".to_string(),
        agent: "writer".to_string(),
        raw: "text".to_string(),
        output_file: None,
    };
    for index in 0..3 {
        storage
            .add(&KickoffRecord::new(index, &task, &output, &topic_inputs("x"), false))
            .await
            .unwrap();
    }

    storage.delete_from(1).await.unwrap();
    let records = storage.load().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].output, output);

    storage.reset().await.unwrap();
    assert!(storage.load().await.unwrap().is_empty());
}

struct ScriptedFeedback;

impl FeedbackSource for ScriptedFeedback {
    fn feedback(&self, output: &TaskOutput) -> Result<String, CrewError> {
        Ok(format!("Shorter please ({})", output.name))
    }
}

#[tokio::test]
async fn test_train_stores_suggestions_used_by_later_runs() {
    let temp_dir = TempDir::new().unwrap();
    let trained_file = temp_dir.path().join("trained.json");
    let provider = MockProvider::new(|request| {
        if user_text(request).contains("Assess the quality of the training data") {
            Ok(CompletionResponse::message(
                json!({
                    "suggestions": ["Keep answers under 100 words"],
                    "quality": 7.5,
                    "final_summary": "Too long"
                })
                .to_string(),
            ))
        } else {
            Ok(CompletionResponse::message("A very long answer"))
        }
    });

    let crew = Crew::builder("trainee")
        .agent(mock_agent("writer", "Writer", provider.clone()).build().unwrap())
        .task(Task::new("write_task", "Write", "Text").with_agent("writer"))
        .trained_agents_file(&trained_file)
        .build()
        .unwrap();

    let trained = crew
        .train(2, &trained_file, &Inputs::new(), &ScriptedFeedback)
        .await
        .unwrap();

    let writer = &trained["writer"];
    assert_eq!(writer.suggestions, vec!["Keep answers under 100 words".to_string()]);
    assert_eq!(writer.quality, 7.5);

    // Two iterations of one task plus one evaluation
    assert_eq!(provider.call_count(), 3);
    let evaluation = user_text(&provider.requests()[2]);
    assert!(evaluation.contains("Iteration 1 - Task 'write_task'"));
    assert!(evaluation.contains("Iteration 2 - Task 'write_task'"));
    assert!(evaluation.contains("Shorter please (write_task)"));

    let saved = load_trained_agents(&trained_file).unwrap();
    assert_eq!(saved, trained);

    crew.kickoff(&Inputs::new()).await.unwrap();
    let system = system_text(provider.requests().last().unwrap());
    assert!(system.contains("- Keep answers under 100 words"));
}

#[tokio::test]
async fn test_train_with_zero_iterations_fails() {
    let temp_dir = TempDir::new().unwrap();
    let provider = MockProvider::replying("ok");
    let crew = Crew::builder("trainee")
        .agent(mock_agent("writer", "Writer", provider.clone()).build().unwrap())
        .task(Task::new("t", "d", "e").with_agent("writer"))
        .build()
        .unwrap();

    let result = crew
        .train(0, &temp_dir.path().join("t.json"), &Inputs::new(), &ScriptedFeedback)
        .await;
    assert!(matches!(result, Err(CrewError::Training(_))));
    assert_eq!(provider.call_count(), 0);
}

#[test]
fn test_missing_trained_file_is_empty() {
    let temp_dir = TempDir::new().unwrap();
    let trained = load_trained_agents(&temp_dir.path().join("absent.json")).unwrap();
    assert!(trained.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_blocking_feedback_read_leaves_the_runtime_free() {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    let answered = Arc::new(AtomicBool::new(false));
    // Holds the only worker until the other task has run or five seconds pass
    let waiting = tokio::spawn({
        let answered = answered.clone();
        async move {
            blocking_io(|| {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !answered.load(Ordering::SeqCst) && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_millis(10));
                }
                answered.load(Ordering::SeqCst)
            })
        }
    });
    tokio::spawn({
        let answered = answered.clone();
        async move { answered.store(true, Ordering::SeqCst) }
    });

    assert!(waiting.await.unwrap());
}

#[tokio::test]
async fn test_blocking_io_on_current_thread_runtime() {
    assert_eq!(blocking_io(|| "topic".len()), 5);
}

#[tokio::test]
async fn test_crew_test_scores_every_task_per_run() {
    let crew = Crew::builder("tested")
        .agent(mock_agent("a", "A", MockProvider::replying("alpha")).build().unwrap())
        .agent(mock_agent("b", "B", MockProvider::replying("beta")).build().unwrap())
        .task(Task::new("one", "d", "e").with_agent("a"))
        .task(Task::new("two", "d", "e").with_agent("b"))
        .build()
        .unwrap();

    let evaluator_provider = MockProvider::new(|request| {
        let prompt = user_text(request);
        let quality = if prompt.contains("Task Output: alpha") { 8 } else { 12 };
        Ok(CompletionResponse::message(format!("```json\n{{\"quality\": {}}}\n```", quality)))
    });
    let evaluator = mock_agent("evaluator", "Evaluator", evaluator_provider.clone())
        .build()
        .unwrap();

    let report = crew
        .test_with_evaluator(2, &evaluator, &Inputs::new())
        .await
        .unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(report.tasks.len(), 2);
    assert_eq!(report.tasks[0].scores, vec![8.0, 8.0]);
    // Out of range scores are clamped
    assert_eq!(report.tasks[1].scores, vec![10.0, 10.0]);
    assert_eq!(report.crew_score(1), 9.0);
    assert_eq!(report.overall_average(), 9.0);
    assert_eq!(report.execution_times_secs.len(), 2);
    assert_eq!(evaluator_provider.call_count(), 4);

    let table = report.render_table();
    assert!(table.contains("Run 1"));
    assert!(table.contains("Run 2"));
    assert!(table.contains("Avg. Total"));
    assert!(table.lines().any(|line| line.starts_with("Crew")));
}

#[test]
fn test_crew_score_of_missing_runs() {
    let report = TestReport {
        iterations: 1,
        tasks: vec![TaskScores {
            task_name: "one".to_string(),
            scores: vec![6.0],
        }],
        execution_times_secs: vec![1.0],
    };

    assert_eq!(report.crew_score(1), 6.0);
    assert_eq!(report.crew_score(0), 0.0);
    assert_eq!(report.crew_score(2), 0.0);
}

#[tokio::test]
async fn test_crew_test_with_zero_iterations_fails() {
    let crew = Crew::builder("tested")
        .agent(mock_agent("a", "A", MockProvider::replying("alpha")).build().unwrap())
        .task(Task::new("one", "d", "e").with_agent("a"))
        .build()
        .unwrap();

    let result = crew.test(0, "openai/gpt-4o-mini", &Inputs::new()).await;
    assert!(matches!(result, Err(CrewError::Evaluation(_))));
}
