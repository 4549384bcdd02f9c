// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine scenario tests driving full session workflows against mock
//! components: scripted sandbox output, a counting git provider stub, and
//! routed LLM responses.

use std::sync::Arc;
use std::time::Duration;

use telecoder_bus::EventBus;
use telecoder_core::types::{
    EventKind, Mode, Session, SessionResult, Status, SubTaskStatus,
};
use telecoder_dispatcher::{ChainEvaluator, Dispatcher};
use telecoder_engine::{Engine, EngineBuilder, EngineConfig};
use telecoder_pipeline::{DecomposeStage, PlanStage, ReviewStage, VerifyStage};
use telecoder_storage::SqliteStore;
use telecoder_test_utils::{MockGit, MockLlm, MockRuntime, RoutedLlm};

struct Fixture {
    engine: Arc<Engine>,
    runtime: Arc<MockRuntime>,
    git: Arc<MockGit>,
}

async fn fixture_with(config: EngineConfig, llm: Arc<RoutedLlm>, git: MockGit) -> Fixture {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let bus = Arc::new(EventBus::new());
    let runtime = Arc::new(MockRuntime::new());
    let git = Arc::new(git);

    let llm_dyn: Arc<dyn telecoder_core::traits::LlmClient> = llm;
    let engine = EngineBuilder::new(config, store, bus, runtime.clone(), git.clone())
        .with_stages(
            Some(Arc::new(PlanStage::new(llm_dyn.clone(), ""))),
            Some(Arc::new(ReviewStage::new(llm_dyn.clone(), ""))),
            Some(Arc::new(DecomposeStage::new(llm_dyn.clone(), ""))),
            Some(Arc::new(VerifyStage::new(llm_dyn.clone(), ""))),
        )
        .build();

    Fixture {
        engine,
        runtime,
        git,
    }
}

async fn fixture() -> Fixture {
    fixture_with(
        EngineConfig::default(),
        Arc::new(RoutedLlm::happy()),
        MockGit::new(),
    )
    .await
}

/// Polls the store until the session reaches a terminal state.
async fn wait_terminal(engine: &Arc<Engine>, session_id: &str) -> Session {
    for _ in 0..400 {
        let sess = engine
            .store()
            .get_session(session_id)
            .await
            .unwrap()
            .unwrap();
        if sess.status.is_terminal() {
            return sess;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} did not reach a terminal state");
}

/// Polls the store until the session reports the given status.
async fn wait_status(engine: &Arc<Engine>, session_id: &str, status: Status) -> Session {
    for _ in 0..400 {
        let sess = engine
            .store()
            .get_session(session_id)
            .await
            .unwrap()
            .unwrap();
        if sess.status == status {
            return sess;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never became {status}");
}

#[tokio::test]
async fn single_task_pr_happy_path() {
    let f = fixture_with(
        EngineConfig::default(),
        Arc::new(RoutedLlm::happy()),
        MockGit::with_pr("https://github.com/acme/api/pull/42", 42),
    )
    .await;
    f.runtime.push_log_script(vec![
        "Making changes...",
        "###TELECODER_DONE### telecoder/abc123",
    ]);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "add rate limiting to /users")
        .await
        .unwrap();
    assert_eq!(sess.status, Status::Pending);
    assert!(sess.branch.starts_with("telecoder/"));

    let done = wait_terminal(&f.engine, &sess.id).await;
    assert_eq!(done.status, Status::Complete, "error: {}", done.error);
    assert_eq!(done.pr_number, 42);
    assert_eq!(done.pr_url, "https://github.com/acme/api/pull/42");
    assert_eq!(
        done.result,
        SessionResult::Pr {
            url: "https://github.com/acme/api/pull/42".into(),
            number: 42
        }
    );
    // The DONE marker rewrote the working branch.
    assert_eq!(done.branch, "telecoder/abc123");

    let events = f.engine.store().get_events(&sess.id, 0).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.kind == EventKind::Done && e.data == done.pr_url));
    assert!(events.iter().any(|e| e.kind == EventKind::Output));
    // Timestamps stay ordered after the workflow.
    assert!(done.updated_at >= done.created_at);
}

#[tokio::test]
async fn single_task_text_answer_skips_pr() {
    let f = fixture().await;
    f.runtime.push_log_script(vec![
        "This project is written in Go.",
        r#"###TELECODER_RESULT### {"type":"text"}"#,
    ]);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "what language is this?")
        .await
        .unwrap();
    let done = wait_terminal(&f.engine, &sess.id).await;

    assert_eq!(done.status, Status::Complete, "error: {}", done.error);
    match &done.result {
        SessionResult::Text { content } => {
            assert!(content.contains("This project is written in Go."));
        }
        other => panic!("expected text result, got {other:?}"),
    }
    assert_eq!(f.git.create_pr_calls(), 0);
    assert!(done.pr_url.is_empty());
}

#[tokio::test]
async fn nonzero_exit_fails_the_session() {
    let f = fixture().await;
    f.runtime.push_log_script(vec!["###TELECODER_ERROR### clone failed"]);
    f.runtime.set_exit_code(1);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "do anything")
        .await
        .unwrap();
    let done = wait_terminal(&f.engine, &sess.id).await;

    assert_eq!(done.status, Status::Error);
    assert!(done.error.contains("exited with code 1"), "{}", done.error);
    assert_eq!(f.git.create_pr_calls(), 0);
}

#[tokio::test]
async fn invalid_repo_is_rejected_without_side_effects() {
    let f = fixture().await;
    let err = f
        .engine
        .create_and_run_session("not-a-repo", "prompt")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid repo format"));
    assert!(f.engine.store().list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn review_rejection_drives_exactly_max_revisions_rounds() {
    let llm = RoutedLlm {
        review: "REVISION NEEDED: tighten the loop".to_string(),
        ..RoutedLlm::happy()
    };
    let f = fixture_with(EngineConfig::default(), Arc::new(llm), MockGit::new()).await;

    // A non-empty diff keeps review in play every round.
    f.runtime
        .set_exec_result("diff HEAD~1", Ok("diff --git a/x b/x".to_string()));
    f.runtime.push_log_script(vec!["round zero output"]);
    f.runtime.push_log_script(vec!["round one output"]);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "never good enough")
        .await
        .unwrap();
    let done = wait_terminal(&f.engine, &sess.id).await;

    // max_revisions = 1: round 0 plus one revision round.
    assert_eq!(f.runtime.start_calls(), 2);
    assert_eq!(done.status, Status::Complete);
    assert_eq!(f.git.create_pr_calls(), 1);
}

#[tokio::test]
async fn multi_step_checkpoints_and_creates_pr() {
    let llm = RoutedLlm {
        decompose: r#"[{"title":"Add model","description":"Create the data model"},{"title":"Add tests","description":"Cover the model with tests"}]"#
            .to_string(),
        ..RoutedLlm::happy()
    };
    let f = fixture_with(EngineConfig::default(), Arc::new(llm), MockGit::new()).await;
    f.runtime.set_has_changes(true);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "build the feature")
        .await
        .unwrap();
    let done = wait_terminal(&f.engine, &sess.id).await;

    assert_eq!(done.status, Status::Complete, "error: {}", done.error);
    assert!(matches!(done.result, SessionResult::Pr { .. }));
    assert_eq!(f.git.create_pr_calls(), 1);

    // One persistent container for the whole session.
    assert_eq!(f.runtime.start_calls(), 1);
    let opts = f.runtime.started_options();
    assert!(opts[0].persistent);

    // Both steps checkpointed and listed in the PR body.
    let prs = f.git.created_prs();
    assert!(prs[0].body.contains("Add model"));
    assert!(prs[0].body.contains("Add tests"));
    assert!(prs[0].body.contains('✅'));

    let history = f.runtime.exec_history();
    assert!(history.iter().any(|c| c.contains("git commit") && c.contains("step 1")));
    assert!(history.iter().any(|c| c.contains("git commit") && c.contains("step 2")));
    assert!(history.iter().any(|c| c.contains(".telecoder-progress.json")));
    assert!(history.iter().any(|c| c.contains("git push -u origin")));
    assert!(history.iter().any(|c| c == "/setup.sh"));

    // Step and progress events were emitted for both steps.
    let events = f.engine.store().get_events(&sess.id, 0).await.unwrap();
    let steps = events.iter().filter(|e| e.kind == EventKind::Step).count();
    assert!(steps >= 2, "expected step events, got {steps}");
    let progress: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::Progress)
        .collect();
    assert!(progress.len() >= 4, "running+completed per step");
    let parsed: serde_json::Value = serde_json::from_str(&progress[0].data).unwrap();
    assert_eq!(parsed["step"], 1);
    assert_eq!(parsed["total"], 2);
    assert_eq!(parsed["status"], "running");
}

#[tokio::test]
async fn multi_step_without_changes_yields_text_result() {
    let llm = RoutedLlm {
        decompose: r#"[{"title":"Check A","description":"Inspect A"},{"title":"Check B","description":"Inspect B"}]"#
            .to_string(),
        ..RoutedLlm::happy()
    };
    let f = fixture_with(EngineConfig::default(), Arc::new(llm), MockGit::new()).await;
    f.runtime.set_has_changes(false);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "inspect things")
        .await
        .unwrap();
    let done = wait_terminal(&f.engine, &sess.id).await;

    assert_eq!(done.status, Status::Complete);
    assert_eq!(
        done.result,
        SessionResult::Text {
            content: "All steps completed without code changes.".into()
        }
    );
    assert_eq!(f.git.create_pr_calls(), 0);
}

#[tokio::test]
async fn chat_flow_with_pr() {
    let f = fixture().await;

    let sess = f.engine.create_chat_session("acme/api").await.unwrap();
    assert_eq!(sess.mode, Mode::Chat);
    wait_status(&f.engine, &sess.id, Status::Idle).await;

    f.runtime.push_exec_script(vec!["added /health endpoint"]);
    let message = f
        .engine
        .send_chat_message(&sess.id, "add /health")
        .await
        .unwrap();
    assert!(message.id > 0);
    assert_eq!(message.role, "user");

    wait_status(&f.engine, &sess.id, Status::Idle).await;

    let messages = f.engine.store().get_messages(&sess.id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[0].content, "add /health");
    assert_eq!(messages[1].role, "assistant");
    assert_eq!(messages[1].content, "added /health endpoint");

    let (pr_url, pr_number) = f.engine.create_pr_from_chat(&sess.id).await.unwrap();
    assert!(!pr_url.is_empty());
    assert!(pr_number > 0);

    let done = f.engine.store().get_session(&sess.id).await.unwrap().unwrap();
    assert_eq!(done.status, Status::Complete);
    assert!(matches!(done.result, SessionResult::Pr { .. }));

    let prs = f.git.created_prs();
    assert!(prs[0].body.contains("> **You:** add /health"));
}

#[tokio::test]
async fn chat_agent_with_no_output_stores_placeholder() {
    let f = fixture().await;
    let sess = f.engine.create_chat_session("acme/api").await.unwrap();
    wait_status(&f.engine, &sess.id, Status::Idle).await;

    // No exec script queued: the agent produces nothing.
    f.engine.send_chat_message(&sess.id, "quiet please").await.unwrap();
    wait_status(&f.engine, &sess.id, Status::Idle).await;

    let messages = f.engine.store().get_messages(&sess.id).await.unwrap();
    assert_eq!(messages[1].content, "(no output)");
}

#[tokio::test]
async fn chat_rejects_message_while_not_idle() {
    let f = fixture().await;
    let mut sess = Session::new("busy0001", "acme/api", "", Mode::Chat);
    sess.status = Status::Running;
    sess.container_id = "container-busy".to_string();
    f.engine.store().create_session(&sess).await.unwrap();

    let err = f
        .engine
        .send_chat_message("busy0001", "too early")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not idle"), "{err}");
}

#[tokio::test]
async fn chat_message_limit_is_enforced() {
    let config = EngineConfig {
        chat_max_messages: 2,
        ..EngineConfig::default()
    };
    let f = fixture_with(config, Arc::new(RoutedLlm::happy()), MockGit::new()).await;

    let sess = f.engine.create_chat_session("acme/api").await.unwrap();
    wait_status(&f.engine, &sess.id, Status::Idle).await;

    for i in 0..2 {
        f.engine
            .send_chat_message(&sess.id, &format!("message {i}"))
            .await
            .unwrap();
        wait_status(&f.engine, &sess.id, Status::Idle).await;
    }

    let err = f
        .engine
        .send_chat_message(&sess.id, "one too many")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("message limit reached"), "{err}");
}

#[tokio::test]
async fn chat_rejects_task_session_messages() {
    let f = fixture().await;
    f.runtime.push_log_script(vec!["###TELECODER_DONE### telecoder/x"]);
    let sess = f
        .engine
        .create_and_run_session("acme/api", "task prompt")
        .await
        .unwrap();
    let err = f
        .engine
        .send_chat_message(&sess.id, "hello")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("not a chat session"), "{err}");
}

#[tokio::test]
async fn idle_chat_session_is_reaped() {
    let f = fixture().await;

    // A chat session idle for 45 minutes, created directly in the store so
    // the stale timestamp survives.
    let mut sess = Session::new("idle0001", "acme/api", "", Mode::Chat);
    sess.status = Status::Idle;
    sess.container_id = "container-idle".to_string();
    sess.updated_at = (chrono::Utc::now() - chrono::Duration::minutes(45)).to_rfc3339();
    f.engine.store().create_session(&sess).await.unwrap();

    f.engine.reap_tick().await;

    assert_eq!(f.runtime.stop_calls(), 1);
    assert_eq!(f.runtime.stopped_containers(), vec!["container-idle".to_string()]);

    let reaped = f.engine.store().get_session("idle0001").await.unwrap().unwrap();
    assert_eq!(reaped.status, Status::Error);
    assert_eq!(reaped.error, "session timed out due to inactivity");

    let events = f.engine.store().get_events("idle0001", 0).await.unwrap();
    assert!(events
        .iter()
        .any(|e| e.kind == EventKind::Status && e.data.contains("idle timeout")));
}

#[tokio::test]
async fn recently_active_chat_session_survives_reaping() {
    let f = fixture().await;
    let mut sess = Session::new("idle0002", "acme/api", "", Mode::Chat);
    sess.status = Status::Idle;
    sess.container_id = "container-fresh".to_string();
    f.engine.store().create_session(&sess).await.unwrap();

    f.engine.reap_tick().await;

    assert_eq!(f.runtime.stop_calls(), 0);
    let kept = f.engine.store().get_session("idle0002").await.unwrap().unwrap();
    assert_eq!(kept.status, Status::Idle);
}

#[tokio::test]
async fn pr_comment_session_reuses_branch_and_replies() {
    let f = fixture_with(
        EngineConfig::default(),
        Arc::new(RoutedLlm::happy()),
        MockGit::with_pr("https://github.com/acme/api/pull/7", 7),
    )
    .await;

    let mut original = Session::new("orig0001", "acme/api", "add auth", Mode::Task);
    original.status = Status::Complete;
    original.branch = "telecoder/orig0001".to_string();
    original.pr_url = "https://github.com/acme/api/pull/7".to_string();
    original.pr_number = 7;
    f.engine.store().create_session(&original).await.unwrap();

    let event = telecoder_core::traits::WebhookEvent {
        action: "created".to_string(),
        repo: "acme/api".to_string(),
        pr_number: 7,
        comment_body: "please rename the helper".to_string(),
        comment_user: "reviewer".to_string(),
        comment_id: 1,
    };

    f.runtime.push_log_script(vec!["renamed the helper"]);
    let child = f
        .engine
        .create_pr_comment_session(&original, &event)
        .await
        .unwrap();
    assert_eq!(child.branch, "telecoder/orig0001");
    assert_eq!(child.pr_number, 7);
    assert!(child.prompt.contains("please rename the helper"));

    let done = wait_terminal(&f.engine, &child.id).await;
    assert_eq!(done.status, Status::Complete, "error: {}", done.error);

    // Ack before the run and a completion comment after.
    let replies = f.git.replies();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].2.contains("addressing this comment"));
    assert!(replies[1].2.contains("pushed changes"));
    // No fresh PR for a comment session.
    assert_eq!(f.git.create_pr_calls(), 0);
}

#[tokio::test]
async fn stop_session_kills_container_and_marks_error() {
    let f = fixture().await;
    let mut sess = Session::new("stop0001", "acme/api", "", Mode::Chat);
    sess.status = Status::Idle;
    sess.container_id = "container-stop".to_string();
    f.engine.store().create_session(&sess).await.unwrap();

    let stopped = f.engine.stop_session("stop0001").await.unwrap();
    assert_eq!(stopped.status, Status::Error);
    assert_eq!(stopped.error, "stopped by user");
    assert_eq!(f.runtime.stop_calls(), 1);
}

#[tokio::test]
async fn chain_spawns_children_up_to_depth_limit() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let bus = Arc::new(EventBus::new());
    let runtime = Arc::new(MockRuntime::new());
    let git = Arc::new(MockGit::new());

    // The chain dispatcher always wants a follow-up; depth is the only brake.
    let chain_llm: Arc<dyn telecoder_core::traits::LlmClient> = Arc::new(MockLlm::with_responses(
        std::iter::repeat(r#"{"action":"spawn","prompt":"keep going"}"#.to_string())
            .take(10)
            .collect(),
    ));
    let chain = ChainEvaluator::new(Dispatcher::new(chain_llm), 3);

    let engine = EngineBuilder::new(
        EngineConfig::default(),
        store,
        bus,
        runtime.clone(),
        git.clone(),
    )
    .with_chain(Arc::new(chain))
    .build();

    let root = engine
        .create_and_run_session("acme/api", "start the chain")
        .await
        .unwrap();

    // Root (depth 0) plus children at depths 1..3; the evaluation at depth
    // 3 is refused, so exactly 4 sessions exist.
    let mut sessions = Vec::new();
    for _ in 0..600 {
        sessions = engine.store().list_sessions().await.unwrap();
        let all_done = sessions.iter().all(|s| s.status.is_terminal());
        if sessions.len() == 4 && all_done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(sessions.len(), 4, "expected the chain to stop at depth 3");

    let mut depths: Vec<i64> = sessions.iter().map(|s| s.chain_depth).collect();
    depths.sort_unstable();
    assert_eq!(depths, vec![0, 1, 2, 3]);

    for sess in &sessions {
        if sess.id != root.id {
            assert_eq!(sess.chain_id, root.id);
        }
    }

    // Give any stray evaluation a moment, then confirm no 5th session.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.store().list_sessions().await.unwrap().len(), 4);
}

#[tokio::test]
async fn progress_json_round_trips_through_events() {
    let llm = RoutedLlm {
        decompose: r#"[{"title":"A","description":"a"},{"title":"B","description":"b"}]"#
            .to_string(),
        ..RoutedLlm::happy()
    };
    let f = fixture_with(EngineConfig::default(), Arc::new(llm), MockGit::new()).await;
    f.runtime.set_has_changes(true);

    let sess = f
        .engine
        .create_and_run_session("acme/api", "two steps")
        .await
        .unwrap();
    wait_terminal(&f.engine, &sess.id).await;

    // The progress file written into the container parses back losslessly.
    let history = f.runtime.exec_history();
    let write = history
        .iter()
        .find(|c| c.contains(".telecoder-progress.json") && c.contains("PROGRESS_EOF"))
        .expect("progress file write");
    let json_start = write.find('[').unwrap();
    let json_end = write.rfind(']').unwrap();
    let statuses: Vec<SubTaskStatus> =
        serde_json::from_str(&write[json_start..=json_end]).unwrap();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].title, "A");
}

#[tokio::test]
async fn engine_start_and_stop_round_trip() {
    let f = fixture().await;
    f.engine.start().await;
    f.engine.stop().await;
}
