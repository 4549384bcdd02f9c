// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway API tests over an in-memory engine with mock components.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use telecoder_bus::EventBus;
use telecoder_core::types::{Mode, Session, Status};
use telecoder_engine::{Engine, EngineBuilder, EngineConfig};
use telecoder_gateway::{router, GatewayState};
use telecoder_storage::SqliteStore;
use telecoder_test_utils::{MockGit, MockRuntime};
use tower::ServiceExt;

async fn test_app() -> (Router, Arc<Engine>) {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let engine = EngineBuilder::new(
        EngineConfig::default(),
        store,
        Arc::new(EventBus::new()),
        Arc::new(MockRuntime::new()),
        Arc::new(MockGit::new()),
    )
    .build();

    let state = GatewayState {
        engine: engine.clone(),
        webhook_secret: None,
    };
    (router(state), engine)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn create_task_session_returns_201() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "acme/api", "prompt": "fix the bug"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["mode"], "task");
    assert!(json["branch"].as_str().unwrap().starts_with("telecoder/"));
    assert_eq!(json["id"].as_str().unwrap().len(), 8);
}

#[tokio::test]
async fn create_session_rejects_missing_repo() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json("/api/sessions", serde_json::json!({"prompt": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_session_rejects_invalid_repo_format() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "not-a-repo", "prompt": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("invalid repo format"));
}

#[tokio::test]
async fn task_mode_requires_prompt() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "acme/api"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_mode_forbids_prompt() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "acme/api", "mode": "chat", "prompt": "nope"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_mode_without_prompt_is_created() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "acme/api", "mode": "chat"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["mode"], "chat");
}

#[tokio::test]
async fn unknown_mode_is_rejected() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions",
            serde_json::json!({"repo": "acme/api", "mode": "batch", "prompt": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_sessions_newest_first() {
    let (app, engine) = test_app().await;

    let mut old = Session::new("old11111", "acme/api", "first", Mode::Task);
    old.created_at = "2026-01-01T00:00:00+00:00".into();
    old.updated_at = old.created_at.clone();
    engine.store().create_session(&old).await.unwrap();

    let mut new = Session::new("new11111", "acme/api", "second", Mode::Task);
    new.created_at = "2026-02-01T00:00:00+00:00".into();
    new.updated_at = new.created_at.clone();
    engine.store().create_session(&new).await.unwrap();

    let response = app.oneshot(get("/api/sessions")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let ids: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["new11111", "old11111"]);
}

#[tokio::test]
async fn get_unknown_session_is_404() {
    let (app, _) = test_app().await;
    let response = app.oneshot(get("/api/sessions/nope1234")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_session_returns_the_row() {
    let (app, engine) = test_app().await;
    let sess = Session::new("get11111", "acme/api", "p", Mode::Task);
    engine.store().create_session(&sess).await.unwrap();

    let response = app.oneshot(get("/api/sessions/get11111")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "get11111");
    assert_eq!(json["repo"], "acme/api");
}

#[tokio::test]
async fn send_message_requires_content() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json(
            "/api/sessions/some1234/messages",
            serde_json::json!({"content": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn send_message_to_idle_chat_returns_202() {
    let (app, engine) = test_app().await;
    let mut sess = Session::new("chat1111", "acme/api", "", Mode::Chat);
    sess.status = Status::Idle;
    sess.container_id = "c1".to_string();
    engine.store().create_session(&sess).await.unwrap();

    let response = app
        .oneshot(post_json(
            "/api/sessions/chat1111/messages",
            serde_json::json!({"content": "add /health"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["session_id"], "chat1111");
    assert!(json["message_id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn stop_unknown_session_is_404() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(post_json("/api/sessions/nope1234/stop", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stop_session_marks_error() {
    let (app, engine) = test_app().await;
    let mut sess = Session::new("stop1111", "acme/api", "", Mode::Chat);
    sess.status = Status::Idle;
    engine.store().create_session(&sess).await.unwrap();

    let response = app
        .oneshot(post_json("/api/sessions/stop1111/stop", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"], "stopped by user");
}

#[tokio::test]
async fn events_stream_for_unknown_session_is_404() {
    let (app, _) = test_app().await;
    let response = app
        .oneshot(get("/api/sessions/nope1234/events"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn webhook_for_unrelated_event_is_ok() {
    let (app, _) = test_app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", "push")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_comment_spawns_follow_up_session() {
    let (app, engine) = test_app().await;

    let mut original = Session::new("orig1111", "acme/api", "add auth", Mode::Task);
    original.status = Status::Complete;
    original.pr_url = "https://github.com/acme/api/pull/42".to_string();
    original.pr_number = 42;
    engine.store().create_session(&original).await.unwrap();

    let payload = serde_json::json!({
        "action": "created",
        "issue": {
            "number": 42,
            "pull_request": {"url": "https://api.github.com/repos/acme/api/pulls/42"}
        },
        "comment": {"id": 9, "body": "add a test please", "user": {"login": "reviewer"}},
        "repository": {"full_name": "acme/api"}
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/github")
        .header("content-type", "application/json")
        .header("x-github-event", "issue_comment")
        .body(Body::from(payload.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    let child_id = json["id"].as_str().unwrap();
    let child = engine.store().get_session(child_id).await.unwrap().unwrap();
    assert_eq!(child.pr_number, 42);
    assert!(child.prompt.contains("add a test please"));
}
