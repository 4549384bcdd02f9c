// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use telecoder_core::types::{Message, Session};
use telecoder_core::TelecoderError;
use tracing::{debug, warn};

use crate::server::GatewayState;

/// Request body for `POST /api/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub repo: String,
    #[serde(default)]
    pub prompt: String,
    /// "task" (default) or "chat".
    #[serde(default)]
    pub mode: String,
    /// Optional per-session agent override.
    #[serde(default)]
    pub agent: String,
}

/// Response body for `POST /api/sessions`.
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub branch: String,
    pub mode: String,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: i64,
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePrResponse {
    pub url: String,
    pub number: i64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Maps engine errors onto HTTP statuses: validation problems are the
/// caller's fault, everything else is ours.
fn engine_error(err: TelecoderError) -> Response {
    match err {
        TelecoderError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        other => {
            warn!(error = %other, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// `POST /api/sessions` — create a task or chat session.
pub async fn create_session(
    State(state): State<GatewayState>,
    Json(body): Json<CreateSessionRequest>,
) -> Response {
    if body.repo.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "repo is required");
    }

    let mode = if body.mode.is_empty() {
        "task"
    } else {
        body.mode.as_str()
    };

    let result = match mode {
        "chat" => {
            if !body.prompt.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "prompt is not allowed for chat mode");
            }
            state.engine.create_chat_session(&body.repo).await
        }
        "task" => {
            if body.prompt.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "prompt is required for task mode");
            }
            state
                .engine
                .create_and_run_session_with_agent(&body.repo, &body.prompt, &body.agent)
                .await
        }
        _ => return error_response(StatusCode::BAD_REQUEST, "mode must be 'task' or 'chat'"),
    };

    match result {
        Ok(sess) => (
            StatusCode::CREATED,
            Json(CreateSessionResponse {
                id: sess.id,
                branch: sess.branch,
                mode: sess.mode.to_string(),
            }),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// `GET /api/sessions` — all sessions, newest first.
pub async fn list_sessions(State(state): State<GatewayState>) -> Response {
    match state.engine.store().list_sessions().await {
        Ok(sessions) => Json::<Vec<Session>>(sessions).into_response(),
        Err(e) => engine_error(e),
    }
}

/// `GET /api/sessions/{id}`.
pub async fn get_session(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.store().get_session(&id).await {
        Ok(Some(sess)) => Json(sess).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "session not found"),
        Err(e) => engine_error(e),
    }
}

/// `GET /api/sessions/{id}/messages`.
pub async fn get_messages(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.store().get_messages(&id).await {
        Ok(messages) => Json::<Vec<Message>>(messages).into_response(),
        Err(e) => engine_error(e),
    }
}

/// `POST /api/sessions/{id}/messages` — accepted for background handling.
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Response {
    if body.content.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "content is required");
    }

    match state.engine.send_chat_message(&id, &body.content).await {
        Ok(message) => (
            StatusCode::ACCEPTED,
            Json(SendMessageResponse {
                message_id: message.id,
                session_id: id,
            }),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// `POST /api/sessions/{id}/pr` — commit a chat session and open a PR.
pub async fn create_pr(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.create_pr_from_chat(&id).await {
        Ok((url, number)) => {
            (StatusCode::CREATED, Json(CreatePrResponse { url, number })).into_response()
        }
        Err(e) => engine_error(e),
    }
}

/// `POST /api/sessions/{id}/stop`.
pub async fn stop_session(State(state): State<GatewayState>, Path(id): Path<String>) -> Response {
    match state.engine.stop_session(&id).await {
        Ok(sess) => Json(sess).into_response(),
        Err(TelecoderError::Validation(msg)) => error_response(StatusCode::NOT_FOUND, msg),
        Err(e) => engine_error(e),
    }
}

/// `GET /health`.
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /api/webhooks/github` — routes PR comments back to the session
/// that owns the PR.
pub async fn github_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok());

    let event = match telecoder_github::parse_webhook(
        event_type,
        signature,
        &body,
        state.webhook_secret.as_deref(),
    ) {
        Ok(Some(event)) => event,
        Ok(None) => return StatusCode::OK.into_response(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let original = match state
        .engine
        .store()
        .get_session_by_pr(&event.repo, event.pr_number)
        .await
    {
        Ok(Some(sess)) => sess,
        Ok(None) => {
            debug!(repo = %event.repo, pr = event.pr_number, "webhook for unknown PR");
            return StatusCode::OK.into_response();
        }
        Err(e) => return engine_error(e),
    };

    match state.engine.create_pr_comment_session(&original, &event).await {
        Ok(sess) => (
            StatusCode::ACCEPTED,
            Json(CreateSessionResponse {
                id: sess.id,
                branch: sess.branch,
                mode: sess.mode.to_string(),
            }),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
