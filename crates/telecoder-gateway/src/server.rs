// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use telecoder_core::{Result, TelecoderError};
use telecoder_engine::Engine;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers;
use crate::sse;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<Engine>,
    /// HMAC secret for the GitHub webhook; `None` disables verification.
    pub webhook_secret: Option<String>,
}

/// Builds the gateway router over the engine.
pub fn router(state: GatewayState) -> Router {
    let api_routes = Router::new()
        .route(
            "/sessions",
            post(handlers::create_session).get(handlers::list_sessions),
        )
        .route("/sessions/{id}", get(handlers::get_session))
        .route("/sessions/{id}/events", get(sse::session_events))
        .route(
            "/sessions/{id}/messages",
            get(handlers::get_messages).post(handlers::send_message),
        )
        .route("/sessions/{id}/pr", post(handlers::create_pr))
        .route("/sessions/{id}/stop", post(handlers::stop_session))
        .route("/webhooks/github", post(handlers::github_webhook));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the gateway until the process stops.
pub async fn start_server(addr: &str, state: GatewayState) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| TelecoderError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    info!(addr, "gateway listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| TelecoderError::Internal(format!("gateway server error: {e}")))
}
