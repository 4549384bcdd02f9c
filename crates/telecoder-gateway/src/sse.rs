// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events stream for session progress.
//!
//! Each connection first replays the session's historical events from the
//! store (ascending by id), then forwards live events from the bus. Frame
//! format:
//!
//! ```text
//! id: <event-id>
//! event: <type>
//! data: <json-event>
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, Stream, StreamExt};
use telecoder_bus::EventBus;
use telecoder_core::types::Event;

use crate::server::GatewayState;

/// Removes the bus subscription when the client disconnects.
struct SubscriptionGuard {
    bus: Arc<EventBus>,
    session_id: String,
    sub_id: u64,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.session_id, self.sub_id);
    }
}

fn frame(event: &Event) -> std::result::Result<SseEvent, Infallible> {
    let data = serde_json::to_string(event).unwrap_or_default();
    Ok(SseEvent::default()
        .id(event.id.to_string())
        .event(event.kind.to_string())
        .data(data))
}

/// `GET /api/sessions/{id}/events`.
pub async fn session_events(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Response {
    // Unknown sessions get a 404, not an empty stream.
    match state.engine.store().get_session(&id).await {
        Ok(Some(_)) => {}
        _ => return StatusCode::NOT_FOUND.into_response(),
    }

    // Subscribe before reading history so no event published in between
    // is lost; duplicates are preferable to gaps.
    let subscription = state.engine.bus().subscribe(&id);
    let history = state
        .engine
        .store()
        .get_events(&id, 0)
        .await
        .unwrap_or_default();

    let guard = SubscriptionGuard {
        bus: state.engine.bus().clone(),
        session_id: id,
        sub_id: subscription.id,
    };

    let replay = stream::iter(history).map(|e| frame(&e));
    let live = stream::unfold(
        (subscription.rx, guard),
        |(mut rx, guard)| async move {
            let event = rx.recv().await?;
            Some((frame(&event), (rx, guard)))
        },
    );

    sse_response(replay.chain(live))
}

fn sse_response(
    stream: impl Stream<Item = std::result::Result<SseEvent, Infallible>> + Send + 'static,
) -> Response {
    Sse::new(stream)
        .keep_alive(axum::response::sse::KeepAlive::default())
        .into_response()
}
