// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/SSE surface for TeleCoder.
//!
//! Serves the session API consumed by the CLI, web dashboard, and chat
//! channels, plus the GitHub webhook intake. Progress streaming replays
//! stored history before forwarding live bus events.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{router, start_server, GatewayState};
