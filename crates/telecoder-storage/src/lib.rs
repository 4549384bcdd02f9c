// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for TeleCoder sessions, messages, and events.
//!
//! WAL journal mode keeps readers unblocked during long writes; all writes
//! are serialized through tokio-rusqlite's background thread.

pub mod database;
pub mod queries;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
