// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Docker-backed sandbox runtime for TeleCoder.
//!
//! Containers are driven through the `docker` CLI as child processes:
//! ephemeral containers run the agent via their entry point and are awaited,
//! persistent containers idle on `sleep infinity` and receive work through
//! `exec`. Stdout and stderr are merged into per-line streams.

pub mod docker;
pub mod verify;

pub use docker::DockerRuntime;
pub use verify::{detect_verify_commands, PROBE_FILES};
