// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock components for deterministic TeleCoder tests.
//!
//! Provides a scriptable sandbox runtime, a counting git provider stub,
//! and mock LLM clients, enabling fast engine-level scenario tests without
//! Docker, GitHub, or external APIs.

pub mod mock_git;
pub mod mock_llm;
pub mod mock_runtime;

pub use mock_git::MockGit;
pub use mock_llm::{MockLlm, RoutedLlm};
pub use mock_runtime::MockRuntime;
