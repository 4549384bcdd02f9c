// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `telecoder serve` command implementation.
//!
//! Composition root: wires configuration, storage, the event bus, the
//! Docker runtime, the GitHub provider, the LLM-backed pipeline stages,
//! the chain evaluator, the engine, and the HTTP gateway. Supports
//! graceful shutdown on Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use telecoder_bus::EventBus;
use telecoder_config::TelecoderConfig;
use telecoder_core::traits::LlmClient;
use telecoder_core::{Result, TelecoderError};
use telecoder_dispatcher::{ChainEvaluator, Dispatcher};
use telecoder_engine::{EngineBuilder, EngineConfig};
use telecoder_gateway::GatewayState;
use telecoder_github::GithubClient;
use telecoder_llm::{AnthropicClient, OpenAiClient};
use telecoder_pipeline::{DecomposeStage, PlanStage, ReviewStage, VerifyStage};
use telecoder_sandbox::DockerRuntime;
use telecoder_storage::SqliteStore;
use tracing::{info, warn};

/// Runs the TeleCoder server until Ctrl-C.
pub async fn run_serve(config: TelecoderConfig) -> Result<()> {
    init_tracing(&config.server.log_level);
    info!("starting telecoder serve");

    std::fs::create_dir_all(&config.data.dir)
        .map_err(|e| TelecoderError::Internal(format!("creating data directory: {e}")))?;

    let store = Arc::new(SqliteStore::open(&config.data.database_path()).await?);
    let bus = Arc::new(EventBus::new());
    let sandbox = Arc::new(DockerRuntime::new());

    let github_token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    if github_token.is_empty() {
        warn!("GITHUB_TOKEN is not set; PR creation and indexing will fail");
    }
    let git = Arc::new(GithubClient::new(&github_token)?);

    let llm = llm_client_from_env(&config);
    if llm.is_none() {
        info!("no LLM API key found; running in direct mode (no plan/review/verify)");
    }

    let engine_config = EngineConfig {
        image: config.sandbox.image.clone(),
        network: config.sandbox.network.clone(),
        sandbox_env: build_sandbox_env(&github_token),
        max_revisions: config.limits.max_revisions,
        chat_idle_timeout: Duration::from_secs(config.limits.chat_idle_timeout_secs),
        chat_max_messages: config.limits.chat_max_messages,
        coding_agent: config.agent.coding_agent.clone(),
        max_sub_tasks: config.limits.max_sub_tasks,
        max_chain_depth: config.limits.max_chain_depth,
    };

    let mut builder = EngineBuilder::new(engine_config, store, bus, sandbox, git);
    if let Some(llm) = &llm {
        builder = builder
            .with_stages(
                Some(Arc::new(PlanStage::new(llm.clone(), ""))),
                Some(Arc::new(ReviewStage::new(llm.clone(), ""))),
                Some(Arc::new(DecomposeStage::new(llm.clone(), ""))),
                Some(Arc::new(VerifyStage::new(llm.clone(), ""))),
            )
            .with_chain(Arc::new(ChainEvaluator::new(
                Dispatcher::new(llm.clone()),
                config.limits.max_chain_depth,
            )));
    }
    let engine = builder.build();

    engine.start().await;

    let state = GatewayState {
        engine: engine.clone(),
        webhook_secret: config.github.webhook_secret.clone(),
    };
    let addr = config.server.bind_addr();

    tokio::select! {
        result = telecoder_gateway::start_server(&addr, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    engine.stop().await;
    engine.store().close().await?;
    info!("telecoder stopped");
    Ok(())
}

/// Picks an LLM client from environment API keys: Anthropic first, then
/// OpenAI. `None` disables the pipeline stages.
fn llm_client_from_env(config: &TelecoderConfig) -> Option<Arc<dyn LlmClient>> {
    let model = config.llm.model.clone().unwrap_or_default();
    if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
        if !key.is_empty() {
            if let Ok(client) = AnthropicClient::new(&key, &model) {
                return Some(Arc::new(client));
            }
        }
    }
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            if let Ok(client) = OpenAiClient::new(&key, &model) {
                return Some(Arc::new(client));
            }
        }
    }
    None
}

/// Environment passed into every sandbox container: the git token and
/// whatever LLM keys the agents inside need.
fn build_sandbox_env(github_token: &str) -> Vec<String> {
    let mut env = Vec::new();
    if !github_token.is_empty() {
        env.push(format!("GITHUB_TOKEN={github_token}"));
    }
    for key in ["ANTHROPIC_API_KEY", "OPENAI_API_KEY"] {
        if let Ok(value) = std::env::var(key) {
            if !value.is_empty() {
                env.push(format!("{key}={value}"));
            }
        }
    }
    env
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("telecoder={level},info")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
