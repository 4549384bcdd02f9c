// SPDX-FileCopyrightText: 2026 TeleCoder Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session orchestration for TeleCoder.
//!
//! The [`Engine`] owns every workflow: task sessions (fire-and-forget
//! ephemeral containers with plan/verify/review revision rounds),
//! multi-step persistent execution with git checkpoints, interactive chat
//! sessions, PR-comment follow-ups, idle reaping, and bounded follow-up
//! chains. It depends only on the component traits from `telecoder-core`.
//!
//! All session work happens on background workers tracked by a
//! [`TaskTracker`]; public methods are non-blocking after the initial
//! store write, and callers observe progress through the bus.

mod chat;
mod multistep;
mod task;

use std::sync::Arc;
use std::time::Duration;

use telecoder_bus::EventBus;
use telecoder_core::traits::git::split_repo;
use telecoder_core::traits::{GitProvider, SandboxRuntime, SessionStore};
use telecoder_core::types::{Event, EventKind, Mode, Session, SessionResult, Status};
use telecoder_core::{Result, TelecoderError};
use telecoder_dispatcher::{Action, ChainEvaluator};
use telecoder_memory::MemoryStore;
use telecoder_pipeline::{DecomposeStage, PlanStage, ReviewStage, VerifyStage};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Engine-specific configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sandbox container image.
    pub image: String,
    /// Sandbox container network; empty disables network setup.
    pub network: String,
    /// Environment entries injected into every sandbox.
    pub sandbox_env: Vec<String>,
    /// Review-or-verify retry bound per sub-task.
    pub max_revisions: u32,
    /// Idle chat sessions older than this are reaped.
    pub chat_idle_timeout: Duration,
    /// User-message cap per chat session.
    pub chat_max_messages: usize,
    /// Coding agent to run inside the sandbox ("auto" lets the sandbox
    /// entry point decide based on API keys).
    pub coding_agent: String,
    /// Upper bound on task decomposition.
    pub max_sub_tasks: usize,
    /// Maximum follow-up chain depth.
    pub max_chain_depth: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            image: "telecoder-sandbox".to_string(),
            network: "telecoder-net".to_string(),
            sandbox_env: Vec::new(),
            max_revisions: 1,
            chat_idle_timeout: Duration::from_secs(30 * 60),
            chat_max_messages: 50,
            coding_agent: "auto".to_string(),
            max_sub_tasks: 5,
            max_chain_depth: 3,
        }
    }
}

/// The TeleCoder session orchestrator.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) sandbox: Arc<dyn SandboxRuntime>,
    pub(crate) git: Arc<dyn GitProvider>,
    pub(crate) plan: Option<Arc<PlanStage>>,
    pub(crate) review: Option<Arc<ReviewStage>>,
    pub(crate) decompose: Option<Arc<DecomposeStage>>,
    pub(crate) verify: Option<Arc<VerifyStage>>,
    pub(crate) memory: Option<Arc<MemoryStore>>,
    pub(crate) chain: Option<Arc<ChainEvaluator>>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

/// Builds an [`Engine`] from its required components plus optional stages.
pub struct EngineBuilder {
    config: EngineConfig,
    store: Arc<dyn SessionStore>,
    bus: Arc<EventBus>,
    sandbox: Arc<dyn SandboxRuntime>,
    git: Arc<dyn GitProvider>,
    plan: Option<Arc<PlanStage>>,
    review: Option<Arc<ReviewStage>>,
    decompose: Option<Arc<DecomposeStage>>,
    verify: Option<Arc<VerifyStage>>,
    memory: Option<Arc<MemoryStore>>,
    chain: Option<Arc<ChainEvaluator>>,
}

impl EngineBuilder {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        bus: Arc<EventBus>,
        sandbox: Arc<dyn SandboxRuntime>,
        git: Arc<dyn GitProvider>,
    ) -> Self {
        EngineBuilder {
            config,
            store,
            bus,
            sandbox,
            git,
            plan: None,
            review: None,
            decompose: None,
            verify: None,
            memory: None,
            chain: None,
        }
    }

    /// Installs the LLM-backed pipeline stages. Missing stages degrade the
    /// workflow (direct prompt, no review, no verify) but never fail it.
    pub fn with_stages(
        mut self,
        plan: Option<Arc<PlanStage>>,
        review: Option<Arc<ReviewStage>>,
        decompose: Option<Arc<DecomposeStage>>,
        verify: Option<Arc<VerifyStage>>,
    ) -> Self {
        self.plan = plan;
        self.review = review;
        self.decompose = decompose;
        self.verify = verify;
        self
    }

    /// Installs cross-session memory.
    pub fn with_memory(mut self, memory: Arc<MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Installs the follow-up chain evaluator.
    pub fn with_chain(mut self, chain: Arc<ChainEvaluator>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn build(self) -> Arc<Engine> {
        Arc::new(Engine {
            config: self.config,
            store: self.store,
            bus: self.bus,
            sandbox: self.sandbox,
            git: self.git,
            plan: self.plan,
            review: self.review,
            decompose: self.decompose,
            verify: self.verify,
            memory: self.memory,
            chain: self.chain,
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }
}

impl Engine {
    /// Starts background work: ensures the sandbox network exists and
    /// spawns the idle-chat reaper. Call [`Engine::stop`] to shut down.
    pub async fn start(self: &Arc<Self>) {
        if !self.config.network.is_empty() {
            if let Err(e) = self.sandbox.ensure_network(&self.config.network).await {
                warn!(error = %e, "could not create sandbox network");
            }
        }

        let engine = self.clone();
        self.spawn_worker(async move {
            engine.reap_idle_chat_sessions().await;
        });
    }

    /// Cancels all in-flight work and waits for workers to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// The session store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The event bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Runs a worker until it completes or the engine is stopped.
    pub(crate) fn spawn_worker(
        self: &Arc<Self>,
        fut: impl std::future::Future<Output = ()> + Send + 'static,
    ) {
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = fut => {}
            }
        });
    }

    pub(crate) fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // --- Session creation ---

    /// Creates a task-mode session and launches its workflow.
    pub async fn create_and_run_session(
        self: &Arc<Self>,
        repo: &str,
        prompt: &str,
    ) -> Result<Session> {
        self.create_and_run_session_with_agent(repo, prompt, "").await
    }

    /// Creates a task-mode session with a per-session agent override and
    /// launches its workflow. Non-blocking after the initial store write.
    pub async fn create_and_run_session_with_agent(
        self: &Arc<Self>,
        repo: &str,
        prompt: &str,
        agent: &str,
    ) -> Result<Session> {
        split_repo(repo)?;
        if prompt.is_empty() {
            return Err(TelecoderError::Validation(
                "prompt is required for task mode".into(),
            ));
        }

        let mut sess = Session::new(short_id(), repo, prompt, Mode::Task);
        sess.agent = agent.to_string();
        self.persist_and_run(sess).await
    }

    /// Creates a chained child session spawned from a completed parent.
    async fn create_chained_session(
        self: &Arc<Self>,
        parent: &Session,
        repo: &str,
        prompt: &str,
        agent: &str,
    ) -> Result<Session> {
        split_repo(repo)?;
        let mut sess = Session::new(short_id(), repo, prompt, Mode::Task);
        sess.agent = agent.to_string();
        sess.chain_id = if parent.chain_id.is_empty() {
            parent.id.clone()
        } else {
            parent.chain_id.clone()
        };
        sess.chain_depth = parent.chain_depth + 1;
        self.persist_and_run(sess).await
    }

    fn persist_and_run<'a>(
        self: &'a Arc<Self>,
        sess: Session,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Session>> + Send + 'a>> {
        Box::pin(async move {
            self.store.create_session(&sess).await?;

            let engine = self.clone();
            let session_id = sess.id.clone();
            self.spawn_worker(async move {
                engine.run_session(session_id).await;
            });
            Ok(sess)
        })
    }

    // --- Event plumbing ---

    /// Appends an event to the store and publishes it on the bus, in that
    /// order, preserving per-session program order.
    pub(crate) async fn emit_event(&self, session_id: &str, kind: EventKind, data: &str) {
        let mut event = Event::new(session_id, kind, data);
        match self.store.add_event(&event).await {
            Ok(id) => event.id = id,
            Err(e) => error!(session_id, error = %e, "storing event failed"),
        }
        self.bus.publish(session_id, &event);
    }

    /// Routes one container output line: the session's agent parser first,
    /// the shared marker table as its fallback, plain output otherwise.
    pub(crate) async fn dispatch_log_line(&self, session_id: &str, agent_name: &str, line: &str) {
        let agent = telecoder_agent::registry().resolve(agent_name);
        match agent.parse_event(line) {
            Some(parsed) => match parsed.kind {
                EventKind::Done => {
                    self.emit_event(
                        session_id,
                        EventKind::Status,
                        &format!("Branch pushed: {}", parsed.data),
                    )
                    .await;
                }
                kind => self.emit_event(session_id, kind, &parsed.data).await,
            },
            None => self.emit_event(session_id, EventKind::Output, line).await,
        }
    }

    // --- Failure semantics ---

    /// The single session terminator: sets status=error, stores the
    /// failure string, emits an `error` event. Idempotent: a session
    /// already in a terminal state keeps its first message.
    pub(crate) async fn fail_session(&self, sess: &mut Session, msg: &str) {
        if let Ok(Some(current)) = self.store.get_session(&sess.id).await {
            if current.status.is_terminal() {
                debug!(session_id = %sess.id, "fail_session on terminal session ignored");
                return;
            }
        }
        error!(session_id = %sess.id, "session failed: {msg}");
        sess.status = Status::Error;
        sess.error = msg.to_string();
        if let Err(e) = self.store.update_session(sess).await {
            error!(session_id = %sess.id, error = %e, "persisting failure failed");
        }
        self.emit_event(&sess.id, EventKind::Error, msg).await;
    }

    // --- Agent selection ---

    /// The agent name for the sandbox. Per-session override wins, then the
    /// configured agent; "auto" and empty resolve to "" (the sandbox entry
    /// point decides based on API keys).
    pub(crate) fn resolve_agent_name<'a>(&'a self, session_agent: &'a str) -> &'a str {
        if !session_agent.is_empty() && session_agent != "auto" {
            return session_agent;
        }
        if !self.config.coding_agent.is_empty() && self.config.coding_agent != "auto" {
            return &self.config.coding_agent;
        }
        ""
    }

    /// A copy of the base sandbox env with agent selection applied.
    pub(crate) fn build_sandbox_env(&self, session_agent: &str) -> Vec<String> {
        let mut env = self.config.sandbox_env.clone();
        let agent = self.resolve_agent_name(session_agent);
        if !agent.is_empty() {
            env.push(format!("TELECODER_CODING_AGENT={agent}"));
        }
        env
    }

    // --- Post-completion hooks ---

    /// Records the completed session in memory and evaluates a follow-up
    /// chain. Chain-limit refusals and evaluation failures are never
    /// session failures.
    pub(crate) async fn after_completion(self: &Arc<Self>, session_id: &str) {
        let Ok(Some(sess)) = self.store.get_session(session_id).await else {
            return;
        };
        if sess.status != Status::Complete {
            return;
        }

        if let Some(memory) = &self.memory {
            let result = match &sess.result {
                SessionResult::Pr { url, .. } => url.clone(),
                SessionResult::Text { content } => content.clone(),
                SessionResult::None => String::new(),
            };
            if let Err(e) = memory.add(&sess.id, &sess.repo, &sess.prompt, &result).await {
                warn!(session_id, error = %e, "recording session in memory failed");
            }
        }

        let Some(chain) = &self.chain else { return };
        match chain.evaluate(&sess).await {
            Ok(Some(decision)) if decision.action == Action::Spawn => {
                match self
                    .create_chained_session(&sess, &decision.repo, &decision.prompt, &decision.agent)
                    .await
                {
                    Ok(child) => {
                        info!(
                            parent = session_id,
                            child = %child.id,
                            depth = child.chain_depth,
                            "chain follow-up spawned"
                        );
                    }
                    Err(e) => warn!(session_id, error = %e, "chain spawn failed"),
                }
            }
            Ok(_) => {}
            Err(TelecoderError::ChainLimit { max }) => {
                debug!(session_id, max, "chain depth limit reached, no follow-up");
            }
            Err(e) => warn!(session_id, error = %e, "chain evaluation failed"),
        }
    }

    // --- External stop ---

    /// Stops a session on user request: kills its container and marks it
    /// errored with "stopped by user".
    pub async fn stop_session(&self, session_id: &str) -> Result<Session> {
        let mut sess = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| TelecoderError::Validation("session not found".into()))?;

        if !sess.container_id.is_empty() {
            if let Err(e) = self.sandbox.stop(&sess.container_id).await {
                warn!(session_id, error = %e, "stopping container failed");
            }
        }

        sess.status = Status::Error;
        sess.error = "stopped by user".to_string();
        self.store.update_session(&sess).await?;
        Ok(sess)
    }
}

/// A stable short session id: the first 8 hex chars of a UUID.
pub(crate) fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
