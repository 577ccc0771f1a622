//! The [`ChatAgent`] orchestrator — the public entry point of the runtime.
//!
//! One `chat()` call is one turn: load (or create) the session's state,
//! append the user message, run the three-stage pipeline, persist, and
//! return the assistant's reply text. The agent holds no conversation state
//! of its own between calls; everything lives in the [`SessionStore`].
//!
//! `initialize()` selects the completion backend exactly once from
//! configuration — a live OpenAI-compatible client when an API key is
//! present, the deterministic mock otherwise. Calling `chat()` before
//! `initialize()` is a precondition error.

use crate::agent::persona::PersonaCatalog;
use crate::agent::pipeline::{FALLBACK_REPLY, PipelineRunner};
use crate::agent::state::{ConversationState, FallbackReason, ReplySource, SessionRecord};
use crate::agent::store::SessionStore;
use crate::api::{CompletionBackend, MockCompletion, OpenAiCompatClient};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::Message;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one completed turn: the reply text plus where it came from.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The assistant's reply. Never empty for a completed turn.
    pub reply: String,
    /// Whether the reply came from the live provider or a fallback path.
    pub source: ReplySource,
}

/// Conversational agent over a persona catalog, a completion backend, and an
/// in-memory session store.
pub struct ChatAgent {
    config: AgentConfig,
    catalog: Arc<PersonaCatalog>,
    store: Arc<SessionStore>,
    runner: Option<PipelineRunner>,
}

impl ChatAgent {
    /// Create an uninitialized agent with the built-in persona catalog.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            catalog: Arc::new(PersonaCatalog::builtin()),
            store: Arc::new(SessionStore::new()),
            runner: None,
        }
    }

    /// Replace the persona catalog. Must be called before `initialize()`.
    pub fn with_catalog(mut self, catalog: PersonaCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// One-time setup: load the persona file if one is configured, select
    /// the completion backend from configuration, and build the pipeline.
    ///
    /// With no API key this is infallible in practice — the mock backend
    /// needs nothing — so the agent is always operable offline.
    pub fn initialize(&mut self) -> Result<(), AgentError> {
        if let Some(ref path) = self.config.persona_file {
            self.catalog = Arc::new(PersonaCatalog::from_yaml_file(path)?);
        }

        let backend: Arc<dyn CompletionBackend> = match self.config.api_key {
            Some(ref key) => {
                let client =
                    OpenAiCompatClient::from_config(&self.config, key).map_err(AgentError::Init)?;
                Arc::new(client)
            }
            None => {
                info!("no API key configured; using the deterministic mock backend");
                Arc::new(MockCompletion::new())
            }
        };

        self.install_backend(backend);
        Ok(())
    }

    /// Initialize with a caller-provided backend, bypassing configuration.
    /// The seam for custom providers and scripted test backends.
    pub fn initialize_with_backend(&mut self, backend: Arc<dyn CompletionBackend>) {
        self.install_backend(backend);
    }

    fn install_backend(&mut self, backend: Arc<dyn CompletionBackend>) {
        info!("chat agent initialized (backend: {})", backend.name());
        let runner = PipelineRunner::standard(
            Arc::clone(&self.catalog),
            backend,
            Arc::clone(&self.store),
        )
        .with_stage_checkpoints(true);
        self.runner = Some(runner);
    }

    /// Whether `initialize()` has run.
    pub fn initialized(&self) -> bool {
        self.runner.is_some()
    }

    // ── Chat ───────────────────────────────────────────────────────

    /// Run one turn and return the assistant's reply text.
    ///
    /// Validation failures (empty or oversized input, bad session id) reject
    /// the call and leave the session's stored state untouched. Provider
    /// failures do not surface here — the turn completes with a fallback
    /// reply; use [`chat_turn`](Self::chat_turn) to observe which path was
    /// taken.
    pub async fn chat(
        &self,
        message: &str,
        session_id: &str,
        user_type: &str,
    ) -> Result<String, AgentError> {
        self.chat_turn(message, session_id, user_type)
            .await
            .map(|outcome| outcome.reply)
    }

    /// Run one turn and return the reply together with its typed source.
    pub async fn chat_turn(
        &self,
        message: &str,
        session_id: &str,
        user_type: &str,
    ) -> Result<TurnOutcome, AgentError> {
        let runner = self.runner.as_ref().ok_or(AgentError::NotInitialized)?;

        let mut state = self
            .store
            .load_state(session_id)
            .unwrap_or_else(|| ConversationState::new(session_id, user_type));
        state.user_type = user_type.to_string();
        state.processed = false;
        state.reply_source = None;
        state.messages.push(Message::user(message));

        debug!(
            "turn start: session={session_id}, user_type={user_type}, history={}",
            state.messages.len() - 1
        );

        let final_state = runner.run(state).await?;

        let reply = final_state
            .last_assistant_text()
            .unwrap_or(FALLBACK_REPLY)
            .to_string();
        let source = final_state
            .reply_source
            .unwrap_or(ReplySource::Fallback(FallbackReason::ProviderError));

        Ok(TurnOutcome { reply, source })
    }

    // ── Session management ─────────────────────────────────────────

    /// Full message history for a session, system prompt first. Empty for
    /// unknown or cleared sessions — never an error.
    pub fn get_conversation_history(&self, session_id: &str) -> Vec<Message> {
        self.store.history(session_id)
    }

    /// Remove a session. Idempotent: clearing an absent session is a no-op
    /// success.
    pub fn clear_session(&self, session_id: &str) {
        self.store.clear(session_id);
    }

    pub fn session_exists(&self, session_id: &str) -> bool {
        self.store.exists(session_id)
    }

    /// Metadata for a session, if it has completed at least one turn.
    pub fn get_session_info(&self, session_id: &str) -> Option<SessionRecord> {
        self.store.record(session_id)
    }

    /// Sweep sessions idle longer than the catalog's `session_timeout_secs`.
    /// Returns how many were removed.
    pub fn purge_expired_sessions(&self) -> usize {
        self.store
            .purge_expired(self.catalog.defaults.session_timeout_secs)
    }

    /// The active persona catalog.
    pub fn catalog(&self) -> &PersonaCatalog {
        &self.catalog
    }

    /// The underlying session store (shared with the pipeline).
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}
