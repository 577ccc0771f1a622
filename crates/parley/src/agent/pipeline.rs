//! The turn pipeline: three ordered stages over a [`ConversationState`].
//!
//! Each stage consumes and returns the state; the [`PipelineRunner`] executes
//! them strictly in order — prepare input, invoke the model, finalize the
//! response — with no branching and no reordering. Only input preparation can
//! fail; model invocation recovers every provider failure into a fallback
//! reply, so a validated turn always produces an assistant message.
//!
//! A failed run aborts without updating the session store: the previously
//! finalized state remains the visible session state (all-or-nothing per
//! turn).

use crate::agent::persona::PersonaCatalog;
use crate::agent::state::{ConversationState, FallbackReason, ReplySource};
use crate::agent::store::SessionStore;
use crate::api::CompletionBackend;
use crate::Message;
use crate::error::ValidationError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fixed user-facing reply substituted when a live model call fails.
pub const FALLBACK_REPLY: &str = "I apologize, but I'm experiencing technical \
     difficulties. Please try again in a moment.";

/// Boxed future returned by [`PipelineStage::apply`].
pub type StageFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ConversationState, ValidationError>> + Send + 'a>>;

/// One ordered state transformation of a turn.
pub trait PipelineStage: Send + Sync {
    /// Stage label for logs.
    fn name(&self) -> &'static str;

    /// Transform the state. Stages own the state for the duration of the
    /// call and hand it back on completion.
    fn apply(&self, state: ConversationState) -> StageFuture<'_>;
}

// ── InputPreparation ───────────────────────────────────────────────

/// Validates the caller's input and establishes the system-prompt invariant:
/// at most one system message, always at index 0.
pub struct InputPreparation {
    catalog: Arc<PersonaCatalog>,
}

impl InputPreparation {
    pub fn new(catalog: Arc<PersonaCatalog>) -> Self {
        Self { catalog }
    }

    fn validate(&self, state: &ConversationState) -> Result<(), ValidationError> {
        let limits = &self.catalog.limits;

        let session_id = state.session_id.trim();
        if session_id.is_empty() {
            return Err(ValidationError::EmptySessionId);
        }
        let id_len = state.session_id.chars().count();
        if id_len > limits.max_session_id_chars {
            return Err(ValidationError::SessionIdTooLong {
                len: id_len,
                max: limits.max_session_id_chars,
            });
        }

        let message = state
            .last_user_message()
            .ok_or(ValidationError::EmptyMessage)?;
        if message.is_blank() {
            return Err(ValidationError::EmptyMessage);
        }
        let len = message.content.chars().count();
        if len > limits.max_input_chars {
            return Err(ValidationError::MessageTooLong {
                len,
                max: limits.max_input_chars,
            });
        }

        Ok(())
    }
}

impl PipelineStage for InputPreparation {
    fn name(&self) -> &'static str {
        "input_preparation"
    }

    fn apply(&self, mut state: ConversationState) -> StageFuture<'_> {
        Box::pin(async move {
            debug!("preparing input for session {}", state.session_id);
            self.validate(&state)?;

            if !state.has_system_message() {
                if !self.catalog.is_known(&state.user_type) {
                    debug!(
                        "unknown user type `{}`; using fallback persona",
                        state.user_type
                    );
                }
                let prompt = self.catalog.system_prompt(&state.user_type);
                state.messages.insert(0, Message::system(prompt));
            }

            Ok(state)
        })
    }
}

// ── ModelInvocation ────────────────────────────────────────────────

/// Sends the full conversation to the completion backend and appends exactly
/// one assistant message.
///
/// This stage never fails: provider errors become the fixed apology reply,
/// and the outcome is recorded as a typed [`ReplySource`] so callers can
/// tell live replies from fallbacks without inspecting reply text. It is the
/// pipeline's only suspending step and its only source of latency.
pub struct ModelInvocation {
    backend: Arc<dyn CompletionBackend>,
}

impl ModelInvocation {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }
}

impl PipelineStage for ModelInvocation {
    fn name(&self) -> &'static str {
        "model_invocation"
    }

    fn apply(&self, mut state: ConversationState) -> StageFuture<'_> {
        Box::pin(async move {
            debug!(
                "invoking backend `{}` for session {} ({} messages)",
                self.backend.name(),
                state.session_id,
                state.messages.len()
            );

            match self.backend.complete(&state.messages).await {
                Ok(reply) => {
                    state.reply_source = Some(if self.backend.is_live() {
                        ReplySource::Live
                    } else {
                        ReplySource::Fallback(FallbackReason::MissingCredentials)
                    });
                    state.messages.push(Message::assistant(reply));
                }
                Err(e) => {
                    warn!(
                        "model invocation failed for session {}: {e}",
                        state.session_id
                    );
                    let reason = match e {
                        crate::error::ProviderError::Timeout => FallbackReason::Timeout,
                        _ => FallbackReason::ProviderError,
                    };
                    state.reply_source = Some(ReplySource::Fallback(reason));
                    state.messages.push(Message::assistant(FALLBACK_REPLY));
                }
            }

            Ok(state)
        })
    }
}

// ── ResponseFinalization ───────────────────────────────────────────

/// Marks the turn processed and persists the finished state and its updated
/// session record. What this stage writes is what the next turn loads.
pub struct ResponseFinalization {
    store: Arc<SessionStore>,
}

impl ResponseFinalization {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }
}

impl PipelineStage for ResponseFinalization {
    fn name(&self) -> &'static str {
        "response_finalization"
    }

    fn apply(&self, mut state: ConversationState) -> StageFuture<'_> {
        Box::pin(async move {
            state.processed = true;
            let record = self.store.finalize(&state);
            debug!(
                "finalized turn {} for session {}",
                record.message_count, record.session_id
            );
            Ok(state)
        })
    }
}

// ── PipelineRunner ─────────────────────────────────────────────────

/// Executes an ordered stage sequence for one turn.
pub struct PipelineRunner {
    stages: Vec<Arc<dyn PipelineStage>>,
    store: Arc<SessionStore>,
    checkpoint_stages: bool,
}

impl PipelineRunner {
    /// Runner over an explicit stage sequence.
    pub fn new(stages: Vec<Arc<dyn PipelineStage>>, store: Arc<SessionStore>) -> Self {
        Self {
            stages,
            store,
            checkpoint_stages: false,
        }
    }

    /// The standard three-stage turn pipeline.
    pub fn standard(
        catalog: Arc<PersonaCatalog>,
        backend: Arc<dyn CompletionBackend>,
        store: Arc<SessionStore>,
    ) -> Self {
        let stages: Vec<Arc<dyn PipelineStage>> = vec![
            Arc::new(InputPreparation::new(catalog)),
            Arc::new(ModelInvocation::new(backend)),
            Arc::new(ResponseFinalization::new(Arc::clone(&store))),
        ];
        Self::new(stages, store)
    }

    /// Save an in-flight checkpoint to the store after each non-final stage.
    /// A checkpoint with `processed == false` left behind after a crash
    /// identifies a turn that never finished.
    pub fn with_stage_checkpoints(mut self, enabled: bool) -> Self {
        self.checkpoint_stages = enabled;
        self
    }

    /// Run every stage strictly in order. The first stage error aborts the
    /// run; the store's finalized state is only touched by a run that
    /// reaches finalization.
    pub async fn run(
        &self,
        mut state: ConversationState,
    ) -> Result<ConversationState, ValidationError> {
        for stage in &self.stages {
            state = stage.apply(state).await?;
            if self.checkpoint_stages && !state.processed {
                self.store.save_inflight(state.clone());
            }
        }
        Ok(state)
    }
}
