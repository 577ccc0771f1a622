//! Convenience re-exports for common `parley` types.
//!
//! Meant to be glob-imported when embedding the agent:
//!
//! ```ignore
//! use parley::prelude::*;
//! ```

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{DEFAULT_COMPLETIONS_URL, DEFAULT_MODEL, Message, MessageRole};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    ChatAgent, ConversationState, FallbackReason, InputPreparation, ModelInvocation, Persona,
    PersonaCatalog, PipelineRunner, PipelineStage, ReplySource, ResponseFinalization,
    SessionRecord, SessionStore, TurnOutcome,
};

// ── Providers ───────────────────────────────────────────────────────
pub use crate::api::{CompletionBackend, MockCompletion, OpenAiCompatClient, RetryConfig};

// ── Configuration and errors ────────────────────────────────────────
pub use crate::config::AgentConfig;
pub use crate::error::{AgentError, CatalogError, ProviderError, ValidationError};
