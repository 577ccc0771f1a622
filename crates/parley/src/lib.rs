//! Persona-driven conversational agent runtime.
//!
//! `parley` wires a linear three-stage turn pipeline (prepare input → call the
//! completion provider → finalize the response) to an OpenAI-compatible
//! chat-completions API, with pluggable personas (per-user-type system prompts
//! and permission labels) and in-memory, session-keyed conversation tracking.
//! The core abstraction is the [`ChatAgent`](agent::chat::ChatAgent) — one
//! `chat()` call is one turn: a user message in, an assistant message out,
//! and the session's state finalized in the [`SessionStore`](agent::store::SessionStore).
//!
//! The runtime is fully operable without credentials: when no API key is
//! configured, a deterministic [`MockCompletion`](api::mock::MockCompletion)
//! backend answers instead, so the pipeline and everything built on it stays
//! testable offline.
//!
//! # Getting started
//!
//! ```ignore
//! use parley::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), AgentError> {
//!     let config = AgentConfig::from_env();
//!     let mut agent = ChatAgent::new(config);
//!     agent.initialize()?;
//!
//!     let reply = agent.chat("Hello!", "s1", "customer").await?;
//!     println!("{reply}");
//!
//!     // The session now holds [system, user, assistant].
//!     let history = agent.get_conversation_history("s1");
//!     assert_eq!(history.len(), 3);
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Run a conversation:** [`ChatAgent`](agent::chat::ChatAgent) —
//!   `initialize()`, `chat()`, and the session-management surface
//!   (`get_conversation_history`, `clear_session`, `session_exists`,
//!   `get_session_info`). Use
//!   [`chat_turn()`](agent::chat::ChatAgent::chat_turn) when you need to know
//!   whether a reply came from the live provider or a fallback.
//! - **Personas:** [`PersonaCatalog`](agent::persona::PersonaCatalog) — the
//!   built-in `customer` / `support_agent` / `manager` set, YAML catalogs,
//!   and the total `resolve()` that degrades to the fallback persona instead
//!   of failing.
//! - **The turn pipeline:** [`PipelineRunner`](agent::pipeline::PipelineRunner)
//!   and the three [`PipelineStage`](agent::pipeline::PipelineStage)
//!   implementations. Stages run strictly in order; a validation failure
//!   aborts the turn without touching the store.
//! - **Providers:** the [`CompletionBackend`](api::CompletionBackend) trait,
//!   with [`OpenAiCompatClient`](api::openai::OpenAiCompatClient) for live
//!   calls and [`MockCompletion`](api::mock::MockCompletion) for offline use.
//!   The backend is chosen once at `initialize()`, never per call.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`ChatAgent`](agent::chat::ChatAgent) orchestrator, pipeline stages, session store, personas |
//! | [`api`] | [`CompletionBackend`](api::CompletionBackend) trait, OpenAI-compatible client, mock backend, retry policy |
//! | [`config`] | [`AgentConfig`](config::AgentConfig) — provider and runtime knobs |
//! | [`error`] | Typed errors: validation, provider, catalog, agent |

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod prelude;

use serde::{Deserialize, Serialize};

// ── Constants ──────────────────────────────────────────────────────

/// Default chat-completions endpoint (OpenAI-compatible).
pub const DEFAULT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default model for live completions.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in a conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A role-tagged message. The ordered message list of a session is the
/// literal context sent to the completion provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Whether the content is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("rules");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "rules");

        let user = Message::user("hello");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant("hi there");
        assert_eq!(assist.role, MessageRole::Assistant);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let parsed: MessageRole = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(parsed, MessageRole::System);
    }

    #[test]
    fn blank_detection() {
        assert!(Message::user("").is_blank());
        assert!(Message::user("   \n\t").is_blank());
        assert!(!Message::user("x").is_blank());
    }

    #[test]
    fn role_display_matches_wire_form() {
        assert_eq!(MessageRole::User.to_string(), "user");
        assert_eq!(MessageRole::System.to_string(), "system");
    }
}
