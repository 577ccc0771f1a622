//! Conversation state threaded through the turn pipeline, plus the session
//! metadata record kept alongside it.

use crate::{Message, MessageRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Turn outcome ───────────────────────────────────────────────────

/// Where the assistant reply of a turn came from.
///
/// Fallbacks are an explicit, observable outcome rather than a string the
/// caller would have to sniff out of the reply text.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    /// The configured provider produced the reply.
    Live,
    /// A deterministic substitute reply was used.
    Fallback(FallbackReason),
}

/// Why a turn fell back to a substitute reply.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// No API key is configured; the offline mock backend answered.
    MissingCredentials,
    /// The provider call exceeded its deadline.
    Timeout,
    /// The provider call failed (HTTP error, transport, malformed body).
    ProviderError,
}

// ── ConversationState ──────────────────────────────────────────────

/// The flat state record passed between pipeline stages.
///
/// `messages` is append-only within a single run and its order is the
/// conversation order — it is the literal context sent to the model. The
/// invariant maintained by input preparation: at most one system message,
/// and if present it is the first element.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConversationState {
    /// Ordered conversation, system prompt first once established.
    pub messages: Vec<Message>,
    /// Opaque identifier, stable for the conversation's lifetime.
    pub session_id: String,
    /// Persona label selecting system-prompt behavior.
    pub user_type: String,
    /// `false` on construction; set only when response finalization has run.
    /// A stored state with `processed == false` is a turn that never
    /// finished.
    pub processed: bool,
    /// Typed outcome of the most recent model invocation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_source: Option<ReplySource>,
}

impl ConversationState {
    /// Fresh state with an empty history.
    pub fn new(session_id: impl Into<String>, user_type: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            session_id: session_id.into(),
            user_type: user_type.into(),
            processed: false,
            reply_source: None,
        }
    }

    /// Whether any system message is present.
    pub fn has_system_message(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == MessageRole::System)
    }

    /// The newest user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }

    /// Text of the newest assistant message, if any.
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Completed-turn count: one user message per turn.
    pub fn user_message_count(&self) -> u64 {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .count() as u64
    }
}

// ── SessionRecord ──────────────────────────────────────────────────

/// Per-session metadata kept by the [`SessionStore`](super::store::SessionStore).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionRecord {
    /// Duplicate of the store key, for convenience.
    pub session_id: String,
    /// Completed turns for this session. Monotonically non-decreasing.
    pub message_count: u64,
    /// Persona last used for this session.
    pub user_type: String,
    /// When the session was first finalized.
    pub created_at: DateTime<Utc>,
    /// When the session was last finalized. Drives TTL expiry.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, user_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            message_count: 0,
            user_type: user_type.into(),
            created_at: now,
            updated_at: now,
        }
    }
}
