//! Deterministic offline completion backend.
//!
//! Selected at agent initialization whenever no API key is configured, so
//! every caller — demos, tests, CI — gets a working pipeline without
//! credentials. Replies are a pure function of the conversation, never a
//! network call.

use crate::error::ProviderError;
use crate::{Message, MessageRole};

use super::{CompletionBackend, CompletionFuture};

/// How much of the user's message the default mock reply echoes back.
const ECHO_CHARS: usize = 80;

/// Offline [`CompletionBackend`] with deterministic replies.
pub struct MockCompletion {
    fixed_reply: Option<String>,
}

impl MockCompletion {
    /// Backend whose reply echoes a snippet of the latest user message.
    pub fn new() -> Self {
        Self { fixed_reply: None }
    }

    /// Backend that always returns the same reply, regardless of input.
    /// Useful for scripting exact assistant output in tests.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            fixed_reply: Some(reply.into()),
        }
    }

    fn render(&self, messages: &[Message]) -> String {
        if let Some(ref fixed) = self.fixed_reply {
            return fixed.clone();
        }

        let snippet: String = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.chars().take(ECHO_CHARS).collect())
            .unwrap_or_default();

        format!(
            "You said: \"{snippet}\". This is an offline reply — no API key is \
             configured, so no language model was called. Set OPENAI_API_KEY \
             (or PARLEY_API_KEY) to get live responses."
        )
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBackend for MockCompletion {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_live(&self) -> bool {
        false
    }

    fn complete<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a> {
        let reply = self.render(messages);
        Box::pin(async move { Ok::<String, ProviderError>(reply) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_latest_user_message() {
        let mock = MockCompletion::new();
        let messages = vec![
            Message::system("rules"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second question"),
        ];
        let reply = mock.complete(&messages).await.unwrap();
        assert!(reply.contains("second question"));
        assert!(!reply.contains("\"first\""));
    }

    #[tokio::test]
    async fn deterministic_for_identical_input() {
        let mock = MockCompletion::new();
        let messages = vec![Message::user("hello")];
        let a = mock.complete(&messages).await.unwrap();
        let b = mock.complete(&messages).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn long_messages_are_truncated_in_echo() {
        let mock = MockCompletion::new();
        let long = "x".repeat(500);
        let reply = mock.complete(&[Message::user(&long)]).await.unwrap();
        assert!(!reply.contains(&long));
        assert!(reply.contains(&"x".repeat(ECHO_CHARS)));
    }

    #[tokio::test]
    async fn fixed_reply_overrides_echo() {
        let mock = MockCompletion::with_reply("Scripted answer");
        let reply = mock.complete(&[Message::user("anything")]).await.unwrap();
        assert_eq!(reply, "Scripted answer");
    }

    #[test]
    fn backend_identifies_as_offline() {
        let mock = MockCompletion::new();
        assert!(!mock.is_live());
        assert_eq!(mock.name(), "mock");
    }
}
