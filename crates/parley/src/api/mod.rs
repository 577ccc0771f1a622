//! Provider layer: the completion capability trait, the live
//! OpenAI-compatible client, the offline mock, and the retry policy.
//!
//! The [`CompletionBackend`] trait is the single seam between the turn
//! pipeline and the outside world. Exactly one implementation is selected at
//! agent initialization from configuration — provider choice is never
//! re-dispatched per call.
//!
//! - [`openai`] — [`OpenAiCompatClient`](openai::OpenAiCompatClient): reqwest
//!   client for any OpenAI-compatible chat-completions endpoint.
//! - [`mock`] — [`MockCompletion`](mock::MockCompletion): deterministic
//!   offline replies when no credentials are configured.
//! - [`retry`] — transient-failure backoff schedule for the live client.

pub mod mock;
pub mod openai;
pub mod retry;

// Re-export commonly used items at the module level.
pub use mock::MockCompletion;
pub use openai::OpenAiCompatClient;
pub use retry::RetryConfig;

use crate::Message;
use crate::error::ProviderError;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`CompletionBackend::complete`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<String, ProviderError>> + Send + 'a>>;

/// A chat-completion capability: an ordered message list in, one assistant
/// reply out.
pub trait CompletionBackend: Send + Sync {
    /// Short label for logs (`"openai-compat"`, `"mock"`).
    fn name(&self) -> &'static str;

    /// Whether this backend performs live network calls. The pipeline uses
    /// this to report mock replies as a credentials fallback rather than a
    /// live completion.
    fn is_live(&self) -> bool;

    /// Produce one reply for the given conversation.
    fn complete<'a>(&'a self, messages: &'a [Message]) -> CompletionFuture<'a>;
}
