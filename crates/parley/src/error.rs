//! Error types for the agent runtime.
//!
//! The taxonomy mirrors how failures actually surface: validation errors
//! reject a turn before anything is stored, provider errors are recovered
//! inside the pipeline (the caller sees a fallback reply, never the error),
//! and catalog errors only occur while loading persona files at startup.

use thiserror::Error;

/// Rejection of a turn's input. Raised synchronously before the session
/// store is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty or whitespace-only")]
    EmptyMessage,

    #[error("message length {len} exceeds the configured maximum of {max} characters")]
    MessageTooLong { len: usize, max: usize },

    #[error("session id is empty or whitespace-only")]
    EmptySessionId,

    #[error("session id length {len} exceeds the maximum of {max} characters")]
    SessionIdTooLong { len: usize, max: usize },
}

/// Failure while talking to a completion provider.
///
/// These never propagate out of a turn — the model-invocation stage converts
/// them into a fallback reply — but they are kept precise so retry policy and
/// fallback reporting can distinguish the cases.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request to completion provider timed out")]
    Timeout,

    #[error("completion provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to reach completion provider: {0}")]
    Transport(String),

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned an empty completion")]
    Empty,

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed. Rate limits, server errors,
    /// and transport-level failures are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Transport(_) => true,
            ProviderError::Status { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}

/// Failure while loading or validating a persona catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read persona catalog at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse persona catalog at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("catalog declares fallback persona `{0}` but does not define it")]
    MissingFallback(String),

    #[error("catalog defines no personas")]
    Empty,
}

/// Errors surfaced by [`ChatAgent`](crate::agent::chat::ChatAgent) operations.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent is not initialized; call initialize() before chat()")]
    NotInitialized,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to initialize completion backend: {0}")]
    Init(#[source] ProviderError),

    #[error("failed to load persona catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Timeout.is_transient());
        assert!(
            ProviderError::Status {
                status: 429,
                body: "rate limited".into()
            }
            .is_transient()
        );
        assert!(
            ProviderError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(ProviderError::Transport("connection reset".into()).is_transient());
    }

    #[test]
    fn permanent_classification() {
        assert!(
            !ProviderError::Status {
                status: 400,
                body: "bad request".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::Status {
                status: 401,
                body: "unauthorized".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::Malformed("truncated json".into()).is_transient());
        assert!(!ProviderError::Empty.is_transient());
    }

    #[test]
    fn validation_error_messages_name_the_limit() {
        let err = ValidationError::MessageTooLong { len: 12, max: 10 };
        let text = err.to_string();
        assert!(text.contains("12"));
        assert!(text.contains("10"));
    }

    #[test]
    fn agent_error_wraps_validation() {
        let err: AgentError = ValidationError::EmptyMessage.into();
        assert!(matches!(err, AgentError::Validation(_)));
    }
}
