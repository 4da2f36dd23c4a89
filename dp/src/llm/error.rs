//! Generation backend errors

use std::time::Duration;
use thiserror::Error;

/// Errors raised by an [`LlmClient`](super::LlmClient)
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited by provider, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unusable provider response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("unknown LLM provider '{0}' (supported: openai)")]
    UnknownProvider(String),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Whether the same request may succeed if simply sent again
    ///
    /// Rate limits are not transient here: they carry their own wait and are
    /// handled by the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 408 | 500 | 502 | 503 | 504),
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether the provider refused this particular request
    ///
    /// Oversized prompts, content filters and bodies that do not decode fail
    /// for one prompt only; the service itself is still usable.
    pub fn is_request_scoped(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(status, 400 | 413 | 422),
            Self::Transport(e) => e.is_decode(),
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}
