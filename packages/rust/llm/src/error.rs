use std::time::Duration;

/// Failure talking to a text-generation provider.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// HTTP 429 / `RESOURCE_EXHAUSTED`.
    #[error("rate limited (429): {message}")]
    RateLimited {
        message: String,
        /// Provider-suggested delay, when one was sent.
        retry_after: Option<Duration>,
    },

    /// Any other non-2xx answer.
    #[error("provider returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A 2xx answer with no text in it (safety block, empty candidate list).
    #[error("provider returned no text (reason: {})", .reason.as_deref().unwrap_or("unknown"))]
    EmptyResponse { reason: Option<String> },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A 2xx body that does not match the provider's schema.
    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl ModelError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
