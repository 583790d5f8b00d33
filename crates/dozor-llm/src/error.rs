use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM authentication failed")]
    Auth,
    #[error("LLM rate limited")]
    RateLimit { retry_after: Option<Duration> },
    #[error("LLM server error (status {status})")]
    ServerError { status: u16 },
    #[error("LLM request rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("LLM network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("LLM response had no choices")]
    EmptyChoices,
    #[error("LLM circuit breaker open")]
    CircuitOpen,
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::ServerError { .. } | Self::Network(_))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}
