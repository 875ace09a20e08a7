use thiserror::Error;

/// Coded errors surfaced by the identity-provider protocol.
///
/// `InvalidCredential` and `InvalidToken` are deterministic rejections the
/// orchestrator never retries; `Unavailable` is the only transient class.
#[derive(Debug, Error, Clone)]
pub enum IdpError {
    #[error("Invalid credential")]
    InvalidCredential,

    #[error("Invalid or expired protocol token")]
    InvalidToken,

    #[error("Identifier conflict: {0}")]
    Conflict(String),

    #[error("Rate limited by provider")]
    RateLimitedUpstream,

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serde error: {0}")]
    Serde(String),
}

impl IdpError {
    /// Only transient unavailability is eligible for the orchestrator's
    /// single transparent retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
