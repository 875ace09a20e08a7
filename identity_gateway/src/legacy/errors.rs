use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LegacyError {
    #[error("Account not found")]
    NotFound,

    #[error("Invalid or expired recovery token")]
    InvalidToken,

    #[error("Legacy API unavailable: {0}")]
    Unavailable(String),

    #[error("Legacy API error: {0}")]
    Api(String),

    #[error("Serde error: {0}")]
    Serde(String),
}

impl LegacyError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
