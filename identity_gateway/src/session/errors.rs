use thiserror::Error;

use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    /// Missing, unknown or expired session.
    #[error("Invalid session")]
    SessionError,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cookie error: {0}")]
    Cookie(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("CSRF error: {0}")]
    CsrfToken(String),

    #[error("Header error: {0}")]
    HeaderError(String),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
