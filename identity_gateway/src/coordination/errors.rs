//! Gateway-level error taxonomy.
//!
//! Every backing-system error is mapped into this closed set at the
//! orchestrator boundary; the `Display` strings are the user-visible
//! messages and never carry backend detail. `InvalidCredential` is
//! deliberately uniform so the response never reveals whether the
//! identifier or the credential was wrong.

use thiserror::Error;

use crate::flowstate::FlowStateError;
use crate::idp::IdpError;
use crate::legacy::LegacyError;
use crate::messaging::MessagingError;
use crate::passcode::PasscodeError;
use crate::ratelimit::RateLimitError;
use crate::reconcile::ReconcileError;
use crate::resolver::ResolverError;
use crate::session::SessionError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum GatewayError {
    /// Uniform rejection for any wrong identifier/credential combination.
    #[error("The email and password you entered don't match our records")]
    InvalidCredential,

    /// A passcode or recovery token past its validity or attempt budget.
    /// Routes to the entry point; resubmission is never valid.
    #[error("Your verification code has expired. Please sign in again to request a new one")]
    ExpiredChallenge,

    #[error("Too many attempts. Please try again later")]
    RateLimited { retry_after: chrono::Duration },

    /// A backing-system correction attempt itself failed.
    #[error("We couldn't update your account. Please try again")]
    ReconciliationFailed(String),

    /// Transient backend failure, already retried once.
    #[error("Something went wrong. Please try again")]
    ProviderUnavailable,

    /// Malformed or tampered flow-state cookie. Neutral restart, never a
    /// security error shown to the user.
    #[error("Your session has expired. Please start over")]
    ClientIntegrityError,

    /// CSRF mismatch; rejected before any flow logic runs.
    #[error("This request could not be validated. Please reload the page and try again")]
    CsrfRejected,

    #[error("Something went wrong. Please try again")]
    Internal(String),
}

impl GatewayError {
    /// Log the error and return self, allowing method chaining at the
    /// point where an error becomes an outcome.
    pub fn log(self) -> Self {
        match &self {
            Self::InvalidCredential => tracing::debug!("Credential rejected"),
            Self::ExpiredChallenge => tracing::debug!("Challenge expired"),
            Self::RateLimited { retry_after } => {
                tracing::warn!("Rate limited, retry after {}s", retry_after.num_seconds())
            }
            Self::ReconciliationFailed(detail) => {
                tracing::error!("Reconciliation failed: {detail}")
            }
            Self::ProviderUnavailable => tracing::error!("Provider unavailable"),
            Self::ClientIntegrityError => tracing::debug!("Flow state failed integrity check"),
            Self::CsrfRejected => tracing::warn!("CSRF rejected"),
            Self::Internal(detail) => tracing::error!("Internal error: {detail}"),
        }
        self
    }

    /// The message safe to render to the end user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

// Boundary conversions. Each logs the backend detail at conversion time;
// what propagates carries none of it.

impl From<IdpError> for GatewayError {
    fn from(err: IdpError) -> Self {
        tracing::error!("Identity provider error: {err}");
        match err {
            IdpError::InvalidCredential => Self::InvalidCredential,
            IdpError::InvalidToken => Self::ExpiredChallenge,
            IdpError::RateLimitedUpstream => Self::RateLimited {
                retry_after: chrono::Duration::seconds(60),
            },
            IdpError::Unavailable(_) => Self::ProviderUnavailable,
            IdpError::Conflict(detail) => Self::Internal(format!("unhandled conflict: {detail}")),
            IdpError::Protocol(detail) | IdpError::Serde(detail) => Self::Internal(detail),
        }
    }
}

impl From<LegacyError> for GatewayError {
    fn from(err: LegacyError) -> Self {
        tracing::error!("Legacy API error: {err}");
        match err {
            LegacyError::InvalidToken => Self::ExpiredChallenge,
            LegacyError::Unavailable(_) => Self::ProviderUnavailable,
            LegacyError::NotFound => Self::Internal("account record vanished".to_string()),
            LegacyError::Api(detail) | LegacyError::Serde(detail) => Self::Internal(detail),
        }
    }
}

impl From<ResolverError> for GatewayError {
    fn from(err: ResolverError) -> Self {
        tracing::error!("Resolver error: {err}");
        match err {
            ResolverError::Unavailable(_) => Self::ProviderUnavailable,
            ResolverError::Malformed(detail) | ResolverError::Backend(detail) => {
                Self::Internal(detail)
            }
        }
    }
}

impl From<PasscodeError> for GatewayError {
    fn from(err: PasscodeError) -> Self {
        match err {
            PasscodeError::Idp(idp) => idp.into(),
            PasscodeError::Storage(detail) => {
                tracing::error!("Passcode storage error: {detail}");
                Self::Internal(detail)
            }
        }
    }
}

impl From<ReconcileError> for GatewayError {
    fn from(err: ReconcileError) -> Self {
        tracing::error!("Reconcile error: {err}");
        match err {
            ReconcileError::Failed(detail) => Self::ReconciliationFailed(detail),
            ReconcileError::Unavailable(_) => Self::ProviderUnavailable,
        }
    }
}

impl From<RateLimitError> for GatewayError {
    fn from(err: RateLimitError) -> Self {
        tracing::error!("Rate limiter error: {err}");
        match err {
            RateLimitError::Storage(detail) => Self::Internal(detail),
        }
    }
}

impl From<FlowStateError> for GatewayError {
    fn from(err: FlowStateError) -> Self {
        match err {
            FlowStateError::Invalid => {
                tracing::debug!("Flow state invalid");
                Self::ClientIntegrityError
            }
            FlowStateError::Crypto(detail) => {
                tracing::error!("Flow state crypto error: {detail}");
                Self::Internal(detail)
            }
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        tracing::error!("Session error: {err}");
        match err {
            SessionError::CsrfToken(_) => Self::CsrfRejected,
            SessionError::SessionError => Self::ClientIntegrityError,
            SessionError::Storage(detail)
            | SessionError::Cookie(detail)
            | SessionError::Crypto(detail)
            | SessionError::HeaderError(detail) => Self::Internal(detail),
            SessionError::Utils(util) => Self::Internal(util.to_string()),
        }
    }
}

impl From<MessagingError> for GatewayError {
    fn from(err: MessagingError) -> Self {
        tracing::error!("Messaging error: {err}");
        Self::ProviderUnavailable
    }
}

impl From<UtilError> for GatewayError {
    fn from(err: UtilError) -> Self {
        tracing::error!("Utils error: {err}");
        Self::Internal(err.to_string())
    }
}
