use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resolver::AuthenticatorSet;

/// Opaque handle threading one remote protocol transaction through its
/// steps. Each response yields the handle required by the next request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolHandle(String);

impl ProtocolHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Which authenticator a challenge targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeKind {
    Password,
    EmailPasscode,
}

/// Result of `interact` + `introspect`: a live transaction.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub handle: ProtocolHandle,
    pub expires_at: DateTime<Utc>,
}

/// Result of `identify`: the account's available authenticators as the
/// provider exposes them for this transaction.
#[derive(Debug, Clone)]
pub struct IdentifyOutcome {
    pub handle: ProtocolHandle,
    pub authenticators: AuthenticatorSet,
}

#[derive(Debug, Clone)]
pub struct ChallengeState {
    pub handle: ProtocolHandle,
    pub kind: ChallengeKind,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful `answer` call.
#[derive(Debug, Clone)]
pub enum AnswerOutcome {
    /// Terminal protocol success: the provider minted a session token.
    Complete { session_token: String },
    /// Verified, but the account must change its credential before the
    /// transaction can complete.
    ResetRequired { handle: ProtocolHandle },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentProfile {
    pub email: String,
    pub given_name: String,
    pub family_name: String,
}

#[derive(Debug, Clone)]
pub struct EnrollmentStarted {
    pub handle: ProtocolHandle,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RecoveryStarted {
    pub handle: ProtocolHandle,
    pub expires_at: DateTime<Utc>,
}
