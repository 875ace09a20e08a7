use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::idp::ProtocolHandle;
use crate::resolver::AccountLifecycleState;

/// Ephemeral multi-step flow context, owned entirely by the client as an
/// encrypted cookie. The server never persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    /// Handle for the in-flight remote protocol transaction.
    pub handle: ProtocolHandle,
    /// When the remote transaction (and thus this token) stops being usable.
    pub handle_expires_at: DateTime<Utc>,
    /// Identifier collected so far.
    pub email: String,
    pub step: StepContext,
}

/// Which client-visible step the flow is parked on, plus the context that
/// step needs on resubmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepContext {
    PasswordChallenge {
        resolved: AccountLifecycleState,
    },
    PasscodeChallenge {
        resolved: AccountLifecycleState,
        resend_not_before: DateTime<Utc>,
        /// Passcode entered from the registration flow verifies a new
        /// account instead of signing in an existing one.
        registration: bool,
        /// Fabricated challenge for a nonexistent account; exists only to
        /// keep the flow shape identical and always ends incorrect.
        decoy: bool,
    },
    /// Verified, now forced to choose a new credential before completion.
    CredentialReset,
}
