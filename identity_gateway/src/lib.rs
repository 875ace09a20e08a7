//! identity-gateway - Consumer identity gateway coordination library
//!
//! This crate mediates between end users and two backing identity systems
//! (a multi-step identity-provider protocol and a legacy account API) to
//! implement sign-in, registration, password reset/creation and email
//! verification behind a single consistent flow, regardless of which
//! lifecycle state an account is actually in.

mod coordination;
mod flowstate;
mod idp;
mod legacy;
mod messaging;
mod passcode;
mod ratelimit;
mod reconcile;
mod resolver;
mod session;
mod storage;
#[cfg(test)]
mod test_utils;
mod utils;

// The orchestrator and its step contracts
pub use coordination::{
    AuthGateway, CredentialSubmit, FlowOutcome, GatewayError, NextStep, RegisterStart,
    ResendRequest, ResetComplete, ResetStart, SigninStart, VerifyEmailRequest,
};

// Backing-system client contracts (inject real clients or test fakes)
pub use idp::{
    AnswerOutcome, ChallengeKind, ChallengeState, EnrollmentProfile, EnrollmentStarted,
    HttpIdpClient, IdentifyOutcome, IdpClient, IdpError, ProtocolHandle, RecoveryStarted,
    Transaction,
};
pub use legacy::{
    CredentialProvider, Group, HttpLegacyClient, LegacyAccountApi, LegacyCredentials, LegacyError,
    LegacyProfile, LegacyStatus, LegacyUser, ProfileUpdate, RecoveryTicket,
};
pub use messaging::{EmailKind, HttpMailer, Mailer, MessagingError};
pub use session::{CsrfProvider, HmacCsrfProvider};

// Account state model
pub use resolver::{AccountLifecycleState, AuthenticatorSet, Resolution};

// Cookie contracts
pub use flowstate::{FLOW_COOKIE_MAX_AGE, FLOW_COOKIE_NAME};
pub use session::{
    LAST_ACCESS_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_MAX_AGE,
    SESSION_COOKIE_NAME, SessionCookie, SessionCookieSet, SessionError, create_login_session,
    is_authenticated, prepare_logout_response, refresh_session_set,
};

/// Initialize the gateway's shared storage. Call once at startup.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    storage::GENERIC_CACHE_STORE
        .lock()
        .await
        .init()
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
