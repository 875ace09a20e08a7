use chrono::{DateTime, Utc};
use http::HeaderMap;

use crate::idp::EnrollmentProfile;

/// Entry-point inputs, one struct per client-visible form submission. The
/// presentation layer fills these from the request and renders whatever
/// comes back; no flow logic lives outside the gateway.

#[derive(Debug, Clone)]
pub struct SigninStart {
    pub email: String,
    /// The caller explicitly asked for password sign-in. Honored only when
    /// a password authenticator actually exists.
    pub prefer_password: bool,
    pub csrf_binding: String,
    pub csrf_token: String,
    pub client_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CredentialSubmit {
    pub flow_cookie: Option<String>,
    pub credential: String,
    pub csrf_binding: String,
    pub csrf_token: String,
    pub client_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResendRequest {
    pub flow_cookie: Option<String>,
    pub csrf_binding: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone)]
pub struct RegisterStart {
    pub profile: EnrollmentProfile,
    pub csrf_binding: String,
    pub csrf_token: String,
    pub client_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResetStart {
    pub email: String,
    pub csrf_binding: String,
    pub csrf_token: String,
    pub client_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResetComplete {
    pub recovery_token: String,
    pub new_password: String,
    pub csrf_binding: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone)]
pub struct VerifyEmailRequest {
    pub token: String,
}

/// The next thing the client should render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    PasswordChallenge {
        email: String,
    },
    PasscodeChallenge {
        email: String,
        resend_not_before: DateTime<Utc>,
    },
    /// Choose a new credential before the sign-in can finish.
    CredentialReset,
    /// "Check your email": recovery/activation/verification mail is on
    /// its way (or pretends to be, for unknown identifiers).
    RecoveryEmailSent {
        email: String,
    },
    /// Account authenticates with an external social provider.
    SocialRedirect,
    /// Terminal success; session cookies are in the headers.
    Complete,
    /// Back to the sign-in entry point, banner in `message`.
    RestartSignin,
}

/// One pass through the state machine: the next visible step plus the
/// cookie side effects and an optional user-facing banner.
#[derive(Debug)]
pub struct FlowOutcome {
    pub next: NextStep,
    pub headers: HeaderMap,
    pub message: Option<String>,
}

impl FlowOutcome {
    pub fn step(next: NextStep, headers: HeaderMap) -> Self {
        Self {
            next,
            headers,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
