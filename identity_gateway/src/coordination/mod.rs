//! Flow orchestration.
//!
//! `AuthGateway` drives the identity provider's multi-step protocol and
//! the legacy account API through injected clients, one state-machine pass
//! per HTTP request. Flow context between requests lives entirely in the
//! encrypted flow cookie.

mod errors;
mod register;
mod recover;
mod session_ops;
mod signin;
mod types;
mod verify;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;

use crate::flowstate::{self, FLOW_COOKIE_MAX_AGE, FLOW_COOKIE_NAME, FlowState};
use crate::idp::IdpClient;
use crate::legacy::{LegacyAccountApi, LegacyError};
use crate::messaging::Mailer;
use crate::resolver::ResolverError;
use crate::session::CsrfProvider;
use crate::utils::{header_clear_cookie, header_set_cookie};

pub use errors::GatewayError;
pub use types::{
    CredentialSubmit, FlowOutcome, NextStep, RegisterStart, ResendRequest, ResetComplete,
    ResetStart, SigninStart, VerifyEmailRequest,
};

/// The orchestrator. Holds the backing-system clients; everything else it
/// needs arrives with the request or lives in the shared cache store.
pub struct AuthGateway {
    idp: Arc<dyn IdpClient>,
    legacy: Arc<dyn LegacyAccountApi>,
    mailer: Arc<dyn Mailer>,
    csrf: Arc<dyn CsrfProvider>,
}

impl AuthGateway {
    pub fn new(
        idp: Arc<dyn IdpClient>,
        legacy: Arc<dyn LegacyAccountApi>,
        mailer: Arc<dyn Mailer>,
        csrf: Arc<dyn CsrfProvider>,
    ) -> Self {
        Self {
            idp,
            legacy,
            mailer,
            csrf,
        }
    }

    /// Hard rejection before any state-machine logic runs.
    pub(crate) fn verify_csrf(&self, binding: &str, token: &str) -> Result<(), GatewayError> {
        self.csrf
            .verify(binding, token)
            .map_err(|_| GatewayError::CsrfRejected.log())
    }
}

/// Errors whose transient class makes them eligible for the single
/// transparent retry.
pub(crate) trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for crate::idp::IdpError {
    fn is_retryable(&self) -> bool {
        crate::idp::IdpError::is_retryable(self)
    }
}

impl Retryable for LegacyError {
    fn is_retryable(&self) -> bool {
        LegacyError::is_retryable(self)
    }
}

impl Retryable for ResolverError {
    fn is_retryable(&self) -> bool {
        matches!(self, ResolverError::Unavailable(_))
    }
}

/// Run a backing-system call, retrying exactly once on transient
/// unavailability. Deterministic rejections pass through untouched.
pub(crate) async fn retry_once<T, E, F, Fut>(mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match op().await {
        Err(e) if e.is_retryable() => {
            tracing::warn!("Transient backend failure, retrying once: {e}");
            op().await
        }
        other => other,
    }
}

/// Rate-limit key: identifier plus client address, so one address cannot
/// burn an identifier's budget from afar and vice versa.
pub(crate) fn rate_key(email: &str, addr: Option<&str>) -> String {
    format!("{email}|{}", addr.unwrap_or("-"))
}

/// Headers carrying a refreshed flow cookie.
pub(crate) fn flow_state_headers(state: &FlowState) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    let opaque = flowstate::encode(state)?;
    header_set_cookie(
        &mut headers,
        FLOW_COOKIE_NAME.as_str(),
        &opaque,
        *FLOW_COOKIE_MAX_AGE as i64,
    )?;
    Ok(headers)
}

/// Headers clearing the flow cookie (terminal success, failure, restart).
pub(crate) fn clear_flow_headers() -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    header_clear_cookie(&mut headers, FLOW_COOKIE_NAME.as_str())?;
    Ok(headers)
}

/// The neutral reaction to a missing, expired or tampered flow cookie:
/// clear it and restart from the entry point.
pub(crate) fn integrity_restart() -> Result<FlowOutcome, GatewayError> {
    Ok(
        FlowOutcome::step(NextStep::RestartSignin, clear_flow_headers()?)
            .with_message(GatewayError::ClientIntegrityError.log().user_message()),
    )
}

/// Expiry for a freshly minted flow state: the transaction's own deadline,
/// capped by the cookie lifetime.
pub(crate) fn flow_expiry(remote_expires_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let cookie_deadline = now + Duration::seconds(*FLOW_COOKIE_MAX_AGE as i64);
    remote_expires_at.min(cookie_deadline)
}
