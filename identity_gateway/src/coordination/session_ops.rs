//! Session refresh and logout.

use chrono::Utc;
use http::HeaderMap;

use crate::session::{
    LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME,
    get_session_id_from_headers, prepare_logout_response, rotate_session,
};
use crate::utils::header_set_cookie;

use super::errors::GatewayError;
use super::types::{FlowOutcome, NextStep};

impl super::AuthGateway {
    /// Refresh a live session: the primary cookie is rotated to a new
    /// value with a strictly later expiry and the legacy compat cookie is
    /// reissued. The last-access cookie is deliberately left alone so its
    /// value and expiry survive the refresh byte-for-byte.
    pub async fn refresh_session(&self, headers: &HeaderMap) -> Result<FlowOutcome, GatewayError> {
        let now = Utc::now();

        let session_id = get_session_id_from_headers(headers)
            .map_err(GatewayError::from)?
            .ok_or_else(|| GatewayError::ClientIntegrityError.log())?;

        let rotated = rotate_session(session_id, now)
            .await
            .map_err(GatewayError::from)?;

        let max_age = *SESSION_COOKIE_MAX_AGE as i64;
        let mut out = HeaderMap::new();
        header_set_cookie(
            &mut out,
            SESSION_COOKIE_NAME.as_str(),
            &rotated.session_id,
            max_age,
        )?;
        header_set_cookie(
            &mut out,
            LEGACY_SESSION_COOKIE_NAME.as_str(),
            &rotated.provider_session_token,
            max_age,
        )?;

        Ok(FlowOutcome::step(NextStep::Complete, out))
    }

    /// Clear the session cookies and drop the stored session.
    pub async fn logout(&self, cookies: headers::Cookie) -> Result<FlowOutcome, GatewayError> {
        let headers = prepare_logout_response(cookies)
            .await
            .map_err(GatewayError::from)?;
        Ok(FlowOutcome::step(NextStep::RestartSignin, headers)
            .with_message("You have been signed out"))
    }
}
