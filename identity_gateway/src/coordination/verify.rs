//! Email verification from the emailed link.

use http::HeaderMap;

use crate::legacy::{LegacyError, ProfileUpdate};

use super::errors::GatewayError;
use super::types::{FlowOutcome, NextStep, VerifyEmailRequest};
use super::retry_once;

impl super::AuthGateway {
    /// Consume a verification token and set the profile's verified flag.
    /// Link clicks are GETs; there is no form to bind a CSRF token to.
    pub async fn verify_email(&self, req: &VerifyEmailRequest) -> Result<FlowOutcome, GatewayError> {
        let ticket = match retry_once(|| self.legacy.validate_recovery_token(&req.token)).await {
            Ok(ticket) => ticket,
            Err(LegacyError::InvalidToken) => {
                return Ok(FlowOutcome::step(NextStep::RestartSignin, HeaderMap::new())
                    .with_message(GatewayError::ExpiredChallenge.log().user_message()));
            }
            Err(e) => return Err(GatewayError::from(e)),
        };

        let user = retry_once(|| self.legacy.get_user(&ticket.user_id))
            .await
            .map_err(GatewayError::from)?
            .ok_or_else(|| GatewayError::Internal("account record vanished".to_string()))?;

        if !user.profile.email_verified {
            let update = ProfileUpdate {
                email_verified: Some(true),
            };
            retry_once(|| self.legacy.update_user(&user.id, &update))
                .await
                .map_err(GatewayError::from)?;
            tracing::info!("Email address verified");
        }

        Ok(FlowOutcome::step(NextStep::RestartSignin, HeaderMap::new())
            .with_message("Your email address has been verified. Please sign in"))
    }
}
