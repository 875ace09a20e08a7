//! Password reset/creation flow.
//!
//! The entry point is where most stuck accounts surface: an account with
//! no password credential cannot go through forgot-password directly, so
//! it gets exactly one reconciliation pass (placeholder credential via the
//! recovery-ticket sequence) and the request is replayed against the
//! repaired record.

use chrono::Utc;
use http::HeaderMap;

use crate::idp::{AnswerOutcome, ChallengeKind, IdpError};
use crate::legacy::LegacyError;
use crate::messaging::EmailKind;
use crate::reconcile::{self, ReconciliationResult, RepairNeed};
use crate::resolver::{self, AccountLifecycleState};

use super::errors::GatewayError;
use super::types::{FlowOutcome, NextStep, ResetComplete, ResetStart};
use super::retry_once;

const RESET_EMAIL_SENT: &str =
    "If an account exists for that email, a password reset link is on its way";

impl super::AuthGateway {
    /// Entry point for password reset (and first-time password creation
    /// for accounts that never got one).
    pub async fn reset_start(&self, req: &ResetStart) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();
        self.enforce_attempt_limit("reset", &req.email, req.client_addr.as_deref(), now)
            .await?;

        let resolution = retry_once(|| resolver::resolve(self.legacy.as_ref(), &req.email))
            .await
            .map_err(GatewayError::from)?;

        match resolution.state {
            // Same response shape as the success path; unknown identifiers
            // must be indistinguishable.
            AccountLifecycleState::NonExistent => Ok(FlowOutcome::step(
                NextStep::RecoveryEmailSent {
                    email: req.email.clone(),
                },
                HeaderMap::new(),
            )
            .with_message(RESET_EMAIL_SENT)),
            AccountLifecycleState::Social => {
                Ok(FlowOutcome::step(NextStep::SocialRedirect, HeaderMap::new()))
            }
            AccountLifecycleState::Staged
            | AccountLifecycleState::Provisioned
            | AccountLifecycleState::Active
            | AccountLifecycleState::Recovery
            | AccountLifecycleState::PasswordExpired => {
                let mut user = resolution.user.clone().ok_or_else(|| {
                    GatewayError::Internal("resolved account without record".to_string())
                })?;

                if !user.credentials.has_password {
                    match reconcile::reconcile(
                        self.legacy.as_ref(),
                        &user,
                        RepairNeed::PasswordCredential,
                    )
                    .await
                    .map_err(GatewayError::from)?
                    {
                        ReconciliationResult::Repaired(kind) => {
                            tracing::info!(?kind, "Repaired account, replaying reset request");
                            // Replay once against the fixed record.
                            let replayed = retry_once(|| {
                                resolver::resolve(self.legacy.as_ref(), &req.email)
                            })
                            .await
                            .map_err(GatewayError::from)?;
                            user = replayed.user.ok_or_else(|| {
                                GatewayError::ReconciliationFailed(
                                    "record vanished after repair".to_string(),
                                )
                            })?;
                        }
                        ReconciliationResult::NotApplicable => {}
                    }
                }

                let ticket = retry_once(|| self.legacy.forgot_password(&user.id))
                    .await
                    .map_err(GatewayError::from)?;
                self.mailer
                    .send(&user.profile.email, EmailKind::PasswordReset, &ticket.token)
                    .await
                    .map_err(GatewayError::from)?;

                Ok(FlowOutcome::step(
                    NextStep::RecoveryEmailSent {
                        email: req.email.clone(),
                    },
                    HeaderMap::new(),
                )
                .with_message(RESET_EMAIL_SENT))
            }
        }
    }

    /// Complete a reset from the emailed link: consume the recovery token,
    /// set the new password, then drive a fresh sign-in through the
    /// protocol so the user lands in a session.
    pub async fn reset_complete(&self, req: &ResetComplete) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();

        let ticket =
            match retry_once(|| self.legacy.validate_recovery_token(&req.recovery_token)).await {
                Ok(ticket) => ticket,
                // Spent or aged-out link: restart, never retry.
                Err(LegacyError::InvalidToken) => {
                    return Ok(FlowOutcome::step(NextStep::RestartSignin, HeaderMap::new())
                        .with_message(GatewayError::ExpiredChallenge.log().user_message()));
                }
                Err(e) => return Err(GatewayError::from(e)),
            };

        retry_once(|| {
            self.legacy
                .reset_password(&ticket.user_id, &ticket.token, &req.new_password)
        })
        .await
        .map_err(GatewayError::from)?;

        let user = retry_once(|| self.legacy.get_user(&ticket.user_id))
            .await
            .map_err(GatewayError::from)?
            .ok_or_else(|| GatewayError::Internal("account record vanished".to_string()))?;
        let email = user.profile.email.clone();

        let txn = retry_once(|| self.idp.interact())
            .await
            .map_err(GatewayError::from)?;
        let identified = retry_once(|| self.idp.identify(&txn.handle, &email))
            .await
            .map_err(GatewayError::from)?;
        let challenge =
            retry_once(|| self.idp.challenge(&identified.handle, ChallengeKind::Password))
                .await
                .map_err(GatewayError::from)?;

        match retry_once(|| {
            self.idp
                .answer(&challenge.handle, ChallengeKind::Password, &req.new_password)
        })
        .await
        {
            Ok(AnswerOutcome::Complete { session_token }) => {
                self.complete_signin(&email, &session_token, now).await
            }
            Ok(AnswerOutcome::ResetRequired { .. }) => {
                Err(GatewayError::Internal("provider demanded reset after reset".to_string()).log())
            }
            Err(IdpError::InvalidCredential) => {
                // The password we just set was rejected for sign-in;
                // nothing sensible the user can do differently.
                Err(GatewayError::ProviderUnavailable.log())
            }
            Err(e) => Err(GatewayError::from(e)),
        }
    }
}
