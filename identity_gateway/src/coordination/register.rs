//! Registration flow: EnrollNew, with the conflict path that switches an
//! "already exists" enrollment over to the existing-account recovery
//! variants instead of failing.

use chrono::Utc;
use http::HeaderMap;

use crate::idp::IdpError;
use crate::legacy::LegacyUser;
use crate::messaging::EmailKind;
use crate::resolver::{self, AccountLifecycleState, Resolution};

use super::errors::GatewayError;
use super::types::{FlowOutcome, NextStep, RegisterStart};
use super::retry_once;

impl super::AuthGateway {
    /// Entry point for new-account registration. A remote conflict
    /// mid-enrollment re-enters the existing-account path rather than
    /// surfacing an error.
    pub async fn register_start(&self, req: &RegisterStart) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();
        let email = req.profile.email.as_str();
        self.enforce_attempt_limit("register", email, req.client_addr.as_deref(), now)
            .await?;

        let resolution = retry_once(|| resolver::resolve(self.legacy.as_ref(), email))
            .await
            .map_err(GatewayError::from)?;

        match resolution.state {
            AccountLifecycleState::NonExistent => {
                let txn = retry_once(|| self.idp.interact())
                    .await
                    .map_err(GatewayError::from)?;
                match retry_once(|| self.idp.enroll(&txn.handle, &req.profile)).await {
                    Ok(enrolled) => {
                        // Verify email ownership before the account completes.
                        self.start_passcode_challenge(
                            &enrolled.handle,
                            email,
                            AccountLifecycleState::NonExistent,
                            true,
                            now,
                        )
                        .await
                    }
                    Err(IdpError::Conflict(detail)) => {
                        tracing::info!(
                            "Enrollment conflict ({detail}); switching to existing-account path"
                        );
                        // The record predates or beat our enrollment;
                        // resolve it and recover instead.
                        let resolution =
                            retry_once(|| resolver::resolve(self.legacy.as_ref(), email))
                                .await
                                .map_err(GatewayError::from)?;
                        self.existing_account_recovery(&resolution).await
                    }
                    Err(e) => Err(GatewayError::from(e)),
                }
            }
            _ => self.existing_account_recovery(&resolution).await,
        }
    }

    /// Registration against an identifier that already has an account:
    /// issue the recovery email variant the account's state calls for.
    async fn existing_account_recovery(
        &self,
        resolution: &Resolution,
    ) -> Result<FlowOutcome, GatewayError> {
        match resolution.state {
            // Conflict reported remotely but the record is not visible to
            // us yet; nothing sensible to recover against.
            AccountLifecycleState::NonExistent => Err(GatewayError::ProviderUnavailable.log()),
            AccountLifecycleState::Social => {
                Ok(FlowOutcome::step(NextStep::SocialRedirect, HeaderMap::new()))
            }
            AccountLifecycleState::Staged | AccountLifecycleState::Provisioned => {
                let user = require_record(resolution)?;
                self.send_recovery_email(
                    user,
                    EmailKind::Activation,
                    "You already started setting up this account. We sent you a new activation link",
                )
                .await
            }
            AccountLifecycleState::Recovery | AccountLifecycleState::PasswordExpired => {
                let user = require_record(resolution)?;
                self.send_recovery_email(
                    user,
                    EmailKind::PasswordReset,
                    "An account with this email already exists. We sent you a password reset link",
                )
                .await
            }
            AccountLifecycleState::Active => {
                let user = require_record(resolution)?;
                if user.profile.email_verified {
                    Ok(FlowOutcome::step(NextStep::RestartSignin, HeaderMap::new())
                        .with_message(
                            "An account with this email already exists. Please sign in",
                        ))
                } else {
                    self.send_recovery_email(
                        user,
                        EmailKind::VerifyEmail,
                        "An account with this email already exists. We sent you a new verification link",
                    )
                    .await
                }
            }
        }
    }

    async fn send_recovery_email(
        &self,
        user: &LegacyUser,
        kind: EmailKind,
        message: &str,
    ) -> Result<FlowOutcome, GatewayError> {
        let ticket = retry_once(|| self.legacy.forgot_password(&user.id))
            .await
            .map_err(GatewayError::from)?;
        self.mailer
            .send(&user.profile.email, kind, &ticket.token)
            .await
            .map_err(GatewayError::from)?;

        Ok(FlowOutcome::step(
            NextStep::RecoveryEmailSent {
                email: user.profile.email.clone(),
            },
            HeaderMap::new(),
        )
        .with_message(message))
    }
}

fn require_record(resolution: &Resolution) -> Result<&LegacyUser, GatewayError> {
    resolution
        .user
        .as_ref()
        .ok_or_else(|| GatewayError::Internal("resolved account without record".to_string()).log())
}
