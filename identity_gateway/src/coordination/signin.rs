//! Sign-in flow: Start → Identify → {ChallengePassword | ChallengeEmail}
//! → [Recover] → Complete | Failed.

use chrono::{DateTime, Duration, Utc};
use http::HeaderMap;

use crate::flowstate::{self, FLOW_COOKIE_MAX_AGE, FLOW_COOKIE_NAME, FlowState, StepContext};
use crate::idp::{AnswerOutcome, ChallengeKind, IdpError, ProtocolHandle};
use crate::messaging::EmailKind;
use crate::passcode::{self, PasscodeOutcome};
use crate::ratelimit::{
    self, RATE_LIMIT_MAX_ATTEMPTS, RATE_LIMIT_WINDOW_SECS, RateLimitDecision,
};
use crate::reconcile::{self, ReconciliationResult, RepairNeed};
use crate::resolver::{self, AccountLifecycleState};
use crate::session::create_login_session;
use crate::utils::{gen_random_string, header_clear_cookie};

use super::errors::GatewayError;
use super::types::{CredentialSubmit, FlowOutcome, NextStep, ResendRequest, SigninStart};
use super::{
    clear_flow_headers, flow_expiry, flow_state_headers, integrity_restart, rate_key, retry_once,
};

impl super::AuthGateway {
    /// Entry point: resolve the identifier and open the right challenge.
    /// Unknown identifiers get a decoy passcode challenge so the response
    /// shape never reveals whether an account exists.
    pub async fn signin_start(&self, req: &SigninStart) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();
        self.enforce_attempt_limit("signin", &req.email, req.client_addr.as_deref(), now)
            .await?;

        let resolution = retry_once(|| resolver::resolve(self.legacy.as_ref(), &req.email))
            .await
            .map_err(GatewayError::from)?;

        match resolution.state {
            AccountLifecycleState::NonExistent => self.start_decoy_challenge(&req.email, now).await,
            AccountLifecycleState::Social => {
                Ok(FlowOutcome::step(NextStep::SocialRedirect, HeaderMap::new()))
            }
            state => {
                let txn = retry_once(|| self.idp.interact())
                    .await
                    .map_err(GatewayError::from)?;
                let mut identified = retry_once(|| self.idp.identify(&txn.handle, &req.email))
                    .await
                    .map_err(GatewayError::from)?;

                if identified.authenticators.is_empty() {
                    // Corrupted record: one repair pass, then replay
                    // identify on a fresh transaction.
                    let user = resolution.user.as_ref().ok_or_else(|| {
                        GatewayError::Internal("resolved account without record".to_string())
                    })?;
                    match reconcile::reconcile(
                        self.legacy.as_ref(),
                        user,
                        RepairNeed::PasswordCredential,
                    )
                    .await
                    .map_err(GatewayError::from)?
                    {
                        ReconciliationResult::Repaired(_) => {
                            let txn = retry_once(|| self.idp.interact())
                                .await
                                .map_err(GatewayError::from)?;
                            identified =
                                retry_once(|| self.idp.identify(&txn.handle, &req.email))
                                    .await
                                    .map_err(GatewayError::from)?;
                        }
                        ReconciliationResult::NotApplicable => {
                            return Err(GatewayError::ReconciliationFailed(
                                "account exposes no authenticators".to_string(),
                            )
                            .log());
                        }
                    }
                }

                let authenticators = identified.authenticators;
                if req.prefer_password && authenticators.password {
                    self.start_password_challenge(&identified.handle, &req.email, state, now)
                        .await
                } else if authenticators.email {
                    self.start_passcode_challenge(&identified.handle, &req.email, state, false, now)
                        .await
                } else if authenticators.password {
                    self.start_password_challenge(&identified.handle, &req.email, state, now)
                        .await
                } else {
                    Err(GatewayError::ReconciliationFailed(
                        "account exposes no authenticators after repair".to_string(),
                    )
                    .log())
                }
            }
        }
    }

    /// Submit a password for an armed password challenge.
    pub async fn signin_password(&self, req: &CredentialSubmit) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();

        let Some(cookie) = req.flow_cookie.as_deref() else {
            return integrity_restart();
        };
        let Ok(state) = flowstate::decode(cookie, now) else {
            return integrity_restart();
        };
        let StepContext::PasswordChallenge { resolved } = state.step else {
            return integrity_restart();
        };

        self.enforce_attempt_limit("signin", &state.email, req.client_addr.as_deref(), now)
            .await?;

        match retry_once(|| {
            self.idp
                .answer(&state.handle, ChallengeKind::Password, &req.credential)
        })
        .await
        {
            Ok(outcome) => {
                self.finish_verified(&state.email, &state.handle, resolved, outcome, now)
                    .await
            }
            // Uniform message: wrong password and nonexistent account are
            // indistinguishable to the client.
            Err(IdpError::InvalidCredential) => Ok(FlowOutcome::step(
                NextStep::PasswordChallenge {
                    email: state.email.clone(),
                },
                HeaderMap::new(),
            )
            .with_message(GatewayError::InvalidCredential.log().user_message())),
            Err(IdpError::InvalidToken) => integrity_restart(),
            Err(e) => Err(GatewayError::from(e)),
        }
    }

    /// Submit an emailed one-time code.
    pub async fn signin_passcode(&self, req: &CredentialSubmit) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();

        let Some(cookie) = req.flow_cookie.as_deref() else {
            return integrity_restart();
        };
        let Ok(state) = flowstate::decode(cookie, now) else {
            return integrity_restart();
        };
        let StepContext::PasscodeChallenge {
            resolved,
            resend_not_before,
            registration: _,
            decoy,
        } = state.step
        else {
            return integrity_restart();
        };

        self.enforce_attempt_limit("signin", &state.email, req.client_addr.as_deref(), now)
            .await?;

        match passcode::validate(
            self.idp.as_ref(),
            &state.handle,
            &state.email,
            &req.credential,
            decoy,
        )
        .await
        {
            Ok(PasscodeOutcome::Valid(outcome)) => {
                self.finish_verified(&state.email, &state.handle, resolved, outcome, now)
                    .await
            }
            Ok(PasscodeOutcome::Incorrect { attempts_remaining }) => Ok(FlowOutcome::step(
                NextStep::PasscodeChallenge {
                    email: state.email.clone(),
                    resend_not_before,
                },
                HeaderMap::new(),
            )
            .with_message(format!(
                "That code isn't right. {attempts_remaining} attempts remaining"
            ))),
            // Terminal: back to the entry point with an explicit banner,
            // never re-showing the code entry step.
            Ok(PasscodeOutcome::Expired) => Ok(FlowOutcome::step(
                NextStep::RestartSignin,
                clear_flow_headers()?,
            )
            .with_message(GatewayError::ExpiredChallenge.log().user_message())),
            Err(e) => Err(GatewayError::from(e)),
        }
    }

    /// Submit the new credential from the forced-reset step.
    pub async fn signin_reset_credential(
        &self,
        req: &CredentialSubmit,
    ) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();

        let Some(cookie) = req.flow_cookie.as_deref() else {
            return integrity_restart();
        };
        let Ok(state) = flowstate::decode(cookie, now) else {
            return integrity_restart();
        };
        let StepContext::CredentialReset = state.step else {
            return integrity_restart();
        };

        self.enforce_attempt_limit("signin", &state.email, req.client_addr.as_deref(), now)
            .await?;

        match retry_once(|| self.idp.reset_credential(&state.handle, &req.credential)).await {
            Ok(AnswerOutcome::Complete { session_token }) => {
                self.complete_signin(&state.email, &session_token, now).await
            }
            Ok(AnswerOutcome::ResetRequired { .. }) => {
                Err(GatewayError::Internal("provider re-entered reset".to_string()).log())
            }
            Err(IdpError::InvalidCredential) => Ok(FlowOutcome::step(
                NextStep::CredentialReset,
                HeaderMap::new(),
            )
            .with_message("That password can't be used. Please choose a different one")),
            Err(IdpError::InvalidToken) => integrity_restart(),
            Err(e) => Err(GatewayError::from(e)),
        }
    }

    /// Re-send the one-time code: a brand-new challenge that invalidates
    /// the previous code, gated by the resend cooldown.
    pub async fn passcode_resend(&self, req: &ResendRequest) -> Result<FlowOutcome, GatewayError> {
        self.verify_csrf(&req.csrf_binding, &req.csrf_token)?;
        let now = Utc::now();

        let Some(cookie) = req.flow_cookie.as_deref() else {
            return integrity_restart();
        };
        let Ok(state) = flowstate::decode(cookie, now) else {
            return integrity_restart();
        };
        let StepContext::PasscodeChallenge {
            resolved,
            registration,
            decoy,
            ..
        } = state.step
        else {
            return integrity_restart();
        };

        if let Some(remaining) = passcode::resend_cooldown(&state.email, now)
            .await
            .map_err(GatewayError::from)?
        {
            return Err(GatewayError::RateLimited {
                retry_after: remaining,
            }
            .log());
        }

        let (handle, resend_not_before) = if decoy {
            let resend_not_before = passcode::issue_decoy(&state.email, now)
                .await
                .map_err(GatewayError::from)?;
            (ProtocolHandle::new(gen_random_string(24)?), resend_not_before)
        } else {
            let (challenge, resend_not_before) =
                passcode::issue(self.idp.as_ref(), &state.handle, &state.email, now)
                    .await
                    .map_err(GatewayError::from)?;
            (challenge.handle, resend_not_before)
        };

        let refreshed = FlowState {
            handle,
            handle_expires_at: state.handle_expires_at,
            email: state.email.clone(),
            step: StepContext::PasscodeChallenge {
                resolved,
                resend_not_before,
                registration,
                decoy,
            },
        };

        Ok(FlowOutcome::step(
            NextStep::PasscodeChallenge {
                email: state.email,
                resend_not_before,
            },
            flow_state_headers(&refreshed)?,
        )
        .with_message("We sent you a new code"))
    }

    pub(super) async fn enforce_attempt_limit(
        &self,
        scope: &str,
        email: &str,
        addr: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let key = rate_key(email, addr);
        let window = Duration::seconds(*RATE_LIMIT_WINDOW_SECS as i64);
        match ratelimit::check_and_increment(scope, &key, *RATE_LIMIT_MAX_ATTEMPTS, window, now)
            .await?
        {
            RateLimitDecision::Allowed => Ok(()),
            RateLimitDecision::Limited { retry_after } => {
                Err(GatewayError::RateLimited { retry_after }.log())
            }
        }
    }

    pub(super) async fn start_password_challenge(
        &self,
        handle: &ProtocolHandle,
        email: &str,
        resolved: AccountLifecycleState,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        let challenge = retry_once(|| self.idp.challenge(handle, ChallengeKind::Password))
            .await
            .map_err(GatewayError::from)?;

        let state = FlowState {
            handle: challenge.handle,
            handle_expires_at: flow_expiry(challenge.expires_at, now),
            email: email.to_string(),
            step: StepContext::PasswordChallenge { resolved },
        };

        Ok(FlowOutcome::step(
            NextStep::PasswordChallenge {
                email: email.to_string(),
            },
            flow_state_headers(&state)?,
        ))
    }

    pub(super) async fn start_passcode_challenge(
        &self,
        handle: &ProtocolHandle,
        email: &str,
        resolved: AccountLifecycleState,
        registration: bool,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        let (challenge, resend_not_before) =
            passcode::issue(self.idp.as_ref(), handle, email, now)
                .await
                .map_err(GatewayError::from)?;

        let state = FlowState {
            handle: challenge.handle,
            handle_expires_at: flow_expiry(challenge.expires_at, now),
            email: email.to_string(),
            step: StepContext::PasscodeChallenge {
                resolved,
                resend_not_before,
                registration,
                decoy: false,
            },
        };

        Ok(FlowOutcome::step(
            NextStep::PasscodeChallenge {
                email: email.to_string(),
                resend_not_before,
            },
            flow_state_headers(&state)?,
        ))
    }

    /// Same externally visible shape as a real passcode challenge, with no
    /// account and no remote transaction behind it.
    async fn start_decoy_challenge(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        let resend_not_before = passcode::issue_decoy(email, now)
            .await
            .map_err(GatewayError::from)?;

        let state = FlowState {
            handle: ProtocolHandle::new(gen_random_string(24)?),
            handle_expires_at: now + Duration::seconds(*FLOW_COOKIE_MAX_AGE as i64),
            email: email.to_string(),
            step: StepContext::PasscodeChallenge {
                resolved: AccountLifecycleState::NonExistent,
                resend_not_before,
                registration: false,
                decoy: true,
            },
        };

        Ok(FlowOutcome::step(
            NextStep::PasscodeChallenge {
                email: email.to_string(),
                resend_not_before,
            },
            flow_state_headers(&state)?,
        ))
    }

    /// After a successful password or passcode verification: either the
    /// flow completes, or the account must change its credential first.
    pub(super) async fn finish_verified(
        &self,
        email: &str,
        handle: &ProtocolHandle,
        resolved: AccountLifecycleState,
        outcome: AnswerOutcome,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        match outcome {
            AnswerOutcome::ResetRequired { handle } => {
                self.enter_credential_reset(email, &handle, now).await
            }
            AnswerOutcome::Complete { session_token } => match resolved {
                // The gateway mandates a reset for these even when the
                // provider would complete.
                AccountLifecycleState::PasswordExpired | AccountLifecycleState::Recovery => {
                    self.enter_credential_reset(email, handle, now).await
                }
                AccountLifecycleState::NonExistent
                | AccountLifecycleState::Staged
                | AccountLifecycleState::Provisioned
                | AccountLifecycleState::Active
                | AccountLifecycleState::Social => {
                    self.complete_signin(email, &session_token, now).await
                }
            },
        }
    }

    async fn enter_credential_reset(
        &self,
        email: &str,
        handle: &ProtocolHandle,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        let recovery = retry_once(|| self.idp.recover(handle))
            .await
            .map_err(GatewayError::from)?;

        let state = FlowState {
            handle: recovery.handle,
            handle_expires_at: flow_expiry(recovery.expires_at, now),
            email: email.to_string(),
            step: StepContext::CredentialReset,
        };

        Ok(FlowOutcome::step(
            NextStep::CredentialReset,
            flow_state_headers(&state)?,
        ))
    }

    /// Terminal success: verified-flag gate, session cookies, flow cookie
    /// cleared.
    pub(super) async fn complete_signin(
        &self,
        email: &str,
        session_token: &str,
        now: DateTime<Utc>,
    ) -> Result<FlowOutcome, GatewayError> {
        let user = retry_once(|| self.legacy.get_user(email))
            .await
            .map_err(GatewayError::from)?;

        if let Some(user) = user {
            if !user.profile.email_verified {
                match reconcile::reconcile(self.legacy.as_ref(), &user, RepairNeed::EmailVerified)
                    .await
                    .map_err(GatewayError::from)?
                {
                    ReconciliationResult::Repaired(kind) => {
                        tracing::info!(?kind, "Repaired record during completion");
                    }
                    ReconciliationResult::NotApplicable => {
                        // Genuinely unverified: completion waits on a
                        // verification link.
                        let ticket = retry_once(|| self.legacy.forgot_password(&user.id))
                            .await
                            .map_err(GatewayError::from)?;
                        self.mailer
                            .send(email, EmailKind::VerifyEmail, &ticket.token)
                            .await
                            .map_err(GatewayError::from)?;
                        return Ok(FlowOutcome::step(
                            NextStep::RecoveryEmailSent {
                                email: email.to_string(),
                            },
                            clear_flow_headers()?,
                        )
                        .with_message(
                            "Please verify your email address. We just sent you a link",
                        ));
                    }
                }
            }
        }

        let set = create_login_session(email, session_token, now)
            .await
            .map_err(GatewayError::from)?;
        let mut headers = set.to_headers().map_err(GatewayError::from)?;
        header_clear_cookie(&mut headers, FLOW_COOKIE_NAME.as_str())?;

        Ok(FlowOutcome::step(NextStep::Complete, headers))
    }
}
