use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::resolver::AuthenticatorSet;

use super::config::{IDP_BASE_URL, IDP_REQUEST_TIMEOUT};
use super::errors::IdpError;
use super::types::{
    AnswerOutcome, ChallengeKind, ChallengeState, EnrollmentProfile, EnrollmentStarted,
    IdentifyOutcome, ProtocolHandle, RecoveryStarted, Transaction,
};

/// The multi-step identity-provider protocol, one method per remote step.
///
/// Implementations are injected into the orchestrator; tests substitute
/// fakes returning canned sequences.
#[async_trait]
pub trait IdpClient: Send + Sync {
    /// Begin an interaction and introspect it into a live transaction.
    async fn interact(&self) -> Result<Transaction, IdpError>;

    /// Re-read the state of an existing transaction.
    async fn introspect(&self, handle: &ProtocolHandle) -> Result<Transaction, IdpError>;

    /// Present an identifier; the response exposes the authenticators the
    /// account can answer with.
    async fn identify(
        &self,
        handle: &ProtocolHandle,
        identifier: &str,
    ) -> Result<IdentifyOutcome, IdpError>;

    /// Ask the provider to arm a challenge (for email passcodes this also
    /// triggers the outbound code delivery).
    async fn challenge(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
    ) -> Result<ChallengeState, IdpError>;

    /// Submit a credential or passcode for an armed challenge.
    async fn answer(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
        answer: &str,
    ) -> Result<AnswerOutcome, IdpError>;

    /// Enroll a new account. Fails with `IdpError::Conflict` when the
    /// identifier already exists.
    async fn enroll(
        &self,
        handle: &ProtocolHandle,
        profile: &EnrollmentProfile,
    ) -> Result<EnrollmentStarted, IdpError>;

    /// Enter credential recovery for the identified account.
    async fn recover(&self, handle: &ProtocolHandle) -> Result<RecoveryStarted, IdpError>;

    /// Set a new credential from within a recovery transaction.
    async fn reset_credential(
        &self,
        handle: &ProtocolHandle,
        new_password: &str,
    ) -> Result<AnswerOutcome, IdpError>;
}

/// `IdpClient` over HTTP.
pub struct HttpIdpClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpIdpClient {
    pub fn new() -> Self {
        Self::with_base_url(IDP_BASE_URL.clone())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let parsed = url::Url::parse(&base_url).expect("Invalid IDP base URL");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(*IDP_REQUEST_TIMEOUT))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create reqwest client");
        Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, IdpError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    IdpError::Unavailable(e.to_string())
                } else {
                    IdpError::Protocol(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Resp>()
                .await
                .map_err(|e| IdpError::Serde(e.to_string()));
        }

        let error_body = response.json::<ErrorWire>().await.unwrap_or_default();
        Err(map_protocol_error(status, error_body))
    }
}

impl Default for HttpIdpClient {
    fn default() -> Self {
        Self::new()
    }
}

fn map_protocol_error(status: http::StatusCode, body: ErrorWire) -> IdpError {
    if status.as_u16() == 429 {
        return IdpError::RateLimitedUpstream;
    }
    if status.is_server_error() {
        return IdpError::Unavailable(format!("provider returned {status}"));
    }
    match body.error_code.as_str() {
        "invalid_credential" => IdpError::InvalidCredential,
        "invalid_token" | "expired_token" => IdpError::InvalidToken,
        "conflict" | "identifier_exists" => {
            IdpError::Conflict(body.message.unwrap_or_else(|| "identifier exists".to_string()))
        }
        code => IdpError::Protocol(format!(
            "{status}: {code} {}",
            body.message.unwrap_or_default()
        )),
    }
}

fn challenge_authenticator(kind: ChallengeKind) -> &'static str {
    match kind {
        ChallengeKind::Password => "password",
        ChallengeKind::EmailPasscode => "email",
    }
}

// Wire shapes. The protocol threads a state handle through every request;
// responses carry the handle to use next.

#[derive(Serialize)]
struct Empty {}

#[derive(Deserialize)]
struct InteractWire {
    interaction_handle: String,
}

#[derive(Serialize)]
struct IntrospectRequest<'a> {
    interaction_handle: &'a str,
}

#[derive(Deserialize)]
struct TransactionWire {
    state_handle: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct IdentifyRequest<'a> {
    state_handle: &'a str,
    identifier: &'a str,
}

#[derive(Deserialize)]
struct IdentifyWire {
    state_handle: String,
    authenticators: Vec<String>,
}

#[derive(Serialize)]
struct ChallengeRequest<'a> {
    state_handle: &'a str,
    authenticator: &'a str,
}

#[derive(Deserialize)]
struct ChallengeWire {
    state_handle: String,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct AnswerRequest<'a> {
    state_handle: &'a str,
    authenticator: &'a str,
    answer: &'a str,
}

#[derive(Deserialize)]
struct AnswerWire {
    status: String,
    session_token: Option<String>,
    state_handle: Option<String>,
}

#[derive(Serialize)]
struct EnrollRequest<'a> {
    state_handle: &'a str,
    profile: &'a EnrollmentProfile,
}

#[derive(Serialize)]
struct RecoverRequest<'a> {
    state_handle: &'a str,
}

#[derive(Serialize)]
struct ResetCredentialRequest<'a> {
    state_handle: &'a str,
    new_password: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorWire {
    #[serde(default)]
    error_code: String,
    message: Option<String>,
}

fn answer_outcome_from_wire(wire: AnswerWire) -> Result<AnswerOutcome, IdpError> {
    match wire.status.as_str() {
        "complete" => {
            let session_token = wire
                .session_token
                .ok_or_else(|| IdpError::Protocol("complete without session token".to_string()))?;
            Ok(AnswerOutcome::Complete { session_token })
        }
        "reset_required" => {
            let handle = wire
                .state_handle
                .ok_or_else(|| IdpError::Protocol("reset_required without handle".to_string()))?;
            Ok(AnswerOutcome::ResetRequired {
                handle: ProtocolHandle::new(handle),
            })
        }
        other => Err(IdpError::Protocol(format!("unexpected answer status: {other}"))),
    }
}

#[async_trait]
impl IdpClient for HttpIdpClient {
    async fn interact(&self) -> Result<Transaction, IdpError> {
        let interact: InteractWire = self.post_json("/interact", &Empty {}).await?;
        let wire: TransactionWire = self
            .post_json(
                "/introspect",
                &IntrospectRequest {
                    interaction_handle: &interact.interaction_handle,
                },
            )
            .await?;
        Ok(Transaction {
            handle: ProtocolHandle::new(wire.state_handle),
            expires_at: wire.expires_at,
        })
    }

    async fn introspect(&self, handle: &ProtocolHandle) -> Result<Transaction, IdpError> {
        let wire: TransactionWire = self
            .post_json(
                "/introspect",
                &IntrospectRequest {
                    interaction_handle: handle.as_str(),
                },
            )
            .await?;
        Ok(Transaction {
            handle: ProtocolHandle::new(wire.state_handle),
            expires_at: wire.expires_at,
        })
    }

    async fn identify(
        &self,
        handle: &ProtocolHandle,
        identifier: &str,
    ) -> Result<IdentifyOutcome, IdpError> {
        let wire: IdentifyWire = self
            .post_json(
                "/identify",
                &IdentifyRequest {
                    state_handle: handle.as_str(),
                    identifier,
                },
            )
            .await?;

        let authenticators = AuthenticatorSet {
            email: wire.authenticators.iter().any(|a| a == "email"),
            password: wire.authenticators.iter().any(|a| a == "password"),
        };
        Ok(IdentifyOutcome {
            handle: ProtocolHandle::new(wire.state_handle),
            authenticators,
        })
    }

    async fn challenge(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
    ) -> Result<ChallengeState, IdpError> {
        let wire: ChallengeWire = self
            .post_json(
                "/challenge",
                &ChallengeRequest {
                    state_handle: handle.as_str(),
                    authenticator: challenge_authenticator(kind),
                },
            )
            .await?;
        Ok(ChallengeState {
            handle: ProtocolHandle::new(wire.state_handle),
            kind,
            expires_at: wire.expires_at,
        })
    }

    async fn answer(
        &self,
        handle: &ProtocolHandle,
        kind: ChallengeKind,
        answer: &str,
    ) -> Result<AnswerOutcome, IdpError> {
        let wire: AnswerWire = self
            .post_json(
                "/challenge/answer",
                &AnswerRequest {
                    state_handle: handle.as_str(),
                    authenticator: challenge_authenticator(kind),
                    answer,
                },
            )
            .await?;
        answer_outcome_from_wire(wire)
    }

    async fn enroll(
        &self,
        handle: &ProtocolHandle,
        profile: &EnrollmentProfile,
    ) -> Result<EnrollmentStarted, IdpError> {
        let wire: ChallengeWire = self
            .post_json(
                "/enroll",
                &EnrollRequest {
                    state_handle: handle.as_str(),
                    profile,
                },
            )
            .await?;
        Ok(EnrollmentStarted {
            handle: ProtocolHandle::new(wire.state_handle),
            expires_at: wire.expires_at,
        })
    }

    async fn recover(&self, handle: &ProtocolHandle) -> Result<RecoveryStarted, IdpError> {
        let wire: ChallengeWire = self
            .post_json(
                "/recover",
                &RecoverRequest {
                    state_handle: handle.as_str(),
                },
            )
            .await?;
        Ok(RecoveryStarted {
            handle: ProtocolHandle::new(wire.state_handle),
            expires_at: wire.expires_at,
        })
    }

    async fn reset_credential(
        &self,
        handle: &ProtocolHandle,
        new_password: &str,
    ) -> Result<AnswerOutcome, IdpError> {
        let wire: AnswerWire = self
            .post_json(
                "/recover/answer",
                &ResetCredentialRequest {
                    state_handle: handle.as_str(),
                    new_password,
                },
            )
            .await?;
        answer_outcome_from_wire(wire)
    }
}
