use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::config::{LEGACY_API_BASE_URL, LEGACY_API_REQUEST_TIMEOUT};
use super::errors::LegacyError;
use super::types::{Group, LegacyUser, ProfileUpdate, RecoveryTicket};

/// The legacy account API, keyed by account identifier.
#[async_trait]
pub trait LegacyAccountApi: Send + Sync {
    /// Look an account up by login identifier (email). Absent accounts are
    /// `Ok(None)`, not an error; the resolver needs the distinction.
    async fn get_user(&self, identifier: &str) -> Result<Option<LegacyUser>, LegacyError>;

    async fn update_user(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<LegacyUser, LegacyError>;

    /// Start the forgot-password sequence; mints a recovery ticket.
    async fn forgot_password(&self, user_id: &str) -> Result<RecoveryTicket, LegacyError>;

    /// Consume a recovery ticket and set a new password.
    async fn reset_password(
        &self,
        user_id: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), LegacyError>;

    /// Validate a recovery token and learn which account it belongs to.
    async fn validate_recovery_token(&self, token: &str) -> Result<RecoveryTicket, LegacyError>;

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LegacyError>;
}

pub struct HttpLegacyClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpLegacyClient {
    pub fn new() -> Self {
        Self::with_base_url(LEGACY_API_BASE_URL.clone())
    }

    pub fn with_base_url(base_url: String) -> Self {
        let parsed = url::Url::parse(&base_url).expect("Invalid legacy API base URL");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(*LEGACY_API_REQUEST_TIMEOUT))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("Failed to create reqwest client");
        Self {
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn map_transport(e: reqwest::Error) -> LegacyError {
        if e.is_timeout() || e.is_connect() {
            LegacyError::Unavailable(e.to_string())
        } else {
            LegacyError::Api(e.to_string())
        }
    }

    fn map_status(status: http::StatusCode) -> LegacyError {
        if status.is_server_error() {
            LegacyError::Unavailable(format!("legacy API returned {status}"))
        } else if status == http::StatusCode::NOT_FOUND {
            LegacyError::NotFound
        } else {
            LegacyError::Api(format!("legacy API returned {status}"))
        }
    }
}

impl Default for HttpLegacyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    new_password: &'a str,
}

#[derive(Serialize)]
struct VerifyTokenRequest<'a> {
    token: &'a str,
}

#[async_trait]
impl LegacyAccountApi for HttpLegacyClient {
    async fn get_user(&self, identifier: &str) -> Result<Option<LegacyUser>, LegacyError> {
        let url = format!("{}/users/{identifier}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::map_transport)?;

        if response.status() == http::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        let user = response
            .json::<LegacyUser>()
            .await
            .map_err(|e| LegacyError::Serde(e.to_string()))?;
        Ok(Some(user))
    }

    async fn update_user(
        &self,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> Result<LegacyUser, LegacyError> {
        let url = format!("{}/users/{user_id}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(update)
            .send()
            .await
            .map_err(Self::map_transport)?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response
            .json::<LegacyUser>()
            .await
            .map_err(|e| LegacyError::Serde(e.to_string()))
    }

    async fn forgot_password(&self, user_id: &str) -> Result<RecoveryTicket, LegacyError> {
        let url = format!("{}/users/{user_id}/credentials/forgot_password", self.base_url);
        let response = self.client.post(&url).send().await.map_err(Self::map_transport)?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response
            .json::<RecoveryTicket>()
            .await
            .map_err(|e| LegacyError::Serde(e.to_string()))
    }

    async fn reset_password(
        &self,
        user_id: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), LegacyError> {
        let url = format!("{}/users/{user_id}/credentials/reset_password", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ResetPasswordRequest { token, new_password })
            .send()
            .await
            .map_err(Self::map_transport)?;

        if response.status() == http::StatusCode::FORBIDDEN {
            return Err(LegacyError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        Ok(())
    }

    async fn validate_recovery_token(&self, token: &str) -> Result<RecoveryTicket, LegacyError> {
        let url = format!("{}/recovery/token/verify", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&VerifyTokenRequest { token })
            .send()
            .await
            .map_err(Self::map_transport)?;

        if response.status() == http::StatusCode::FORBIDDEN
            || response.status() == http::StatusCode::NOT_FOUND
        {
            return Err(LegacyError::InvalidToken);
        }
        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response
            .json::<RecoveryTicket>()
            .await
            .map_err(|e| LegacyError::Serde(e.to_string()))
    }

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LegacyError> {
        let url = format!("{}/users/{user_id}/groups", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::map_transport)?;

        if !response.status().is_success() {
            return Err(Self::map_status(response.status()));
        }
        response
            .json::<Vec<Group>>()
            .await
            .map_err(|e| LegacyError::Serde(e.to_string()))
    }
}
