//! Outbound email submission. Fire-and-forget: the gateway only waits for
//! the delivery service to accept the message, never for delivery itself.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

pub static MAILER_SUBMIT_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("MAILER_SUBMIT_URL")
        .unwrap_or_else(|_| "http://localhost:9082/messages".to_string())
});

#[derive(Debug, Error, Clone)]
pub enum MessagingError {
    #[error("Submit rejected: {0}")]
    Rejected(String),

    #[error("Delivery service unavailable: {0}")]
    Unavailable(String),
}

/// Which template goes out. The registration-conflict path picks between
/// these based on the resolved account state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    /// Activation link for accounts that never finished setup.
    Activation,
    /// Password reset link.
    PasswordReset,
    /// Email-ownership verification link.
    VerifyEmail,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Submit one message carrying `token` to `to`. Returns once the
    /// delivery service has accepted it.
    async fn send(&self, to: &str, kind: EmailKind, token: &str) -> Result<(), MessagingError>;
}

pub struct HttpMailer {
    submit_url: String,
    client: reqwest::Client,
}

impl HttpMailer {
    pub fn new() -> Self {
        Self::with_submit_url(MAILER_SUBMIT_URL.clone())
    }

    pub fn with_submit_url(submit_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create reqwest client");
        Self { submit_url, client }
    }
}

impl Default for HttpMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    to: &'a str,
    template: EmailKind,
    token: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, kind: EmailKind, token: &str) -> Result<(), MessagingError> {
        let response = self
            .client
            .post(&self.submit_url)
            .json(&SubmitRequest {
                to,
                template: kind,
                token,
            })
            .send()
            .await
            .map_err(|e| MessagingError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MessagingError::Rejected(format!(
                "delivery service returned {}",
                response.status()
            )));
        }
        tracing::debug!(?kind, "Submitted outbound message");
        Ok(())
    }
}
