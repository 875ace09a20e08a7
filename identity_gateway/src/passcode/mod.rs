//! One-time passcode management.
//!
//! Code generation and delivery belong to the identity provider; this
//! module owns the local view of the challenge: the attempt counter, the
//! resend cooldown, and the terminal-on-exhaustion rule. Decoy challenges
//! (for identifiers with no account) go through the same accounting so the
//! flow is externally indistinguishable.

mod config;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::idp::{AnswerOutcome, ChallengeKind, ChallengeState, IdpClient, IdpError, ProtocolHandle};
use crate::storage::{CacheData, GENERIC_CACHE_STORE};

pub use config::{PASSCODE_MAX_ATTEMPTS, PASSCODE_RESEND_COOLDOWN_SECS, PASSCODE_TTL_SECS};

const ATTEMPTS_PREFIX: &str = "passcode_attempts";
const COOLDOWN_PREFIX: &str = "passcode_cooldown";

#[derive(Debug, Error, Clone)]
pub enum PasscodeError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider error: {0}")]
    Idp(IdpError),
}

impl From<IdpError> for PasscodeError {
    fn from(err: IdpError) -> Self {
        Self::Idp(err)
    }
}

/// Result of a passcode submission.
#[derive(Debug, Clone)]
pub enum PasscodeOutcome {
    Valid(AnswerOutcome),
    Incorrect { attempts_remaining: u32 },
    /// Terminal: the code aged out or the attempt budget is spent. The only
    /// valid user action is restarting from the sign-in entry point.
    Expired,
}

#[derive(Debug, Serialize, Deserialize)]
struct AttemptRecord {
    count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct CooldownRecord {
    not_before: DateTime<Utc>,
}

/// Arm a new email-passcode challenge: delegate delivery to the provider,
/// reset the attempt counter and start the resend cooldown.
pub async fn issue(
    idp: &dyn IdpClient,
    handle: &ProtocolHandle,
    email: &str,
    now: DateTime<Utc>,
) -> Result<(ChallengeState, DateTime<Utc>), PasscodeError> {
    let challenge = idp.challenge(handle, ChallengeKind::EmailPasscode).await?;
    let not_before = arm_local_state(email, now).await?;
    Ok((challenge, not_before))
}

/// Arm the local half of a decoy challenge (no provider call, nothing is
/// actually sent). The caller fabricates the protocol handle.
pub async fn issue_decoy(email: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, PasscodeError> {
    arm_local_state(email, now).await
}

/// Remaining resend cooldown for this identifier, if any.
pub async fn resend_cooldown(
    email: &str,
    now: DateTime<Utc>,
) -> Result<Option<Duration>, PasscodeError> {
    let store = GENERIC_CACHE_STORE.lock().await;
    let record = store
        .get(COOLDOWN_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?
        .and_then(|data| serde_json::from_str::<CooldownRecord>(&data.value).ok());

    Ok(record
        .filter(|r| r.not_before > now)
        .map(|r| r.not_before - now))
}

/// Validate a submitted code against the provider, tracking attempts
/// locally. `decoy` challenges skip the provider and always count as
/// incorrect.
pub async fn validate(
    idp: &dyn IdpClient,
    handle: &ProtocolHandle,
    email: &str,
    code: &str,
    decoy: bool,
) -> Result<PasscodeOutcome, PasscodeError> {
    let max = *PASSCODE_MAX_ATTEMPTS;

    // A spent challenge stays terminal; a late correct code must not revive it.
    if attempt_count(email).await? >= max {
        tracing::debug!("Passcode challenge already exhausted");
        return Ok(PasscodeOutcome::Expired);
    }

    let answer = if decoy {
        Err(IdpError::InvalidCredential)
    } else {
        idp.answer(handle, ChallengeKind::EmailPasscode, code).await
    };

    match answer {
        Ok(outcome) => {
            clear(email).await?;
            Ok(PasscodeOutcome::Valid(outcome))
        }
        Err(IdpError::InvalidCredential) => {
            let count = record_failure(email).await?;
            if count >= max {
                tracing::warn!("Passcode attempts exhausted ({count}/{max})");
                Ok(PasscodeOutcome::Expired)
            } else {
                Ok(PasscodeOutcome::Incorrect {
                    attempts_remaining: max - count,
                })
            }
        }
        Err(IdpError::InvalidToken) => {
            tracing::debug!("Passcode challenge expired upstream");
            Ok(PasscodeOutcome::Expired)
        }
        Err(e) => Err(PasscodeError::Idp(e)),
    }
}

async fn arm_local_state(email: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, PasscodeError> {
    let not_before = now + Duration::seconds(*PASSCODE_RESEND_COOLDOWN_SECS as i64);
    let cooldown = CooldownRecord { not_before };
    let value =
        serde_json::to_string(&cooldown).map_err(|e| PasscodeError::Storage(e.to_string()))?;

    let mut store = GENERIC_CACHE_STORE.lock().await;
    store
        .remove(ATTEMPTS_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    store
        .put_with_ttl(
            COOLDOWN_PREFIX,
            email,
            CacheData { value },
            *PASSCODE_RESEND_COOLDOWN_SECS as usize,
        )
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    Ok(not_before)
}

async fn attempt_count(email: &str) -> Result<u32, PasscodeError> {
    let store = GENERIC_CACHE_STORE.lock().await;
    let record = store
        .get(ATTEMPTS_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?
        .and_then(|data| serde_json::from_str::<AttemptRecord>(&data.value).ok());
    Ok(record.map(|r| r.count).unwrap_or(0))
}

async fn record_failure(email: &str) -> Result<u32, PasscodeError> {
    // Read-modify-write under one lock guard; overlapping submissions for
    // the same identifier each land exactly one increment.
    let mut store = GENERIC_CACHE_STORE.lock().await;
    let record = store
        .get(ATTEMPTS_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?
        .and_then(|data| serde_json::from_str::<AttemptRecord>(&data.value).ok());

    let count = record.map(|r| r.count).unwrap_or(0) + 1;
    let value = serde_json::to_string(&AttemptRecord { count })
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    store
        .put_with_ttl(
            ATTEMPTS_PREFIX,
            email,
            CacheData { value },
            *PASSCODE_TTL_SECS as usize,
        )
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    Ok(count)
}

async fn clear(email: &str) -> Result<(), PasscodeError> {
    let mut store = GENERIC_CACHE_STORE.lock().await;
    store
        .remove(ATTEMPTS_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    store
        .remove(COOLDOWN_PREFIX, email)
        .await
        .map_err(|e| PasscodeError::Storage(e.to_string()))?;
    Ok(())
}
