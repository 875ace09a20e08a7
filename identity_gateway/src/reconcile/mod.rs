//! Self-healing for accounts stuck in inconsistent intermediate states.
//!
//! Real accounts land in shapes the main flow cannot progress from: a
//! password-based step against an account with no password credential, or
//! a verification flag left false after the requirement was satisfied
//! through a side channel. One corrective pass against the legacy API puts
//! the record back into a shape the uniform flow handles; the caller then
//! replays the original request. At most one pass per request; the
//! orchestrator owns that guarantee.

use std::sync::LazyLock;

use thiserror::Error;

use crate::legacy::{LegacyAccountApi, LegacyError, LegacyUser, ProfileUpdate};
use crate::utils::gen_random_string;

/// Cohort whose membership implies the email-verified requirement was
/// already satisfied.
pub static VERIFIED_GROUP_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("VERIFIED_GROUP_NAME").unwrap_or_else(|_| "email-verified".to_string())
});

#[derive(Debug, Error, Clone)]
pub enum ReconcileError {
    /// The corrective call itself failed; never silently swallowed.
    #[error("Reconciliation failed: {0}")]
    Failed(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl From<LegacyError> for ReconcileError {
    fn from(err: LegacyError) -> Self {
        match err {
            LegacyError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Failed(other.to_string()),
        }
    }
}

/// What the calling flow step needs the account to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairNeed {
    /// The next step requires a password credential to exist.
    PasswordCredential,
    /// The next step requires the profile's verified flag to be truthful.
    EmailVerified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationResult {
    /// The record was corrected; replay the original request.
    Repaired(RepairKind),
    /// Nothing detectably wrong for this need; pass through unchanged.
    NotApplicable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    PlaceholderCredential,
    VerifiedFlagSync,
}

/// Run one reconciliation pass for `need` against `user`'s record.
pub async fn reconcile(
    legacy: &dyn LegacyAccountApi,
    user: &LegacyUser,
    need: RepairNeed,
) -> Result<ReconciliationResult, ReconcileError> {
    match need {
        RepairNeed::PasswordCredential => ensure_password_credential(legacy, user).await,
        RepairNeed::EmailVerified => sync_verified_flag(legacy, user).await,
    }
}

/// Issue a provider-side placeholder credential so password-based steps can
/// proceed: forgot-password mints a recovery ticket, the ticket is
/// validated, and the placeholder lands through the regular reset call.
async fn ensure_password_credential(
    legacy: &dyn LegacyAccountApi,
    user: &LegacyUser,
) -> Result<ReconciliationResult, ReconcileError> {
    if user.credentials.has_password {
        return Ok(ReconciliationResult::NotApplicable);
    }

    tracing::info!("Repairing account without password credential");

    let ticket = legacy.forgot_password(&user.id).await?;
    let validated = legacy.validate_recovery_token(&ticket.token).await?;
    if validated.user_id != user.id {
        return Err(ReconcileError::Failed(
            "recovery ticket resolved to a different account".to_string(),
        ));
    }

    let placeholder =
        gen_random_string(24).map_err(|e| ReconcileError::Failed(e.to_string()))?;
    legacy
        .reset_password(&user.id, &validated.token, &placeholder)
        .await?;

    Ok(ReconciliationResult::Repaired(
        RepairKind::PlaceholderCredential,
    ))
}

/// Bring the explicit verified flag in line with verified-cohort
/// membership granted through a side channel.
async fn sync_verified_flag(
    legacy: &dyn LegacyAccountApi,
    user: &LegacyUser,
) -> Result<ReconciliationResult, ReconcileError> {
    if user.profile.email_verified {
        return Ok(ReconciliationResult::NotApplicable);
    }

    let groups = legacy.get_user_groups(&user.id).await?;
    if !groups.iter().any(|g| g.name == *VERIFIED_GROUP_NAME) {
        return Ok(ReconciliationResult::NotApplicable);
    }

    tracing::info!("Syncing stale verified flag from cohort membership");
    legacy
        .update_user(
            &user.id,
            &ProfileUpdate {
                email_verified: Some(true),
            },
        )
        .await?;

    Ok(ReconciliationResult::Repaired(RepairKind::VerifiedFlagSync))
}
