//! Account status resolution: maps a raw legacy account record into the
//! closed lifecycle-state enum every flow branch dispatches on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::legacy::{CredentialProvider, LegacyAccountApi, LegacyError, LegacyUser};

/// Closed set of account lifecycle states. Derived per resolution call,
/// never stored; every orchestrator branch matches all seven values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountLifecycleState {
    NonExistent,
    Staged,
    Provisioned,
    Active,
    Recovery,
    PasswordExpired,
    Social,
}

/// Which authenticators an account can answer with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatorSet {
    pub email: bool,
    pub password: bool,
}

impl AuthenticatorSet {
    pub fn none() -> Self {
        Self::default()
    }

    /// An active account with neither authenticator is a corrupted record;
    /// the reconciler owns that case.
    pub fn is_empty(&self) -> bool {
        !self.email && !self.password
    }
}

#[derive(Debug, Error, Clone)]
pub enum ResolverError {
    #[error("Malformed account record: {0}")]
    Malformed(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Resolution failed: {0}")]
    Backend(String),
}

impl From<LegacyError> for ResolverError {
    fn from(err: LegacyError) -> Self {
        match err {
            LegacyError::Unavailable(msg) => Self::Unavailable(msg),
            other => Self::Backend(other.to_string()),
        }
    }
}

/// Everything a single resolution call yields. The record rides along so
/// the orchestrator does not have to re-fetch it for reconciliation.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub state: AccountLifecycleState,
    pub authenticators: AuthenticatorSet,
    pub user: Option<LegacyUser>,
}

impl Resolution {
    fn absent() -> Self {
        Self {
            state: AccountLifecycleState::NonExistent,
            authenticators: AuthenticatorSet::none(),
            user: None,
        }
    }
}

/// Resolve an identifier to exactly one lifecycle state plus the account's
/// authenticator set.
pub async fn resolve(
    legacy: &dyn LegacyAccountApi,
    identifier: &str,
) -> Result<Resolution, ResolverError> {
    let Some(user) = legacy.get_user(identifier).await? else {
        tracing::debug!("No account record for identifier");
        return Ok(Resolution::absent());
    };

    let state = state_of(&user)?;
    let authenticators = authenticators_of(&user);
    tracing::debug!(?state, ?authenticators, "Resolved account state");

    Ok(Resolution {
        state,
        authenticators,
        user: Some(user),
    })
}

fn state_of(user: &LegacyUser) -> Result<AccountLifecycleState, ResolverError> {
    if user.id.is_empty() || user.profile.email.is_empty() {
        return Err(ResolverError::Malformed(
            "record missing id or primary email".to_string(),
        ));
    }

    if user.credentials.provider == CredentialProvider::Social {
        return Ok(AccountLifecycleState::Social);
    }

    use crate::legacy::LegacyStatus::*;
    Ok(match user.status {
        Staged => AccountLifecycleState::Staged,
        Provisioned => AccountLifecycleState::Provisioned,
        Active => AccountLifecycleState::Active,
        Recovery => AccountLifecycleState::Recovery,
        PasswordExpired => AccountLifecycleState::PasswordExpired,
    })
}

fn authenticators_of(user: &LegacyUser) -> AuthenticatorSet {
    AuthenticatorSet {
        email: !user.profile.email.is_empty(),
        password: user.credentials.has_password,
    }
}
