use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw status field of a legacy account record. The resolver maps this,
/// together with the credential indicators, into `AccountLifecycleState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegacyStatus {
    Staged,
    Provisioned,
    Active,
    Recovery,
    PasswordExpired,
}

/// Where the account's credential lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialProvider {
    /// Credential held by the backing systems themselves.
    Internal,
    /// Account authenticates through an external social provider.
    Social,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyCredentials {
    /// Presence indicator only; the credential itself never crosses this API.
    pub has_password: bool,
    pub provider: CredentialProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyProfile {
    pub email: String,
    pub email_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyUser {
    pub id: String,
    pub status: LegacyStatus,
    pub profile: LegacyProfile,
    pub credentials: LegacyCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

/// One-time ticket minted by forgot-password and consumed by recovery-token
/// validation and password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryTicket {
    pub user_id: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Partial profile update; only set fields are written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}
