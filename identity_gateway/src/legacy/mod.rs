//! Client for the legacy account API consulted alongside the identity
//! provider.

mod client;
mod config;
mod errors;
mod types;

pub use client::{HttpLegacyClient, LegacyAccountApi};
pub use errors::LegacyError;
pub use types::{
    CredentialProvider, Group, LegacyCredentials, LegacyProfile, LegacyStatus, LegacyUser,
    ProfileUpdate, RecoveryTicket,
};
