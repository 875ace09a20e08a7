//! Client for the identity provider's multi-step protocol
//! (interact → introspect → identify → challenge → answer → enroll → recover).

mod client;
mod config;
mod errors;
mod types;

pub use client::{HttpIdpClient, IdpClient};
pub use errors::IdpError;
pub use types::{
    AnswerOutcome, ChallengeKind, ChallengeState, EnrollmentProfile, EnrollmentStarted,
    IdentifyOutcome, ProtocolHandle, RecoveryStarted, Transaction,
};
