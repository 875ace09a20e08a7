//! Encrypted flow-state cookie codec.
//!
//! The orchestrator is stateless between HTTP requests; the whole of a
//! flow's intermediate context rides in a client-held cookie sealed with
//! AES-256-GCM. Decoding fails closed: corruption, tampering or expiry all
//! collapse into `FlowStateError::Invalid` and the caller restarts the
//! flow from its entry point.

mod config;
mod types;

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, NONCE_LEN, Nonce, UnboundKey};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::utils::{base64url_decode, base64url_encode, gen_random_bytes};

pub use config::{FLOW_COOKIE_MAX_AGE, FLOW_COOKIE_NAME};
pub use types::{FlowState, StepContext};

use config::FLOW_STATE_SECRET;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowStateError {
    /// Any decode failure: bad encoding, failed authentication, or expiry.
    /// Deliberately carries no detail; the only valid reaction is a
    /// neutral restart.
    #[error("Invalid flow state")]
    Invalid,

    #[error("Crypto error: {0}")]
    Crypto(String),
}

static FLOW_STATE_KEY: LazyLock<LessSafeKey> = LazyLock::new(|| {
    let key_bytes = Sha256::digest(FLOW_STATE_SECRET.as_slice());
    let unbound = UnboundKey::new(&AES_256_GCM, key_bytes.as_slice())
        .expect("SHA-256 digest is a valid AES-256 key");
    LessSafeKey::new(unbound)
});

/// Seal a flow state into an opaque cookie value: `base64url(nonce || ciphertext || tag)`.
pub fn encode(state: &FlowState) -> Result<String, FlowStateError> {
    let plaintext =
        serde_json::to_vec(state).map_err(|e| FlowStateError::Crypto(e.to_string()))?;

    let nonce_bytes =
        gen_random_bytes(NONCE_LEN).map_err(|e| FlowStateError::Crypto(e.to_string()))?;
    let nonce = Nonce::try_assume_unique_for_key(&nonce_bytes)
        .map_err(|_| FlowStateError::Crypto("bad nonce length".to_string()))?;

    let mut in_out = plaintext;
    FLOW_STATE_KEY
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| FlowStateError::Crypto("seal failed".to_string()))?;

    let mut sealed = nonce_bytes;
    sealed.extend_from_slice(&in_out);
    Ok(base64url_encode(sealed))
}

/// Open an opaque cookie value back into a flow state. Fails closed.
pub fn decode(opaque: &str, now: DateTime<Utc>) -> Result<FlowState, FlowStateError> {
    let sealed = base64url_decode(opaque).map_err(|_| FlowStateError::Invalid)?;
    if sealed.len() <= NONCE_LEN + AES_256_GCM.tag_len() {
        return Err(FlowStateError::Invalid);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let nonce =
        Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| FlowStateError::Invalid)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = FLOW_STATE_KEY
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| FlowStateError::Invalid)?;

    let state: FlowState =
        serde_json::from_slice(plaintext).map_err(|_| FlowStateError::Invalid)?;

    if state.handle_expires_at <= now {
        tracing::debug!("Flow state expired at {}", state.handle_expires_at);
        return Err(FlowStateError::Invalid);
    }

    Ok(state)
}
