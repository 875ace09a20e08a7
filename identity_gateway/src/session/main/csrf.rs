//! Per-form CSRF tokens.
//!
//! Tokens are an HMAC-SHA256 over a caller-supplied binding (page session
//! id, flow cookie value) so they need no server-side storage. The
//! orchestrator verifies before any state-machine logic runs.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::session::config::AUTH_SERVER_SECRET;
use crate::session::errors::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// External collaborator contract: mint and verify per-form tokens.
pub trait CsrfProvider: Send + Sync {
    fn issue(&self, binding: &str) -> Result<String, SessionError>;
    fn verify(&self, binding: &str, token: &str) -> Result<(), SessionError>;
}

/// Stateless HMAC implementation over the server secret.
pub struct HmacCsrfProvider;

impl HmacCsrfProvider {
    fn mac_for(binding: &str) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&AUTH_SERVER_SECRET)
            .expect("HMAC can take key of any size");
        mac.update(binding.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl CsrfProvider for HmacCsrfProvider {
    fn issue(&self, binding: &str) -> Result<String, SessionError> {
        Ok(URL_SAFE_NO_PAD.encode(Self::mac_for(binding)))
    }

    fn verify(&self, binding: &str, token: &str) -> Result<(), SessionError> {
        let presented = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| SessionError::CsrfToken("malformed token".to_string()))?;
        let expected = Self::mac_for(binding);

        if expected.ct_eq(&presented).into() {
            Ok(())
        } else {
            tracing::warn!("CSRF token mismatch");
            Err(SessionError::CsrfToken("token mismatch".to_string()))
        }
    }
}
