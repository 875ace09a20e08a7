use serde::{Deserialize, Serialize};

/// Opaque value stored in the generic cache store. Everything the gateway
/// shares between requests (rate-limit buckets, passcode counters, resend
/// cooldowns, sessions) serializes itself into this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
}
