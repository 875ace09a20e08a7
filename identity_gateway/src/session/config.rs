use std::env;
use std::sync::LazyLock;

pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("__Host-GatewaySession".to_string())
});

/// Primary session lifetime. Sessions are persistent (weeks) and
/// refreshable; the flow cookie is the short-lived one.
pub static SESSION_COOKIE_MAX_AGE: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_MAX_AGE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1_209_600) // 14 days
});

pub static LEGACY_SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("LEGACY_SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("legacy_sid".to_string())
});

pub static LAST_ACCESS_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("LAST_ACCESS_COOKIE_NAME")
        .ok()
        .unwrap_or("last_access".to_string())
});

pub(super) static AUTH_SERVER_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match env::var("AUTH_SERVER_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => "default_secret_key_change_in_production"
            .to_string()
            .into_bytes(),
    });
