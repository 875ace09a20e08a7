use std::env;
use std::sync::LazyLock;

pub static FLOW_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("FLOW_COOKIE_NAME")
        .ok()
        .unwrap_or("__Host-IdFlow".to_string())
});

/// Flow cookies are short-lived: long enough to type a passcode, short
/// enough that an abandoned flow dies on its own.
pub static FLOW_COOKIE_MAX_AGE: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("FLOW_COOKIE_MAX_AGE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(900) // 15 minutes
});

pub(super) static FLOW_STATE_SECRET: LazyLock<Vec<u8>> =
    LazyLock::new(|| match env::var("FLOW_STATE_SECRET") {
        Ok(secret) => secret.into_bytes(),
        Err(_) => "default_flow_state_secret_change_in_production"
            .to_string()
            .into_bytes(),
    });
