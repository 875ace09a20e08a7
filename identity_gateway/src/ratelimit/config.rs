use std::sync::LazyLock;

/// Credential-check attempts allowed per key within one window.
pub static RATE_LIMIT_MAX_ATTEMPTS: LazyLock<u32> = LazyLock::new(|| {
    std::env::var("RATE_LIMIT_MAX_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
});

pub static RATE_LIMIT_WINDOW_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("RATE_LIMIT_WINDOW_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(60)
});
