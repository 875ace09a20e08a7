use std::sync::LazyLock;

pub static LEGACY_API_BASE_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("LEGACY_API_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:9081/api/v1".to_string())
});

pub static LEGACY_API_REQUEST_TIMEOUT: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("LEGACY_API_REQUEST_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
});
