use std::sync::LazyLock;

pub static IDP_BASE_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("IDP_BASE_URL").unwrap_or_else(|_| "http://localhost:9080/idp/v1".to_string())
});

pub static IDP_REQUEST_TIMEOUT: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("IDP_REQUEST_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10) // seconds; a timed-out call is treated as unavailability
});
