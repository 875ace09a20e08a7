//! Shared test initialization.

use std::sync::Once;

/// Ensure every test sees the same environment: `.env_test` (falling back
/// to `.env`) loaded once, and the in-memory cache store selected before
/// anything touches `GENERIC_CACHE_STORE`.
pub async fn init_test_environment() {
    static ENV_INIT: Once = Once::new();
    ENV_INIT.call_once(|| {
        if dotenvy::from_filename(".env_test").is_err() {
            dotenvy::dotenv().ok();
        }
        // Unit tests never talk to redis.
        unsafe {
            std::env::set_var("GENERIC_CACHE_STORE_TYPE", "memory");
        }
    });

    crate::storage::GENERIC_CACHE_STORE
        .lock()
        .await
        .init()
        .await
        .expect("cache store init");
}
