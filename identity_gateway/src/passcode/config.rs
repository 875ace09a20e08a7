use std::sync::LazyLock;

/// Incorrect submissions before a challenge becomes terminal. Policy
/// value; product owns the real number.
pub static PASSCODE_MAX_ATTEMPTS: LazyLock<u32> = LazyLock::new(|| {
    std::env::var("PASSCODE_MAX_ATTEMPTS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5)
});

pub static PASSCODE_RESEND_COOLDOWN_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("PASSCODE_RESEND_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30)
});

/// Lifetime of the attempt counter; matches the code's own validity.
pub static PASSCODE_TTL_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("PASSCODE_TTL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(300)
});

#[cfg(test)]
mod tests {
    #[test]
    fn test_parse_passcode_policy_values() {
        let parse = |raw: Option<&str>, default: u32| -> u32 {
            raw.and_then(|s| s.parse().ok()).unwrap_or(default)
        };
        assert_eq!(parse(None, 5), 5);
        assert_eq!(parse(Some("3"), 5), 3);
        assert_eq!(parse(Some("many"), 5), 5);
    }
}
