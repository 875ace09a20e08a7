use chrono::{DateTime, Duration, Utc};
use headers::Cookie;
use http::header::{COOKIE, HeaderMap};

use crate::session::config::{
    LAST_ACCESS_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_MAX_AGE,
    SESSION_COOKIE_NAME,
};
use crate::session::errors::SessionError;
use crate::session::types::{SessionCookie, SessionCookieSet, StoredSession};
use crate::storage::GENERIC_CACHE_STORE;
use crate::utils::{gen_random_string, header_clear_cookie};

const SESSION_PREFIX: &str = "session";

/// Mint the full cookie set for a fresh login and persist the session.
#[tracing::instrument(skip(provider_session_token))]
pub async fn create_login_session(
    email: &str,
    provider_session_token: &str,
    now: DateTime<Utc>,
) -> Result<SessionCookieSet, SessionError> {
    let session_id = gen_random_string(32)?;
    let csrf_token = gen_random_string(32)?;
    let max_age = *SESSION_COOKIE_MAX_AGE as i64;
    let expires_at = now + Duration::seconds(max_age);

    let stored = StoredSession {
        email: email.to_string(),
        provider_session_token: provider_session_token.to_string(),
        csrf_token,
        expires_at,
        ttl: *SESSION_COOKIE_MAX_AGE,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            SESSION_PREFIX,
            &session_id,
            stored.into(),
            *SESSION_COOKIE_MAX_AGE as usize,
        )
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?;

    Ok(SessionCookieSet {
        primary: SessionCookie {
            name: SESSION_COOKIE_NAME.clone(),
            value: session_id,
            expires_at,
            max_age,
        },
        legacy: vec![SessionCookie {
            name: LEGACY_SESSION_COOKIE_NAME.clone(),
            value: provider_session_token.to_string(),
            expires_at,
            max_age,
        }],
        last_access: SessionCookie {
            name: LAST_ACCESS_COOKIE_NAME.clone(),
            value: now.timestamp().to_string(),
            expires_at,
            max_age,
        },
    })
}

/// Result of a session-id rotation.
pub(crate) struct RotatedSession {
    pub(crate) session_id: String,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) provider_session_token: String,
}

/// Rotate a session id: validate the current one, persist the same session
/// under a fresh id with a pushed-out expiry, drop the old entry.
pub(crate) async fn rotate_session(
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<RotatedSession, SessionError> {
    let mut store = GENERIC_CACHE_STORE.lock().await;

    let stored: StoredSession = store
        .get(SESSION_PREFIX, session_id)
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?
        .ok_or(SessionError::SessionError)?
        .try_into()?;

    if stored.expires_at < now {
        tracing::debug!("Session expired at {}", stored.expires_at);
        return Err(SessionError::SessionError);
    }

    let new_session_id = gen_random_string(32)?;
    let new_expires_at = now + Duration::seconds(*SESSION_COOKIE_MAX_AGE as i64);
    let provider_session_token = stored.provider_session_token.clone();
    let renewed = StoredSession {
        expires_at: new_expires_at,
        ..stored
    };

    store
        .put_with_ttl(
            SESSION_PREFIX,
            &new_session_id,
            renewed.into(),
            *SESSION_COOKIE_MAX_AGE as usize,
        )
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?;
    store
        .remove(SESSION_PREFIX, session_id)
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?;

    Ok(RotatedSession {
        session_id: new_session_id,
        expires_at: new_expires_at,
        provider_session_token,
    })
}

/// Refresh an existing cookie set: new primary value with a strictly later
/// expiry, legacy cookies reissued, last-access untouched.
pub async fn refresh_session_set(
    set: &SessionCookieSet,
    now: DateTime<Utc>,
) -> Result<SessionCookieSet, SessionError> {
    let rotated = rotate_session(&set.primary.value, now).await?;
    let max_age = *SESSION_COOKIE_MAX_AGE as i64;

    Ok(SessionCookieSet {
        primary: SessionCookie {
            name: set.primary.name.clone(),
            value: rotated.session_id,
            expires_at: rotated.expires_at,
            max_age,
        },
        legacy: set
            .legacy
            .iter()
            .map(|cookie| SessionCookie {
                name: cookie.name.clone(),
                value: cookie.value.clone(),
                expires_at: rotated.expires_at,
                max_age,
            })
            .collect(),
        last_access: set.last_access.clone(),
    })
}

/// Prepare a logout response: expire the session cookies on the client and
/// delete the stored session.
#[tracing::instrument(skip(cookies))]
pub async fn prepare_logout_response(cookies: Cookie) -> Result<HeaderMap, SessionError> {
    let mut headers = HeaderMap::new();
    header_clear_cookie(&mut headers, SESSION_COOKIE_NAME.as_str())?;
    header_clear_cookie(&mut headers, LEGACY_SESSION_COOKIE_NAME.as_str())?;
    header_clear_cookie(&mut headers, LAST_ACCESS_COOKIE_NAME.as_str())?;

    if let Some(session_id) = cookies.get(SESSION_COOKIE_NAME.as_str()) {
        GENERIC_CACHE_STORE
            .lock()
            .await
            .remove(SESSION_PREFIX, session_id)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?;
    }
    Ok(headers)
}

/// Is there a live session behind these headers?
pub async fn is_authenticated(headers: &HeaderMap, now: DateTime<Utc>) -> Result<bool, SessionError> {
    let Some(session_id) = get_session_id_from_headers(headers)? else {
        return Ok(false);
    };

    let stored = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(SESSION_PREFIX, session_id)
        .await
        .map_err(|e| SessionError::Storage(e.to_string()))?;

    let Some(data) = stored else {
        return Ok(false);
    };
    let stored: StoredSession = match data.try_into() {
        Ok(session) => session,
        Err(_) => return Ok(false),
    };

    Ok(stored.expires_at >= now)
}

pub(crate) fn get_session_id_from_headers(
    headers: &HeaderMap,
) -> Result<Option<&str>, SessionError> {
    let Some(cookie_header) = headers.get(COOKIE) else {
        tracing::debug!("No cookie header found");
        return Ok(None);
    };

    let cookie_str = cookie_header.to_str().map_err(|e| {
        tracing::error!("Invalid cookie header: {}", e);
        SessionError::HeaderError("Invalid cookie header".to_string())
    })?;

    let cookie_name = SESSION_COOKIE_NAME.as_str();
    let session_id = cookie_str.split(';').map(|s| s.trim()).find_map(|s| {
        let mut parts = s.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if k == cookie_name => Some(v),
            _ => None,
        }
    });

    Ok(session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;

    #[tokio::test]
    async fn test_create_login_session_shape() {
        init_test_environment().await;
        let now = Utc::now();
        let set = create_login_session("user@example.com", "provider-tok", now)
            .await
            .unwrap();

        assert_eq!(set.primary.name, *SESSION_COOKIE_NAME);
        assert_eq!(set.primary.max_age, *SESSION_COOKIE_MAX_AGE as i64);
        assert_eq!(set.legacy.len(), 1);
        assert_eq!(set.legacy[0].value, "provider-tok");
        assert_eq!(set.last_access.value, now.timestamp().to_string());
    }

    #[tokio::test]
    async fn test_refresh_rotates_primary_and_preserves_last_access() {
        init_test_environment().await;
        let now = Utc::now();
        let set = create_login_session("refresh@example.com", "provider-tok", now)
            .await
            .unwrap();

        let later = now + Duration::seconds(3600);
        let refreshed = refresh_session_set(&set, later).await.unwrap();

        // Primary: new value, strictly later expiry.
        assert_ne!(refreshed.primary.value, set.primary.value);
        assert!(refreshed.primary.expires_at > set.primary.expires_at);

        // Legacy compat cookies: same value, later expiry.
        assert_eq!(refreshed.legacy[0].value, set.legacy[0].value);
        assert!(refreshed.legacy[0].expires_at > set.legacy[0].expires_at);

        // Last-access: byte-identical value and expiry.
        assert_eq!(refreshed.last_access, set.last_access);
    }

    #[tokio::test]
    async fn test_refresh_invalidates_old_session_id() {
        init_test_environment().await;
        let now = Utc::now();
        let set = create_login_session("rotate@example.com", "provider-tok", now)
            .await
            .unwrap();

        let later = now + Duration::seconds(60);
        let _refreshed = refresh_session_set(&set, later).await.unwrap();

        // The old id no longer refreshes.
        assert!(matches!(
            refresh_session_set(&set, later + Duration::seconds(60)).await,
            Err(SessionError::SessionError)
        ));
    }

    #[tokio::test]
    async fn test_refresh_unknown_session_fails() {
        init_test_environment().await;
        let now = Utc::now();
        let set = SessionCookieSet {
            primary: SessionCookie {
                name: SESSION_COOKIE_NAME.clone(),
                value: "no-such-session".to_string(),
                expires_at: now,
                max_age: 60,
            },
            legacy: vec![],
            last_access: SessionCookie {
                name: LAST_ACCESS_COOKIE_NAME.clone(),
                value: "0".to_string(),
                expires_at: now,
                max_age: 60,
            },
        };
        assert!(matches!(
            refresh_session_set(&set, now).await,
            Err(SessionError::SessionError)
        ));
    }

    #[tokio::test]
    async fn test_refresh_headers_omit_last_access() {
        init_test_environment().await;
        let now = Utc::now();
        let set = create_login_session("headers@example.com", "provider-tok", now)
            .await
            .unwrap();

        let login_headers = set.to_headers().unwrap();
        let login_cookies: Vec<_> = login_headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(login_cookies.iter().any(|c| c.starts_with(LAST_ACCESS_COOKIE_NAME.as_str())));

        let refreshed = refresh_session_set(&set, now + Duration::seconds(1))
            .await
            .unwrap();
        let refresh_headers = refreshed.to_refresh_headers().unwrap();
        let refresh_cookies: Vec<_> = refresh_headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(
            !refresh_cookies
                .iter()
                .any(|c| c.starts_with(LAST_ACCESS_COOKIE_NAME.as_str()))
        );
    }

    #[tokio::test]
    async fn test_logout_clears_cookies_and_store() {
        init_test_environment().await;
        let now = Utc::now();
        let set = create_login_session("logout@example.com", "provider-tok", now)
            .await
            .unwrap();

        let mut request_headers = HeaderMap::new();
        request_headers.insert(
            COOKIE,
            format!("{}={}", *SESSION_COOKIE_NAME, set.primary.value)
                .parse()
                .unwrap(),
        );
        assert!(is_authenticated(&request_headers, now).await.unwrap());

        let cookie = cookie_from_headers(&request_headers);
        let headers = prepare_logout_response(cookie).await.unwrap();
        assert!(headers.get_all(http::header::SET_COOKIE).iter().count() >= 3);

        assert!(!is_authenticated(&request_headers, now).await.unwrap());
    }

    fn cookie_from_headers(headers: &HeaderMap) -> Cookie {
        use headers::HeaderMapExt;
        headers.typed_get::<Cookie>().expect("cookie header")
    }
}
