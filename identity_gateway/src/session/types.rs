use chrono::{DateTime, Utc};
use http::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::session::errors::SessionError;
use crate::storage::CacheData;
use crate::utils::header_set_cookie;

/// One Set-Cookie worth of session state, kept structured so refresh
/// invariants (value and expiry) are assertable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub max_age: i64,
}

/// The bundle issued at terminal flow success: the refreshable primary
/// cookie, legacy compatibility cookies, and the last-access cookie that a
/// refresh must never touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookieSet {
    pub primary: SessionCookie,
    pub legacy: Vec<SessionCookie>,
    pub last_access: SessionCookie,
}

impl SessionCookieSet {
    /// Headers for a fresh login: every cookie in the set is issued.
    pub fn to_headers(&self) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        header_set_cookie(
            &mut headers,
            &self.primary.name,
            &self.primary.value,
            self.primary.max_age,
        )?;
        for cookie in &self.legacy {
            header_set_cookie(&mut headers, &cookie.name, &cookie.value, cookie.max_age)?;
        }
        header_set_cookie(
            &mut headers,
            &self.last_access.name,
            &self.last_access.value,
            self.last_access.max_age,
        )?;
        Ok(headers)
    }

    /// Headers for a refresh: the last-access cookie is deliberately not
    /// re-issued, which is what keeps its value and expiry byte-identical
    /// on the client.
    pub fn to_refresh_headers(&self) -> Result<HeaderMap, SessionError> {
        let mut headers = HeaderMap::new();
        header_set_cookie(
            &mut headers,
            &self.primary.name,
            &self.primary.value,
            self.primary.max_age,
        )?;
        for cookie in &self.legacy {
            header_set_cookie(&mut headers, &cookie.name, &cookie.value, cookie.max_age)?;
        }
        Ok(headers)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredSession {
    pub(crate) email: String,
    pub(crate) provider_session_token: String,
    pub(crate) csrf_token: String,
    pub(crate) expires_at: DateTime<Utc>,
    pub(crate) ttl: u64,
}

impl From<StoredSession> for CacheData {
    fn from(data: StoredSession) -> Self {
        Self {
            value: serde_json::to_string(&data).expect("Failed to serialize StoredSession"),
        }
    }
}

impl TryFrom<CacheData> for StoredSession {
    type Error = SessionError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| SessionError::Storage(e.to_string()))
    }
}
