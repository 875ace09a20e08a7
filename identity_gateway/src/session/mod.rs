//! Session cookie issuance and refresh, plus the CSRF provider contract.

mod config;
mod errors;
mod main;
mod types;

pub use config::{
    LAST_ACCESS_COOKIE_NAME, LEGACY_SESSION_COOKIE_NAME, SESSION_COOKIE_MAX_AGE,
    SESSION_COOKIE_NAME,
};
pub use errors::SessionError;
pub use main::{
    CsrfProvider, HmacCsrfProvider, create_login_session, is_authenticated,
    prepare_logout_response, refresh_session_set,
};
pub(crate) use main::{RotatedSession, get_session_id_from_headers, rotate_session};
pub use types::{SessionCookie, SessionCookieSet};
