mod csrf;
mod session;

pub use csrf::{CsrfProvider, HmacCsrfProvider};
pub use session::{
    create_login_session, is_authenticated, prepare_logout_response, refresh_session_set,
};
pub(crate) use session::{RotatedSession, get_session_id_from_headers, rotate_session};
