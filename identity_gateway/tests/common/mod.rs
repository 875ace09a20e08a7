pub mod fakes;

use std::sync::Arc;

use http::HeaderMap;
use http::header::SET_COOKIE;

use identity_gateway::{
    AuthGateway, CsrfProvider, FLOW_COOKIE_NAME, FlowOutcome, HmacCsrfProvider,
    SESSION_COOKIE_NAME,
};

use fakes::{FakeBackends, FakeMailer};

pub struct Harness {
    pub backends: Arc<FakeBackends>,
    pub mailer: Arc<FakeMailer>,
    pub gateway: AuthGateway,
    pub csrf_binding: String,
    pub csrf_token: String,
}

/// Wire a gateway up against one fake world.
pub fn harness() -> Harness {
    let backends = Arc::new(FakeBackends::new());
    let mailer = Arc::new(FakeMailer::new());
    let gateway = AuthGateway::new(
        backends.clone(),
        backends.clone(),
        mailer.clone(),
        Arc::new(HmacCsrfProvider),
    );

    let csrf_binding = "test-page".to_string();
    let csrf_token = HmacCsrfProvider
        .issue(&csrf_binding)
        .expect("csrf token");

    Harness {
        backends,
        mailer,
        gateway,
        csrf_binding,
        csrf_token,
    }
}

/// Values of all Set-Cookie headers in an outcome.
pub fn set_cookies(outcome: &FlowOutcome) -> Vec<String> {
    outcome
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let (pair, _) = c.split_once(';')?;
        let (k, v) = pair.split_once('=')?;
        (k == name && !v.is_empty()).then(|| v.to_string())
    })
}

/// The flow cookie set by this outcome, if a non-empty one was issued.
pub fn flow_cookie(outcome: &FlowOutcome) -> Option<String> {
    cookie_value(&set_cookies(outcome), FLOW_COOKIE_NAME.as_str())
}

/// The primary session cookie value set by this outcome, if any.
pub fn session_cookie(outcome: &FlowOutcome) -> Option<String> {
    cookie_value(&set_cookies(outcome), SESSION_COOKIE_NAME.as_str())
}

/// True when the outcome clears the flow cookie (empty value, past expiry).
pub fn clears_flow_cookie(outcome: &FlowOutcome) -> bool {
    set_cookies(outcome).iter().any(|c| {
        c.starts_with(&format!("{}=;", FLOW_COOKIE_NAME.as_str())) && c.contains("Max-Age=-")
    })
}

/// Request headers carrying the given session cookie.
pub fn request_with_session(session_id: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::COOKIE,
        format!("{}={session_id}", SESSION_COOKIE_NAME.as_str())
            .parse()
            .unwrap(),
    );
    headers
}
