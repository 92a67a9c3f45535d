pub mod health;
pub use self::health::health;

pub mod registration;

// common functions for the handlers
use axum::http::{header::COOKIE, HeaderMap};
use regex::Regex;

use crate::cookie;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

pub fn valid_password(password: &str) -> bool {
    // the browser sends a sha256 hex digest, never the raw password
    Regex::new(r"^[0-9a-fA-F]{64}$").map_or(false, |re| re.is_match(password))
}

/// Session identifier from the request's own `Cookie` header.
pub fn session_from_request(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| cookie::cookie_value(value, cookie::SESSION_COOKIE_NAME))
}
