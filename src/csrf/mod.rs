//! Stateless CSRF token issuance and verification.
//!
//! A token binds a session identifier to a keyed digest:
//!
//! ```text
//! base64(HMAC-SHA256(secret, message)) "." base64(message)
//! message = session_id "!" nonce
//! ```
//!
//! The nonce is a fresh UUIDv4 per issued token, so two tokens for the same
//! session are never equal. Verification needs only the token, the claimed
//! session identifier, and the shared secret; no server-side token store.

use axum::http::{header::SET_COOKIE, HeaderMap};
use base64ct::{Base64, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::cookie;

type HmacSha256 = Hmac<Sha256>;

/// Separates the session identifier from the nonce inside the signed
/// message. Session identifiers must not contain it.
const SEPARATOR: char = '!';

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty CSRF secret")]
    EmptySecret,
    #[error("empty session identifier")]
    EmptySessionId,
    #[error("session identifier contains {SEPARATOR:?}")]
    SessionIdFormat,
}

/// An issued token, safe to embed in a page and hand back on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues and verifies CSRF tokens with a process-wide shared secret.
///
/// The secret is injected at construction; both operations are pure
/// functions of their inputs plus the immutable key, so a signer can be
/// shared across request tasks without coordination.
#[derive(Clone)]
pub struct CsrfSigner {
    mac: HmacSha256,
}

impl CsrfSigner {
    /// Create a signer from the shared secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySecret`] if the secret is empty: the process
    /// must refuse to start rather than sign or verify with an empty key.
    pub fn new(secret: &SecretString) -> Result<Self, Error> {
        let secret = secret.expose_secret();
        if secret.is_empty() {
            return Err(Error::EmptySecret);
        }

        let mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| Error::EmptySecret)?;

        Ok(Self { mac })
    }

    /// Issue a token bound to `session_id`.
    ///
    /// Never deterministic: the embedded nonce is freshly generated, so two
    /// calls for the same identifier produce distinct tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if `session_id` is empty or contains the message
    /// separator, which would make the decoded message ambiguous.
    pub fn issue(&self, session_id: &str) -> Result<CsrfToken, Error> {
        let message = encode_message(session_id, &Uuid::new_v4().to_string())?;
        let digest = self.digest(&message);

        Ok(CsrfToken(format!(
            "{digest}.{}",
            Base64::encode_string(message.as_bytes())
        )))
    }

    /// Scan `Set-Cookie` response headers for the session cookie and issue a
    /// token bound to its value.
    ///
    /// Returns `Ok(None)` when no `session_id` cookie is present: there is
    /// nothing to bind to, and the caller must treat the response as having
    /// no CSRF protection.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie value fails [`CsrfSigner::issue`]
    /// validation.
    pub fn issue_from_set_cookie_headers(
        &self,
        headers: &HeaderMap,
    ) -> Result<Option<CsrfToken>, Error> {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };

            if let Some(session_id) = cookie::set_cookie_value(value, cookie::SESSION_COOKIE_NAME)
            {
                return self.issue(session_id).map(Some);
            }
        }

        Ok(None)
    }

    /// Check that `token` was issued for `session_id` and has not been
    /// tampered with.
    ///
    /// Malformed input is an ordinary negative result, never an error: the
    /// caller branches on the boolean and rejects the request.
    #[must_use]
    pub fn verify(&self, session_id: &str, token: &str) -> bool {
        let Some((digest, encoded_message)) = token.split_once('.') else {
            return false;
        };

        if digest.is_empty() || encoded_message.is_empty() {
            return false;
        }

        let Ok(digest) = Base64::decode_vec(digest) else {
            return false;
        };

        let Ok(message) = Base64::decode_vec(encoded_message) else {
            return false;
        };

        let Ok(message) = String::from_utf8(message) else {
            return false;
        };

        let Some((embedded_session_id, _nonce)) = decode_message(&message) else {
            return false;
        };

        // Binding check before any digest work: a valid digest over a
        // different session is still a mismatch.
        if embedded_session_id != session_id {
            return false;
        }

        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());

        // Constant-time comparison
        mac.verify_slice(&digest).is_ok()
    }

    fn digest(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());

        Base64::encode_string(&mac.finalize().into_bytes())
    }
}

fn encode_message(session_id: &str, nonce: &str) -> Result<String, Error> {
    if session_id.is_empty() {
        return Err(Error::EmptySessionId);
    }

    if session_id.contains(SEPARATOR) {
        return Err(Error::SessionIdFormat);
    }

    Ok(format!("{session_id}{SEPARATOR}{nonce}"))
}

fn decode_message(message: &str) -> Option<(&str, &str)> {
    let (session_id, nonce) = message.split_once(SEPARATOR)?;

    if session_id.is_empty() || nonce.is_empty() {
        return None;
    }

    Some((session_id, nonce))
}
