//! HTTP basic authentication for the report endpoint.

use crate::error::AuthError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http::HeaderMap;

/// Length of the `"Basic "` scheme prefix.
const SCHEME_LEN: usize = 6;

/// Configured username and password.
#[derive(Clone)]
pub struct BasicCredentials {
    expected: String,
}

impl BasicCredentials {
    /// Credentials accepting exactly `username:password`.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            expected: format!("{}:{}", username, password),
        }
    }

    /// Check the `Authorization` header in `headers`.
    ///
    /// The first six bytes are taken as the scheme and skipped without
    /// inspection; the rest must decode to `username:password`.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let value = headers
            .get(http::header::AUTHORIZATION)
            .ok_or(AuthError::Missing)?;
        let value = value.to_str().map_err(|_| AuthError::Malformed)?;

        if value.len() <= SCHEME_LEN {
            return Err(AuthError::Malformed);
        }
        let encoded = value.get(SCHEME_LEN..).ok_or(AuthError::Malformed)?;

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| AuthError::Encoding)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Encoding)?;

        if decoded == self.expected {
            Ok(())
        } else {
            Err(AuthError::Mismatch)
        }
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("expected", &"[REDACTED]")
            .finish()
    }
}
