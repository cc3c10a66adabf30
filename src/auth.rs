//! # Caller Credentials
//!
//! The gateway never validates credentials itself: the caller's `Authorization` value is
//! forwarded unchanged to the remote platform. This module only enforces its presence.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, header::AUTHORIZATION, request::Parts},
};

use crate::error::{ApiError, missing_credential};

/// Opaque `Authorization` header value supplied by the caller.
///
/// Kept as the raw header bytes; nothing beyond "present and not blank" is checked.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(HeaderValue);

impl Credential {
    /// Wrap a raw header value. Returns `None` for blank values.
    pub fn from_header_value(mut value: HeaderValue) -> Option<Self> {
        if value.as_bytes().iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        value.set_sensitive(true);
        Some(Self(value))
    }

    /// Wrap a textual value. Returns `None` for blank values or values that cannot be sent as
    /// an HTTP header.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        HeaderValue::try_from(value.into())
            .ok()
            .and_then(Self::from_header_value)
    }

    /// Wrap a bare token as a `Bearer` credential.
    pub fn bearer(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Self::new(format!("Bearer {}", token))
    }

    /// Extract the credential from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        headers
            .get(AUTHORIZATION)
            .cloned()
            .and_then(Self::from_header_value)
            .ok_or_else(missing_credential)
    }

    /// The header value to forward.
    pub fn header_value(&self) -> HeaderValue {
        self.0.clone()
    }

    /// Raw bytes of the header value.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let credential = Self::from_headers(&parts.headers);
        if credential.is_err() {
            tracing::debug!("Rejecting request without Authorization header");
        }
        credential
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_missing_header_is_unauthorized() {
        let headers = HeaderMap::new();
        let err = Credential::from_headers(&headers).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_blank_header_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("   "));
        assert!(Credential::from_headers(&headers).is_err());
    }

    #[test]
    fn test_header_forwarded_verbatim() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        let credential = Credential::from_headers(&headers).unwrap();
        assert_eq!(credential.as_bytes(), b"Bearer abc.def");

        // Non-bearer schemes are not ours to judge.
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token xyz"));
        let credential = Credential::from_headers(&headers).unwrap();
        assert_eq!(credential.as_bytes(), b"Token xyz");
    }

    #[test]
    fn test_non_ascii_header_forwarded_unchanged() {
        let raw = HeaderValue::from_bytes(b"Bearer caf\xe9").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, raw.clone());

        let credential = Credential::from_headers(&headers).unwrap();
        assert_eq!(credential.as_bytes(), raw.as_bytes());
        assert_eq!(credential.header_value(), raw);
        assert!(credential.header_value().is_sensitive());
    }

    #[test]
    fn test_bearer_constructor_and_redacted_debug() {
        let credential = Credential::bearer(" secret ").unwrap();
        assert_eq!(credential.as_bytes(), b"Bearer secret");
        assert!(!format!("{:?}", credential).contains("secret"));
        assert!(Credential::bearer("").is_none());
        assert!(Credential::new("bad\nvalue").is_none());
    }
}
