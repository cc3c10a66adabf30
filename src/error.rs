//! # Error Handling
//!
//! Gateway-side error responses. Every error the gateway itself produces is rendered as
//! `{error, message, type, errno}` so callers can tell "the remote said no" (relayed verbatim)
//! apart from "the gateway could not reach the remote" (this shape, 500).

use std::error::Error as StdError;
use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::platform::ListingError;
use crate::telemetry;

/// Unified gateway error body
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing, skip_deserializing)]
    pub status: StatusCode,
    /// Short summary of what failed
    pub error: Box<str>,
    /// Human-readable detail
    pub message: Box<str>,
    /// Transport failure class (`timeout`, `connect`, ...), `null` for non-transport errors
    #[serde(rename = "type")]
    pub error_type: Option<Box<str>>,
    /// POSIX-style error name (`ECONNREFUSED`, ...) when one could be determined
    pub errno: Option<Box<str>>,
    /// Correlation id of the request that failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and texts
    pub fn new<S: Into<String>>(status: StatusCode, error: S, message: S) -> Self {
        Self {
            status,
            error: error.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            error_type: None,
            errno: None,
            trace_id: telemetry::current_trace_id().map(String::into_boxed_str),
        }
    }

    /// Attach transport classification
    pub fn with_fault(mut self, fault: &TransportFault) -> Self {
        self.error_type = Some(fault.kind.into());
        self.errno = fault.errno.map(Into::into);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                error = %self.error,
                message = %self.message,
                error_type = ?self.error_type,
                errno = ?self.errno,
                trace_id = ?self.trace_id,
                "gateway error"
            );
        }

        (self.status, axum::Json(self)).into_response()
    }
}

/// Missing `Authorization` header (401)
pub fn missing_credential() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "Authorization header missing",
        "An Authorization header is required for every proxied request",
    )
}

/// Missing target identifier (400)
pub fn missing_target_id() -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "Target ID parameter missing",
        "A target identifier is required in the request path",
    )
}

/// Upstream could not be reached (500)
pub fn transport(context: &str, fault: &TransportFault) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        context.to_string(),
        fault.message.clone(),
    )
    .with_fault(fault)
}

/// Listing aggregation aborted (500)
pub fn listing_failed(context: &str, err: &ListingError) -> ApiError {
    let error = ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        context.to_string(),
        err.to_string(),
    );
    match err.fault() {
        Some(fault) => error.with_fault(fault),
        None => error,
    }
}

/// A client-side view of a transport failure.
///
/// Holds everything the error contract needs without keeping the original `reqwest::Error`
/// alive, so test doubles can produce one too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFault {
    pub message: String,
    pub kind: &'static str,
    pub errno: Option<&'static str>,
}

impl TransportFault {
    pub fn new(message: impl Into<String>, kind: &'static str, errno: Option<&'static str>) -> Self {
        Self {
            message: message.into(),
            kind,
            errno,
        }
    }
}

impl std::fmt::Display for TransportFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&reqwest::Error> for TransportFault {
    fn from(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_redirect() {
            "redirect"
        } else if err.is_body() {
            "body"
        } else if err.is_decode() {
            "decode"
        } else if err.is_builder() {
            "builder"
        } else if err.is_request() {
            "request"
        } else {
            "system"
        };

        let errno = errno_for(err).or(if err.is_timeout() {
            Some("ETIMEDOUT")
        } else {
            None
        });

        Self {
            message: error_chain(err),
            kind,
            errno,
        }
    }
}

impl From<reqwest::Error> for TransportFault {
    fn from(err: reqwest::Error) -> Self {
        Self::from(&err)
    }
}

/// Render an error and all of its sources as `outer: inner: innermost`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = inner.source();
    }
    rendered
}

fn errno_for(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if let Some(io_err) = current.downcast_ref::<io::Error>()
            && let Some(name) = io_errno(io_err)
        {
            return Some(name);
        }
        if current.to_string().contains("dns error") {
            return Some("ENOTFOUND");
        }
        source = current.source();
    }
    None
}

fn io_errno(err: &io::Error) -> Option<&'static str> {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
        io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::BrokenPipe => Some("EPIPE"),
        io::ErrorKind::AddrNotAvailable => Some("EADDRNOTAVAIL"),
        io::ErrorKind::AddrInUse => Some("EADDRINUSE"),
        io::ErrorKind::PermissionDenied => Some("EACCES"),
        io::ErrorKind::NotConnected => Some("ENOTCONN"),
        io::ErrorKind::UnexpectedEof => Some("ECONNRESET"),
        _ => None,
    }
}
