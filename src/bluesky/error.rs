//! XRPC error types.
//!
//! Errors are categorized so that callers can log them meaningfully and so
//! the client can recover from an expired session:
//!
//! - **Transient** errors would likely succeed later (5xx, rate limits, network failures)
//! - **Permanent** errors will not succeed without a change (most 4xx, malformed responses)
//! - **AuthExpired** means the access token must be refreshed before the call can succeed
//!
//! The bot never retries on its own; a failed call is simply a failed call
//! for the current cycle.

use std::fmt;
use thiserror::Error;

/// The kind of XRPC error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrpcErrorKind {
    /// The service or network is temporarily unable to answer.
    ///
    /// Examples:
    /// - HTTP 5xx
    /// - HTTP 429 (rate limited)
    /// - Connection failures and timeouts
    Transient,

    /// The request itself is wrong or not allowed.
    ///
    /// Examples:
    /// - HTTP 400 with `InvalidRequest`
    /// - HTTP 401 with bad credentials
    /// - A response body that does not match the expected shape
    Permanent,

    /// The access token expired (`ExpiredToken`); refreshing the session fixes it.
    AuthExpired,
}

impl XrpcErrorKind {
    /// Returns true if a later attempt could succeed without any change.
    pub fn is_transient(&self) -> bool {
        matches!(self, XrpcErrorKind::Transient)
    }
}

/// The error body returned by XRPC endpoints.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub(crate) struct XrpcErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// An XRPC call failure.
#[derive(Debug, Error)]
pub struct XrpcError {
    /// The category of the failure.
    pub kind: XrpcErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// The XRPC error name (e.g. `InvalidRequest`, `ExpiredToken`), if provided.
    pub error: Option<String>,

    /// A human-readable description.
    pub message: String,

    /// The underlying transport error, if any.
    #[source]
    pub source: Option<reqwest::Error>,
}

impl fmt::Display for XrpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status_code, self.error.as_deref()) {
            (Some(code), Some(name)) => {
                write!(f, "XRPC error (HTTP {}, {}): {}", code, name, self.message)
            }
            (Some(code), None) => write!(f, "XRPC error (HTTP {}): {}", code, self.message),
            (None, _) => write!(f, "XRPC error: {}", self.message),
        }
    }
}

impl XrpcError {
    /// Categorizes a non-success HTTP response.
    pub(crate) fn from_status(status: u16, body: XrpcErrorBody) -> Self {
        let name = body.error;
        let kind = if name.as_deref() == Some("ExpiredToken") {
            XrpcErrorKind::AuthExpired
        } else if status == 429 || (500..600).contains(&status) {
            XrpcErrorKind::Transient
        } else {
            XrpcErrorKind::Permanent
        };
        XrpcError {
            kind,
            status_code: Some(status),
            message: body
                .message
                .or_else(|| name.clone())
                .unwrap_or_else(|| "request failed".to_string()),
            error: name,
            source: None,
        }
    }

    /// Categorizes a transport-level failure.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let status_code = err.status().map(|s| s.as_u16());
        let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
            XrpcErrorKind::Transient
        } else if err.is_decode() {
            XrpcErrorKind::Permanent
        } else {
            match status_code {
                Some(code) if code == 429 || (500..600).contains(&code) => {
                    XrpcErrorKind::Transient
                }
                Some(_) => XrpcErrorKind::Permanent,
                None => XrpcErrorKind::Transient,
            }
        };
        XrpcError {
            kind,
            status_code,
            error: None,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// An error for a response that arrived but could not be used.
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        XrpcError {
            kind: XrpcErrorKind::Permanent,
            status_code: None,
            error: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        self.kind == XrpcErrorKind::AuthExpired
    }
}
