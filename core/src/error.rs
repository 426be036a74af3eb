//! Error types for the UserKit client.
//!
//! # Design
//! Every public operation returns `UserKitError`. Non-200 responses land in
//! `Api` with the status code and the detail produced by
//! [`normalize_error`](crate::normalize::normalize_error); callers that only
//! care about "the user does not exist" can use [`UserKitError::is_not_found`].

use std::fmt;

use thiserror::Error;

/// Errors returned by `UserKitClient` operations.
#[derive(Debug, Error)]
pub enum UserKitError {
    /// The request never produced an HTTP response (DNS, refused, timeout).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The server answered with a status other than 200.
    #[error("HTTP {status}: {detail}")]
    Api { status: u16, detail: ApiErrorDetail },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Decode(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Client configuration is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl UserKitError {
    /// HTTP status of an `Api` error, `None` for every other variant.
    pub fn status(&self) -> Option<u16> {
        match self {
            UserKitError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn detail(&self) -> Option<&ApiErrorDetail> {
        match self {
            UserKitError::Api { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

/// Structured description of an API failure.
///
/// `kind` is the machine-readable error type or code sent by the server
/// (`"not_found"`, `"invalid_request_error"`, ...). When the body could not be
/// understood it is [`ApiErrorDetail::UNKNOWN_KIND`] and `message` holds the
/// raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrorDetail {
    pub kind: String,
    pub message: String,
    /// Request parameter the server blamed, when it named one.
    pub param: Option<String>,
}

impl ApiErrorDetail {
    pub const UNKNOWN_KIND: &'static str = "unknown_error";

    pub fn is_unknown(&self) -> bool {
        self.kind == Self::UNKNOWN_KIND
    }
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.param, self.message.is_empty()) {
            (_, true) => write!(f, "{}", self.kind),
            (Some(param), false) => write!(f, "{}: {} (param: {param})", self.kind, self.message),
            (None, false) => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
