//! HTTP request/response types exchanged with a [`Transport`](crate::transport::Transport).
//!
//! # Design
//! Requests and responses are plain data. `UserKitClient::build_*` methods
//! produce an `HttpRequest` and `parse_*` methods consume an `HttpResponse`,
//! so every operation can be checked without touching the network. The
//! transport in between is the only piece doing I/O.
//!
//! The session token travels in `HttpRequest::credential` rather than in
//! `headers`: the transport decides how to attach it, and it never ends up in
//! the URL or the body.

use std::fmt;

/// HTTP method for a request. The UserKit API only uses these two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Out-of-band authentication for a single request.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    #[default]
    None,
    /// A user session token, sent as a header by the transport.
    SessionToken(String),
}

impl Credential {
    pub fn session_token(&self) -> Option<&str> {
        match self {
            Credential::None => None,
            Credential::SessionToken(token) => Some(token),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Credential::None)
    }
}

// Keep tokens out of debug logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::None => f.write_str("None"),
            Credential::SessionToken(_) => f.write_str("SessionToken(<redacted>)"),
        }
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, base URL included.
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body, if any.
    pub body: Option<String>,
    pub credential: Credential,
}

/// An HTTP response described as plain data.
///
/// Only the status and body matter to the client, so response headers are
/// not kept. Bytes that are not valid UTF-8 arrive here as U+FFFD.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}
