//! The I/O seam: something that turns an `HttpRequest` into an `HttpResponse`.
//!
//! # Design
//! `UserKitClient` is generic over [`Transport`] so tests can swap in a
//! canned or recording implementation. [`UreqTransport`] is the blocking
//! implementation used in production. It owns the application API key and
//! decides how credentials go on the wire:
//!
//! - API key: HTTP Basic auth, user `api`, password = key.
//! - Session token: the `X-User-Token` header.
//!
//! The JSON content type comes from `HttpRequest::headers`, which the client
//! always fills in for requests with a body.
//!
//! Non-2xx statuses are returned as data so the client can normalize them.
//! Once a status line has arrived the body is handed over whatever it
//! contains: invalid UTF-8 is replaced and anything past `MAX_BODY_BYTES` is
//! cut off, so the client reports `Api` or `Decode` for it. Only failures on
//! the wire become `UserKitError::Transport`. Nothing is retried.

use std::io::Read;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;
use ureq::{Agent, RequestBuilder};

use crate::config::ClientConfig;
use crate::error::UserKitError;
use crate::http::{Credential, HttpMethod, HttpRequest, HttpResponse};

pub const SESSION_TOKEN_HEADER: &str = "X-User-Token";
const API_KEY_USER: &str = "api";
const USER_AGENT: &str = concat!("userkit-rust/", env!("CARGO_PKG_VERSION"));
const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

/// Executes one HTTP round trip.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, UserKitError>;
}

/// Blocking transport backed by a `ureq` agent.
///
/// Cheap to clone; clones share the agent's connection pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
    authorization: String,
}

impl UreqTransport {
    pub fn new(api_key: &str, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            authorization: basic_auth(API_KEY_USER, api_key),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.api_key(), config.timeout())
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, UserKitError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
            credential,
        } = request;

        let result = match (method, body) {
            (HttpMethod::Get, _) => self.prepare(self.agent.get(&url), &headers, &credential).call(),
            (HttpMethod::Post, Some(body)) => self
                .prepare(self.agent.post(&url), &headers, &credential)
                .send(body.as_bytes()),
            (HttpMethod::Post, None) => self
                .prepare(self.agent.post(&url), &headers, &credential)
                .send_empty(),
        };

        let mut response = result.map_err(|e| {
            debug!(%method, %url, error = %e, "userkit request failed before a response");
            UserKitError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let mut raw = Vec::new();
        response
            .body_mut()
            .as_reader()
            .take(MAX_BODY_BYTES)
            .read_to_end(&mut raw)
            .map_err(|e| UserKitError::Transport(format!("reading response body: {e}")))?;

        Ok(HttpResponse::new(status, String::from_utf8_lossy(&raw)))
    }
}

impl UreqTransport {
    fn prepare<B>(
        &self,
        mut builder: RequestBuilder<B>,
        headers: &[(String, String)],
        credential: &Credential,
    ) -> RequestBuilder<B> {
        builder = builder
            .header("authorization", self.authorization.as_str())
            .header("user-agent", USER_AGENT);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = credential.session_token() {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }
        builder
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}
