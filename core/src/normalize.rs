//! Turn the body of a non-200 response into an [`ApiErrorDetail`].
//!
//! UserKit answers errors with `{"error": {"type", "message", "param"}}`.
//! Some gateways and older endpoints send `{"error": "code"}` with an
//! optional sibling `"message"`. Anything else, including empty and non-JSON
//! bodies, becomes an `unknown_error` detail that keeps the raw body.

use serde::Deserialize;

use crate::error::ApiErrorDetail;

#[derive(Deserialize)]
struct Envelope {
    error: ErrorField,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Object {
        #[serde(rename = "type", alias = "code")]
        kind: String,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        param: Option<String>,
    },
    Code(String),
}

/// Normalize an error response. Never fails.
pub fn normalize_error(status: u16, body: &str) -> ApiErrorDetail {
    match serde_json::from_str::<Envelope>(body) {
        Ok(Envelope {
            error: ErrorField::Object { kind, message, param },
            message: outer,
        }) => ApiErrorDetail {
            kind,
            message: message.or(outer).unwrap_or_default(),
            param: param.filter(|p| !p.is_empty()),
        },
        Ok(Envelope {
            error: ErrorField::Code(kind),
            message,
        }) => ApiErrorDetail {
            kind,
            message: message.unwrap_or_default(),
            param: None,
        },
        Err(_) => fallback(status, body),
    }
}

fn fallback(status: u16, body: &str) -> ApiErrorDetail {
    let body = body.trim();
    ApiErrorDetail {
        kind: ApiErrorDetail::UNKNOWN_KIND.to_string(),
        message: if body.is_empty() {
            format!("HTTP status {status}")
        } else {
            body.to_string()
        },
        param: None,
    }
}
