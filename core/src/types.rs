//! Domain DTOs for the UserKit API.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch drift between the two crates. Response types have
//! no `#[serde(default)]`: a body missing a field is a decode error, never a
//! half-filled value.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A UserKit user as returned by the API.
///
/// `verified_email` and `verified_phone` are strings on the wire; use
/// [`User::email_verified`] / [`User::phone_verified`] for a `bool`.
/// Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub verified_email: String,
    pub verified_phone: String,
    pub auth_type: String,
    pub last_failed_login: f64,
    pub last_login: f64,
    pub disabled: bool,
    pub created: f64,
}

impl User {
    pub fn email_verified(&self) -> bool {
        flag_is_set(&self.verified_email)
    }

    pub fn phone_verified(&self) -> bool {
        flag_is_set(&self.verified_phone)
    }
}

/// Interpret a string-typed verification flag.
pub fn flag_is_set(value: &str) -> bool {
    let value = value.trim();
    ["true", "1", "yes"]
        .iter()
        .any(|truthy| value.eq_ignore_ascii_case(truthy))
}

/// A login session. The client never stores it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub expires_in_secs: f64,
    pub refresh_after_secs: f64,
}

impl Session {
    pub fn expires_in(&self) -> Duration {
        secs_to_duration(self.expires_in_secs)
    }

    pub fn refresh_after(&self) -> Duration {
        secs_to_duration(self.refresh_after_secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Fields sent when creating or updating a user.
///
/// Serializes as a flat JSON object of exactly the pairs inserted. Known keys
/// have named setters; [`UserFields::field`] passes any other key through
/// unchanged, since the server owns the list of accepted keys. Setting a key
/// twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserFields(BTreeMap<String, String>);

impl UserFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(self, value: impl Into<String>) -> Self {
        self.field("name", value)
    }

    pub fn username(self, value: impl Into<String>) -> Self {
        self.field("username", value)
    }

    pub fn email(self, value: impl Into<String>) -> Self {
        self.field("email", value)
    }

    pub fn password(self, value: impl Into<String>) -> Self {
        self.field("password", value)
    }

    pub fn phone(self, value: impl Into<String>) -> Self {
        self.field("phone", value)
    }

    pub fn verified_email(self, value: impl Into<String>) -> Self {
        self.field("verified_email", value)
    }

    pub fn verified_phone(self, value: impl Into<String>) -> Self {
        self.field("verified_phone", value)
    }

    pub fn auth_type(self, value: impl Into<String>) -> Self {
        self.field("auth_type", value)
    }

    /// Set an arbitrary key. Sent as-is.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for UserFields {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl From<BTreeMap<String, String>> for UserFields {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for UserFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request payload for `POST /users/login`. Empty password or login code are
/// left out of the JSON entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_code: Option<String>,
}

impl LoginRequest {
    pub fn new(username: &str, password: &str, login_code: &str) -> Self {
        Self {
            username: username.to_string(),
            password: non_empty(password),
            login_code: non_empty(login_code),
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}
