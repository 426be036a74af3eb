//! Synchronous client for the UserKit user-management API.
//!
//! # Overview
//! Five operations, each one blocking HTTP round trip: create a user, fetch
//! a user, update a user, look a user up by session token, and log in.
//!
//! ```no_run
//! use userkit_core::{ClientConfig, UserFields, UserKitClient};
//!
//! # fn main() -> Result<(), userkit_core::UserKitError> {
//! let client = UserKitClient::from_config(&ClientConfig::from_env()?)?;
//! let user = client.create(&UserFields::new().username("alice").password("s3cret"))?;
//! let session = client.login("alice", "s3cret", "")?;
//! assert_eq!(client.get_user_by_session(&session.token)?.id, user.id);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `UserKitClient` is stateless: a base URL plus a [`Transport`].
//! - Each operation is split into `build_*` (produces request) and
//!   `parse_*` (consumes response), so the I/O boundary is explicit and every
//!   step is testable without a network.
//! - Non-200 responses become [`UserKitError::Api`] via [`normalize_error`].
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod normalize;
pub mod transport;
pub mod types;

pub use client::UserKitClient;
pub use config::ClientConfig;
pub use error::{ApiErrorDetail, UserKitError};
pub use http::{Credential, HttpMethod, HttpRequest, HttpResponse};
pub use normalize::normalize_error;
pub use transport::{Transport, UreqTransport};
pub use types::{LoginRequest, Session, User, UserFields};
