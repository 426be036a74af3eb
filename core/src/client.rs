//! Resource client for the UserKit users API.
//!
//! # Design
//! `UserKitClient` holds only a `base_url` and a transport and carries no
//! mutable state between calls, so one client can be shared by many threads.
//! Each operation is split into a `build_*` method that produces an
//! `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`; the
//! high-level methods (`create`, `get`, ...) glue the two together through
//! the [`Transport`], one round trip per call.
//!
//! Only status 200 counts as success. Every other status is routed through
//! [`normalize_error`] and returned as `UserKitError::Api`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::UserKitError;
use crate::http::{Credential, HttpMethod, HttpRequest, HttpResponse};
use crate::normalize::normalize_error;
use crate::transport::{Transport, UreqTransport};
use crate::types::{LoginRequest, Session, User, UserFields};

/// Synchronous client for the UserKit users API.
#[derive(Debug, Clone)]
pub struct UserKitClient<T = UreqTransport> {
    base_url: String,
    transport: T,
}

impl UserKitClient<UreqTransport> {
    /// Client talking to the real API over `ureq`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, UserKitError> {
        config.validate()?;
        Ok(Self::with_transport(
            config.base_url(),
            UreqTransport::from_config(config),
        ))
    }
}

impl<T> UserKitClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_create(&self, fields: &UserFields) -> Result<HttpRequest, UserKitError> {
        self.json_request(HttpMethod::Post, format!("{}/users", self.base_url), fields)
    }

    pub fn build_get(&self, user_id: &str) -> HttpRequest {
        self.bodyless_request(self.user_url(user_id), Credential::None)
    }

    /// Updates go out as POST, which is what the API accepts.
    pub fn build_update(&self, user_id: &str, fields: &UserFields) -> Result<HttpRequest, UserKitError> {
        self.json_request(HttpMethod::Post, self.user_url(user_id), fields)
    }

    pub fn build_get_user_by_session(&self, session_token: &str) -> HttpRequest {
        self.bodyless_request(
            format!("{}/users/by_token", self.base_url),
            Credential::SessionToken(session_token.to_string()),
        )
    }

    pub fn build_login(&self, username: &str, password: &str, login_code: &str) -> Result<HttpRequest, UserKitError> {
        let payload = LoginRequest::new(username, password, login_code);
        self.json_request(HttpMethod::Post, format!("{}/users/login", self.base_url), &payload)
    }

    /// Parse the response of any operation that returns a user.
    pub fn parse_user(&self, response: HttpResponse) -> Result<User, UserKitError> {
        parse_json(response)
    }

    pub fn parse_session(&self, response: HttpResponse) -> Result<Session, UserKitError> {
        parse_json(response)
    }

    fn user_url(&self, user_id: &str) -> String {
        format!("{}/users/{}", self.base_url, urlencoding::encode(user_id))
    }

    fn bodyless_request(&self, url: String, credential: Credential) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
            credential,
        }
    }

    fn json_request<P: Serialize>(
        &self,
        method: HttpMethod,
        url: String,
        payload: &P,
    ) -> Result<HttpRequest, UserKitError> {
        let body = serde_json::to_string(payload).map_err(|e| UserKitError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            url,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
            credential: Credential::None,
        })
    }
}

impl<T: Transport> UserKitClient<T> {
    /// `POST /users`
    pub fn create(&self, fields: &UserFields) -> Result<User, UserKitError> {
        let request = self.build_create(fields)?;
        self.parse_user(self.dispatch(request)?)
    }

    /// `GET /users/{id}`
    pub fn get(&self, user_id: &str) -> Result<User, UserKitError> {
        let request = self.build_get(user_id);
        self.parse_user(self.dispatch(request)?)
    }

    /// `POST /users/{id}`
    pub fn update(&self, user_id: &str, fields: &UserFields) -> Result<User, UserKitError> {
        let request = self.build_update(user_id, fields)?;
        self.parse_user(self.dispatch(request)?)
    }

    /// `GET /users/by_token`, authenticated by the session token.
    pub fn get_user_by_session(&self, session_token: &str) -> Result<User, UserKitError> {
        let request = self.build_get_user_by_session(session_token);
        self.parse_user(self.dispatch(request)?)
    }

    /// `POST /users/login`. Pass `""` for an unused password or login code.
    pub fn login(&self, username: &str, password: &str, login_code: &str) -> Result<Session, UserKitError> {
        let request = self.build_login(username, password, login_code)?;
        self.parse_session(self.dispatch(request)?)
    }

    fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, UserKitError> {
        debug!(
            method = %request.method,
            url = %request.url,
            session = !request.credential.is_none(),
            "userkit request"
        );
        let response = self.transport.execute(request)?;
        debug!(status = response.status, "userkit response");
        Ok(response)
    }
}

fn parse_json<R: DeserializeOwned>(response: HttpResponse) -> Result<R, UserKitError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| UserKitError::Decode(e.to_string()))
}

/// Map any status other than 200 to `UserKitError::Api`.
fn check_status(response: &HttpResponse) -> Result<(), UserKitError> {
    if response.status == 200 {
        return Ok(());
    }
    let detail = normalize_error(response.status, &response.body);
    warn!(status = response.status, kind = %detail.kind, "userkit API error");
    Err(UserKitError::Api {
        status: response.status,
        detail,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    use super::*;

    const USER_BODY: &str = r#"{"id":"u1","name":"Alice","username":"alice","email":"alice@example.com","verified_email":"true","verified_phone":"false","auth_type":"password","last_failed_login":0,"last_login":1700000000,"disabled":false,"created":1690000000}"#;

    /// Replays canned responses and remembers every request it saw.
    #[derive(Default)]
    struct Recorder {
        responses: RefCell<VecDeque<Result<HttpResponse, UserKitError>>>,
        requests: RefCell<Vec<HttpRequest>>,
    }

    impl Recorder {
        fn replying(status: u16, body: &str) -> Self {
            let recorder = Self::default();
            recorder
                .responses
                .borrow_mut()
                .push_back(Ok(HttpResponse::new(status, body)));
            recorder
        }

        fn last_request(&self) -> HttpRequest {
            self.requests.borrow().last().cloned().unwrap()
        }
    }

    impl Transport for Recorder {
        fn execute(&self, request: HttpRequest) -> Result<HttpResponse, UserKitError> {
            self.requests.borrow_mut().push(request);
            self.responses
                .borrow_mut()
                .pop_front()
                .expect("no canned response left")
        }
    }

    fn client(transport: Recorder) -> UserKitClient<Recorder> {
        UserKitClient::with_transport("http://localhost:3000", transport)
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn build_create_produces_correct_request() {
        let fields = UserFields::new().name("Alice").username("alice");
        let req = client(Recorder::default()).build_create(&fields).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/users");
        assert_eq!(
            req.headers,
            vec![("content-type".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            body_json(&req),
            serde_json::json!({"name": "Alice", "username": "alice"})
        );
        assert!(req.credential.is_none());
    }

    #[test]
    fn create_body_matches_field_map_exactly() {
        let mut map = HashMap::new();
        map.insert("email".to_string(), "a@b.c".to_string());
        map.insert("custom_key".to_string(), "".to_string());
        let expected = serde_json::to_value(&map).unwrap();

        let req = client(Recorder::default())
            .build_create(&UserFields::from(map))
            .unwrap();
        assert_eq!(body_json(&req), expected);
    }

    #[test]
    fn field_map_bodies_serialize_exactly() {
        let cases: Vec<(&str, UserFields, serde_json::Value)> = vec![
            ("empty", UserFields::new(), serde_json::json!({})),
            (
                "unicode keys and values",
                UserFields::new().field("prénom", "Zoë").field("名前", "アリス"),
                serde_json::json!({"prénom": "Zoë", "名前": "アリス"}),
            ),
            (
                "named setter overridden by field",
                UserFields::new().email("old@example.com").field("email", "new@example.com"),
                serde_json::json!({"email": "new@example.com"}),
            ),
            (
                "field overridden by named setter",
                UserFields::new().field("name", "raw").name("Alice"),
                serde_json::json!({"name": "Alice"}),
            ),
            (
                "empty and quoted values",
                UserFields::new().field("note", "").field("quote", "say \"hi\"\n"),
                serde_json::json!({"note": "", "quote": "say \"hi\"\n"}),
            ),
        ];

        let c = client(Recorder::default());
        for (name, fields, expected) in cases {
            let create = c.build_create(&fields).unwrap();
            assert_eq!(body_json(&create), expected, "{name}: create body");
            let update = c.build_update("u1", &fields).unwrap();
            assert_eq!(body_json(&update), expected, "{name}: update body");
        }
    }

    #[test]
    fn build_get_produces_correct_request() {
        let req = client(Recorder::default()).build_get("u1");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/users/u1");
        assert!(req.body.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn user_id_is_escaped_as_one_path_segment() {
        let req = client(Recorder::default()).build_get("a/b c");
        assert_eq!(req.url, "http://localhost:3000/users/a%2Fb%20c");
    }

    #[test]
    fn build_update_uses_post() {
        let req = client(Recorder::default())
            .build_update("u1", &UserFields::new().email("new@example.com"))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.url, "http://localhost:3000/users/u1");
        assert_eq!(body_json(&req), serde_json::json!({"email": "new@example.com"}));
    }

    #[test]
    fn session_token_travels_as_credential_only() {
        let req = client(Recorder::default()).build_get_user_by_session("tok123");
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/users/by_token");
        assert!(!req.url.contains("tok123"));
        assert!(req.body.is_none());
        assert!(req.headers.iter().all(|(_, v)| !v.contains("tok123")));
        assert_eq!(req.credential.session_token(), Some("tok123"));
    }

    #[test]
    fn login_body_omits_empty_password_and_code() {
        let c = client(Recorder::default());

        let req = c.build_login("alice", "", "").unwrap();
        assert_eq!(req.url, "http://localhost:3000/users/login");
        assert_eq!(body_json(&req), serde_json::json!({"username": "alice"}));

        let req = c.build_login("alice", "secret", "").unwrap();
        assert_eq!(
            body_json(&req),
            serde_json::json!({"username": "alice", "password": "secret"})
        );
    }

    #[test]
    fn get_decodes_user() {
        let c = client(Recorder::replying(200, USER_BODY));
        let user = c.get("u1").unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.name, "Alice");
        assert_eq!(c.transport().requests.borrow().len(), 1);
    }

    #[test]
    fn non_json_success_body_is_decode_error() {
        let c = client(Recorder::replying(200, "not json"));
        let err = c.get("u1").unwrap_err();
        assert!(matches!(err, UserKitError::Decode(_)));
    }

    #[test]
    fn not_found_carries_normalized_detail() {
        let c = client(Recorder::replying(404, r#"{"error":"not_found"}"#));
        let err = c.get("missing").unwrap_err();
        assert!(err.is_not_found());
        match err {
            UserKitError::Api { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail.kind, "not_found");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn other_success_codes_are_still_errors() {
        // A 201 with a perfectly valid user is not what the API promises.
        let c = client(Recorder::replying(201, USER_BODY));
        let err = c.create(&UserFields::new().username("alice")).unwrap_err();
        assert_eq!(err.status(), Some(201));
    }

    #[test]
    fn transport_errors_pass_through_untouched() {
        let recorder = Recorder::default();
        recorder
            .responses
            .borrow_mut()
            .push_back(Err(UserKitError::Transport("connection refused".into())));
        let err = client(recorder).login("alice", "pw", "").unwrap_err();
        assert!(matches!(err, UserKitError::Transport(ref m) if m == "connection refused"));
    }

    #[test]
    fn login_decodes_session() {
        let c = client(Recorder::replying(
            200,
            r#"{"token":"tok","expires_in_secs":86400,"refresh_after_secs":3600}"#,
        ));
        let session = c.login("alice", "secret", "").unwrap();
        assert_eq!(session.token, "tok");
        assert_eq!(session.expires_in_secs, 86400.0);
        assert_eq!(
            body_json(&c.transport().last_request()),
            serde_json::json!({"username": "alice", "password": "secret"})
        );
    }

    #[test]
    fn get_user_by_session_dispatches_credential() {
        let c = client(Recorder::replying(200, USER_BODY));
        c.get_user_by_session("tok123").unwrap();
        let sent = c.transport().last_request();
        assert_eq!(sent.credential, Credential::SessionToken("tok123".into()));
        assert_eq!(sent.url, "http://localhost:3000/users/by_token");
    }

    #[test]
    fn update_sends_post_and_decodes_user() {
        let c = client(Recorder::replying(200, USER_BODY));
        let user = c.update("u1", &UserFields::new().name("Alice")).unwrap();
        assert_eq!(user.username, "alice");
        let sent = c.transport().last_request();
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "http://localhost:3000/users/u1");
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let c = UserKitClient::with_transport("http://localhost:3000/", Recorder::default());
        assert_eq!(c.build_get("u1").url, "http://localhost:3000/users/u1");
    }

    #[test]
    fn from_config_rejects_invalid_config() {
        let config = ClientConfig::new("").with_base_url("http://localhost:3000");
        let err = UserKitClient::from_config(&config).unwrap_err();
        assert!(matches!(err, UserKitError::Config(_)));
    }

    #[test]
    fn ureq_client_is_shareable_across_threads() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<UserKitClient<UreqTransport>>();
    }
}
