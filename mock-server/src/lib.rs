use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const SESSION_TOKEN_HEADER: &str = "x-user-token";
pub const SESSION_EXPIRES_IN_SECS: f64 = 86_400.0;
pub const SESSION_REFRESH_AFTER_SECS: f64 = 3_600.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub expires_in_secs: f64,
    pub refresh_after_secs: f64,
}

#[derive(Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: Option<String>,
    pub login_code: Option<String>,
}

struct Account {
    user: User,
    password: Option<String>,
    login_code: Option<String>,
}

#[derive(Default)]
pub struct Store {
    accounts: HashMap<String, Account>,
    // session token -> user id
    sessions: HashMap<String, String>,
}

impl Store {
    fn find_by_username(&self, username: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.user.username == username)
    }

    fn username_taken(&self, username: &str, except_id: Option<&str>) -> bool {
        self.accounts
            .values()
            .any(|a| a.user.username == username && Some(a.user.id.as_str()) != except_id)
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    // None accepts any non-empty key.
    api_key: Option<Arc<str>>,
}

/// Error body in the shape the real API uses.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    param: Option<&'static str>,
}

impl ApiError {
    fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            param: None,
        }
    }

    fn invalid(param: &'static str, message: impl Into<String>) -> Self {
        Self {
            param: Some(param),
            ..Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", message)
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "user not found")
    }

    fn unauthorized(kind: &'static str, message: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, kind, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut error = json!({ "type": self.kind, "message": self.message });
        if let Some(param) = self.param {
            error["param"] = json!(param);
        }
        (self.status, Json(json!({ "error": error }))).into_response()
    }
}

pub fn app() -> Router {
    router(None)
}

/// Like [`app`], but only the given API key is accepted.
pub fn app_with_api_key(api_key: &str) -> Router {
    router(Some(Arc::from(api_key)))
}

fn router(api_key: Option<Arc<str>>) -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(Store::default())),
        api_key,
    };
    Router::new()
        .route("/users", post(create_user))
        .route("/users/login", post(login))
        .route("/users/by_token", get(get_user_by_token))
        .route("/users/{id}", get(get_user).post(update_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match api_key_from(request.headers()) {
        Some(key) if state.api_key.as_deref().is_none_or(|expected| expected == key) => {
            next.run(request).await
        }
        _ => ApiError::unauthorized("unauthorized", "missing or invalid API key").into_response(),
    }
}

/// Extract the key from `Authorization: Basic base64("api:<key>")`.
fn api_key_from(headers: &HeaderMap) -> Option<String> {
    let encoded = headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let key = decoded.strip_prefix("api:")?;
    (!key.is_empty()).then(|| key.to_string())
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

async fn create_user(
    State(state): State<AppState>,
    Json(fields): Json<HashMap<String, String>>,
) -> Result<Json<User>, ApiError> {
    let username = fields
        .get("username")
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::invalid("username", "username is required"))?
        .to_string();

    let mut store = state.db.write().await;
    if store.username_taken(&username, None) {
        return Err(ApiError::invalid("username", "username already taken"));
    }

    let field = |key: &str, default: &str| fields.get(key).cloned().unwrap_or_else(|| default.to_string());
    let user = User {
        id: format!("usr_{}", Uuid::new_v4().simple()),
        name: field("name", ""),
        username,
        email: field("email", ""),
        verified_email: field("verified_email", "false"),
        verified_phone: field("verified_phone", "false"),
        auth_type: field("auth_type", "password"),
        last_failed_login: 0.0,
        last_login: 0.0,
        disabled: fields.get("disabled").is_some_and(|d| d == "true"),
        created: now_secs(),
    };
    store.accounts.insert(
        user.id.clone(),
        Account {
            user: user.clone(),
            password: fields.get("password").cloned(),
            login_code: fields.get("login_code").cloned(),
        },
    );
    tracing::info!(user_id = %user.id, "created user");
    Ok(Json(user))
}

async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<User>, ApiError> {
    let store = state.db.read().await;
    store
        .accounts
        .get(&id)
        .map(|a| Json(a.user.clone()))
        .ok_or_else(ApiError::not_found)
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(fields): Json<HashMap<String, String>>,
) -> Result<Json<User>, ApiError> {
    let mut store = state.db.write().await;
    if !store.accounts.contains_key(&id) {
        return Err(ApiError::not_found());
    }
    if let Some(username) = fields.get("username") {
        if username.trim().is_empty() {
            return Err(ApiError::invalid("username", "username cannot be empty"));
        }
        if store.username_taken(username, Some(&id)) {
            return Err(ApiError::invalid("username", "username already taken"));
        }
    }

    let account = store.accounts.get_mut(&id).ok_or_else(ApiError::not_found)?;
    for (key, value) in fields {
        match key.as_str() {
            "name" => account.user.name = value,
            "username" => account.user.username = value,
            "email" => account.user.email = value,
            "verified_email" => account.user.verified_email = value,
            "verified_phone" => account.user.verified_phone = value,
            "auth_type" => account.user.auth_type = value,
            "disabled" => account.user.disabled = value == "true",
            "password" => account.password = Some(value),
            "login_code" => account.login_code = Some(value),
            _ => {}
        }
    }
    Ok(Json(account.user.clone()))
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Result<Json<Session>, ApiError> {
    if payload.password.is_none() && payload.login_code.is_none() {
        return Err(ApiError::invalid("password", "password or login_code is required"));
    }

    let mut store = state.db.write().await;
    let user_id = store
        .find_by_username(&payload.username)
        .map(|a| a.user.id.clone())
        .ok_or_else(|| ApiError::unauthorized("invalid_credentials", "invalid username or password"))?;
    let account = store.accounts.get_mut(&user_id).ok_or_else(ApiError::not_found)?;

    if account.user.disabled {
        return Err(ApiError::new(StatusCode::FORBIDDEN, "user_disabled", "user is disabled"));
    }
    let password_ok = payload.password.is_some() && payload.password == account.password;
    let code_ok = payload.login_code.is_some() && payload.login_code == account.login_code;
    if !(password_ok || code_ok) {
        account.user.last_failed_login = now_secs();
        tracing::debug!(%user_id, "rejected login");
        return Err(ApiError::unauthorized("invalid_credentials", "invalid username or password"));
    }
    if code_ok {
        // codes are single use
        account.login_code = None;
    }
    account.user.last_login = now_secs();

    let token = format!("tok_{}", Uuid::new_v4().simple());
    store.sessions.insert(token.clone(), user_id);
    Ok(Json(Session {
        token,
        expires_in_secs: SESSION_EXPIRES_IN_SECS,
        refresh_after_secs: SESSION_REFRESH_AFTER_SECS,
    }))
}

async fn get_user_by_token(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>, ApiError> {
    let token = headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("unauthorized", "missing session token"))?;

    let store = state.db.read().await;
    store
        .sessions
        .get(token)
        .and_then(|id| store.accounts.get(id))
        .map(|a| Json(a.user.clone()))
        .ok_or_else(|| ApiError::unauthorized("invalid_token", "session token is invalid"))
}
