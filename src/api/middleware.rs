//! API middleware
//!
//! Shared application state, the JSON error type, and the session
//! middleware that resolves the login cookie for every request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, header::InvalidHeaderValue, request::Parts, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::services::{AccountService, LookupService};
use crate::templates::{StandardTemplateVars, TemplateEngine};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub account_service: Arc<AccountService>,
    pub lookup_service: Arc<LookupService>,
    pub templates: Arc<TemplateEngine>,
}

impl AppState {
    /// Standard page variables for a request
    pub fn page_vars(&self, request_path: &str, account: &CurrentAccount) -> StandardTemplateVars {
        StandardTemplateVars::new(self.config.templates.site_name.as_str(), request_path)
            .with_user(account.username().map(str::to_string))
    }
}

/// Login session attached to the request by `optional_auth`.
///
/// Extracting it never fails; anonymous requests get `CurrentAccount(None)`.
#[derive(Debug, Clone, Default)]
pub struct CurrentAccount(pub Option<Session>);

impl CurrentAccount {
    pub fn username(&self) -> Option<&str> {
        self.0.as_ref().map(|s| s.username.as_str())
    }

    pub fn session(&self) -> Option<&Session> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentAccount>().cloned().unwrap_or_default())
    }
}

/// JSON error body: `{"error": "..."}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn service_unavailable(error: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }

    pub fn internal_error(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Value of the cookie named `cookie_name`, if present and non-empty
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let prefix = format!("{}=", cookie_name);

    for value in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = value.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            if let Some(token) = cookie.trim().strip_prefix(prefix.as_str()) {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Resolve the session cookie, if any, into a `CurrentAccount`.
///
/// Invalid, expired or unreadable sessions leave the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let mut account = CurrentAccount::default();

    if let Some(token) = extract_session_token(request.headers(), &state.config.session.cookie_name) {
        match state.account_service.validate_session(&token).await {
            Ok(session) => account = CurrentAccount(session),
            Err(e) => tracing::warn!("Session validation failed: {:#}", e),
        }
    }

    request.extensions_mut().insert(account);
    next.run(request).await
}

/// `Set-Cookie` header value for a new login session
pub fn session_cookie(
    cookie_name: &str,
    session: &Session,
    expiration_days: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        cookie_name,
        session.id,
        expiration_days * 24 * 60 * 60
    );
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` header value that removes the session cookie
pub fn clear_session_cookie(cookie_name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", cookie_name))
}
