//! Registration, login and logout
//!
//! Form posts are answered with either a redirect carrying the session
//! cookie or the same form re-rendered with its errors.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tera::Context as TeraContext;

use crate::api::middleware::{
    clear_session_cookie, session_cookie, ApiError, AppState, CurrentAccount,
};
use crate::api::pages::render;
use crate::models::Session;
use crate::services::{is_safe_redirect, AccountError, FormErrors, LoginForm, RegisterForm};

const DEFAULT_LOGIN_REDIRECT: &str = "/profile/";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", get(register_page).post(register))
        .route("/login/", get(login_page).post(login))
        .route("/logout/", get(logout).post(logout))
}

/// `?next=` on the login page
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: Option<String>,
}

fn register_context(errors: &FormErrors, username: &str, email: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("errors", errors);
    context.insert(
        "values",
        &serde_json::json!({ "username": username, "email": email }),
    );
    context
}

fn login_context(error: Option<&str>, username: &str, next: &str) -> TeraContext {
    let mut context = TeraContext::new();
    context.insert("error", &error);
    context.insert("values", &serde_json::json!({ "username": username }));
    context.insert("next", next);
    context
}

fn request_host(headers: &HeaderMap) -> &str {
    headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
}

/// Trimmed `next` from the form, else from the query, if safe for `host`
fn safe_next(form_next: Option<&str>, query_next: Option<&str>, host: &str) -> Option<String> {
    let next = form_next
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| query_next.map(str::trim).filter(|n| !n.is_empty()))?;

    if is_safe_redirect(next, host) {
        Some(next.to_string())
    } else {
        tracing::debug!("Ignoring unsafe login redirect {:?}", next);
        None
    }
}

/// Redirect that also sets the session cookie
fn logged_in_redirect(state: &AppState, session: &Session, to: &str) -> Result<Response, ApiError> {
    let cookie = session_cookie(
        &state.config.session.cookie_name,
        session,
        state.account_service.session_expiration_days(),
    )
    .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))?;

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(to)).into_response())
}

/// GET /register/
async fn register_page(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
) -> Response {
    let context = register_context(&FormErrors::default(), "", "");
    render(&state, "register.html", &context, &uri, &account).into_response()
}

/// POST /register/
async fn register(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let errors = match state.account_service.register(&form).await {
        Ok(session) => return logged_in_redirect(&state, &session, DEFAULT_LOGIN_REDIRECT),
        Err(errors) => errors,
    };

    let context = register_context(&errors, form.username.trim(), form.email.trim());
    Ok(render(&state, "register.html", &context, &uri, &account).into_response())
}

/// GET /login/
async fn login_page(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
) -> Response {
    let next = safe_next(None, query.next.as_deref(), request_host(&headers)).unwrap_or_default();
    let context = login_context(None, "", &next);
    render(&state, "login.html", &context, &uri, &account).into_response()
}

/// POST /login/
async fn login(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    let next = safe_next(
        form.next.as_deref(),
        query.next.as_deref(),
        request_host(&headers),
    );
    let identifier = form.username.trim();

    match state.account_service.login(identifier, &form.password).await {
        Ok(session) => {
            let to = next.as_deref().unwrap_or(DEFAULT_LOGIN_REDIRECT);
            logged_in_redirect(&state, &session, to)
        }
        Err(e) => {
            if let AccountError::Database(ref source) = e {
                tracing::error!("Login failed for {:?}: {:#}", identifier, source);
            }
            let message = e.to_string();
            let context = login_context(Some(&message), identifier, next.as_deref().unwrap_or(""));
            Ok(render(&state, "login.html", &context, &uri, &account).into_response())
        }
    }
}

/// GET or POST /logout/
async fn logout(State(state): State<AppState>, account: CurrentAccount) -> Result<Response, ApiError> {
    if let Some(session) = account.session() {
        if let Err(e) = state.account_service.logout(&session.id).await {
            tracing::warn!("Failed to delete session on logout: {:#}", e);
        }
    }

    let cookie = clear_session_cookie(&state.config.session.cookie_name)
        .map_err(|e| ApiError::internal_error(format!("Invalid session cookie: {}", e)))?;

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")).into_response())
}
