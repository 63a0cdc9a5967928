//! Page handlers
//!
//! Server-rendered pages. Rendering never fails outright: template errors
//! fall back to the error page inside `TemplateEngine::render_page`.

use axum::{
    extract::{Path, Query, State},
    http::Uri,
    response::Html,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tera::Context as TeraContext;

use crate::api::middleware::{AppState, CurrentAccount};
use crate::models::SearchMode;
use crate::services::learning_path;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/level/", get(level))
        .route("/practice/", get(practice))
        .route("/dictionary/", get(dictionary))
        .route("/chapter/{chapter}/", get(chapter))
        .route("/profile/", get(profile))
}

#[derive(Debug, Default, Deserialize)]
pub struct DictionaryQuery {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
}

/// Render `template` with the standard variables for this request
pub(crate) fn render(
    state: &AppState,
    template: &str,
    context: &TeraContext,
    uri: &Uri,
    account: &CurrentAccount,
) -> Html<String> {
    let vars = state.page_vars(uri.path(), account);
    Html(state.templates.render_page(template, context, &vars))
}

/// Tera context from a serializable view model
fn view_context<T: Serialize>(view: &T) -> TeraContext {
    TeraContext::from_serialize(view).unwrap_or_else(|e| {
        tracing::warn!("Failed to build template context: {}", e);
        TeraContext::new()
    })
}

async fn home(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
) -> Html<String> {
    render(&state, "home.html", &TeraContext::new(), &uri, &account)
}

async fn level(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
) -> Html<String> {
    render_level(&state, &uri, &account)
}

fn render_level(state: &AppState, uri: &Uri, account: &CurrentAccount) -> Html<String> {
    let mut context = TeraContext::new();
    context.insert("nodes", &learning_path());
    render(state, "level.html", &context, uri, account)
}

async fn practice(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
) -> Html<String> {
    render(&state, "practice.html", &TeraContext::new(), &uri, &account)
}

async fn dictionary(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
    Query(query): Query<DictionaryQuery>,
) -> Html<String> {
    let mode = SearchMode::from_param(query.mode.as_deref());
    let view = state
        .lookup_service
        .dictionary_view(query.q.as_deref().unwrap_or(""), mode)
        .await;

    render(&state, "dictionary.html", &view_context(&view), &uri, &account)
}

/// Chapter page; unknown chapter numbers show the level map instead
async fn chapter(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
    Path(chapter): Path<String>,
) -> Html<String> {
    let view = match chapter.parse::<u32>() {
        Ok(number) => state.lookup_service.chapter_view(number).await,
        Err(_) => None,
    };

    let Some(view) = view else {
        tracing::debug!("Chapter {:?} out of range, showing level map", chapter);
        return render_level(&state, &uri, &account);
    };

    let dedicated = format!("chapters/chapter{}.html", view.chapter_number);
    let template = state
        .templates
        .select_template(&[dedicated.as_str(), "chapter.html"])
        .unwrap_or("chapter.html");

    render(&state, template, &view_context(&view), &uri, &account)
}

async fn profile(
    State(state): State<AppState>,
    account: CurrentAccount,
    uri: Uri,
) -> Html<String> {
    let profile = match account.username() {
        Some(username) => state.account_service.profile(username).await,
        None => None,
    };

    let mut context = TeraContext::new();
    context.insert("account", &profile);
    render(&state, "profile.html", &context, &uri, &account)
}
