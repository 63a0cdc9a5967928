//! API layer - HTTP handlers and routing
//!
//! - Server-rendered pages (home, level map, practice, dictionary,
//!   chapters, profile)
//! - Registration, login and logout forms
//! - The phrase lookup JSON endpoint
//! - Embedded static assets and a health probe

pub mod asl_video;
pub mod auth;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod static_files;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, CurrentAccount};

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(pages::router())
        .merge(auth::router())
        .route("/api/asl-video/", get(asl_video::asl_video))
        .route("/healthz", get(health::healthz))
        .fallback(static_files::serve_static)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::optional_auth,
                )),
        )
        .with_state(state)
}
