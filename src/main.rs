//! SignLearn - a sign-language learning site

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signlearn::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxAccountRepository, SqlxSessionRepository},
    },
    services::{AccountService, LookupService},
    templates::TemplateEngine,
};

/// How often expired login sessions are purged
const SESSION_CLEANUP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signlearn=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SignLearn...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    // Services
    let account_service = Arc::new(AccountService::with_session_expiration(
        SqlxAccountRepository::boxed(pool.clone()),
        SqlxSessionRepository::boxed(pool.clone()),
        config.session.expiration_days,
    ));
    let lookup_service = Arc::new(LookupService::from_config(&config.lookup)?);
    tracing::info!(
        "Lookups: dictionary {} / signs {}",
        config.lookup.dictionary_api_base,
        config.lookup.sign_site_base
    );

    // Templates
    let templates = TemplateEngine::new(&config.templates.path)?;
    tracing::info!("Template engine initialized ({} templates)", templates.template_names().len());

    // Start session cleanup task
    {
        let accounts = account_service.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match accounts.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!("Removed {} expired session(s)", removed),
                    Err(e) => tracing::warn!("Session cleanup failed: {:#}", e),
                }
            }
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Build application state
    let state = AppState {
        pool,
        config: Arc::new(config),
        account_service,
        lookup_service,
        templates: Arc::new(templates),
    };

    // Build router
    let app = api::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
