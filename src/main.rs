use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};
use tracing::{error, info, warn};

mod config;
mod database;
mod handlers;
mod line;
mod services;
mod state;
mod tenant;
mod utils;

use crate::config::Settings;
use database::{DbPool, Repository};
use state::AppState;
use tenant::TenantRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,footcare_bot=debug".to_string()),
        )
        .with_target(true)
        .init();

    info!("🚀 Starting footcare bot server...");

    let settings = Arc::new(Settings::load()?);
    info!("✅ Configuration loaded");

    let registry = Arc::new(TenantRegistry::from_credentials(
        config::load_tenant_credentials(),
    ));
    if registry.is_empty() {
        warn!("no tenants configured, webhooks will all answer 404");
    } else {
        info!("✅ {} tenant(s) configured", registry.len());
    }

    // A missing or unreachable database degrades the process instead of
    // killing it: the server keeps answering, the scheduler stays off.
    let repo = match init_database(&settings).await {
        Ok(repo) => {
            info!("✅ Database ready");
            Some(Arc::new(repo))
        }
        Err(e) => {
            error!("❌ Database initialization failed: {e:#}");
            None
        }
    };

    let state = AppState {
        settings: settings.clone(),
        registry: registry.clone(),
        repo,
    };

    if let Some(repo) = state.repo.as_deref() {
        if let Err(e) = registry.sync(repo).await {
            error!("❌ Tenant record sync failed: {e:#}");
        }
        services::scheduler::spawn(state.clone());
        info!("✅ Reminder scheduler started");
    }

    let app = build_router(state);
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn init_database(settings: &Settings) -> Result<Repository> {
    let pool = DbPool::new(&settings.database).await?;
    pool.run_migrations().await?;
    Ok(Repository::new(pool))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/callback/{tenant_id}", post(handlers::webhook::callback))
        .route("/callback", post(handlers::webhook::legacy_callback))
        .route("/test/scheduler", get(handlers::admin::run_scheduler))
        .route("/test/send-now", get(handlers::admin::send_now))
        .route("/history/{tenant_id}", get(handlers::history::exercise_history))
        .route("/health", get(handlers::health::health_check))
        .layer(
            TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()),
        )
        .with_state(state)
}
