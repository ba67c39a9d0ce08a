use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verdict_orchestrator::config::Config;
use verdict_orchestrator::events::EventBus;
use verdict_orchestrator::repository::Store;
use verdict_orchestrator::state::AppState;
use verdict_orchestrator::{api, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verdict_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Verdict Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    if config.api_keys.is_empty() {
        tracing::warn!("No API_KEYS configured, every authenticated request will be rejected");
    }

    let store = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(url)
                .await
                .context("Failed to create database pool")?;
            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            Store::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Store::memory()
        }
    };

    let (events, event_worker) = EventBus::with_worker(AppState::default_handlers(&store));
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, store, events);

    let restored = state
        .restore_queue()
        .await
        .context("Failed to restore the job queue")?;
    tracing::info!("Restored {} queued jobs", restored);

    // Build router with all API endpoints
    let app = api::create_router(state.clone());

    tracing::info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    let shutdown = state.shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("Server error")?;

    // The bus worker exits once every sender is gone
    drop(state);
    if let Err(e) = event_worker.await {
        tracing::warn!("Event worker ended abnormally: {}", e);
    }

    tracing::info!("Orchestrator stopped");
    Ok(())
}
