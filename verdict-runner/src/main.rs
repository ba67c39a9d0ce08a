//! Verdict Runner
//!
//! A stateless worker that executes test jobs and uploads their results.
//!
//! Architecture:
//! - Configuration: Load settings from the environment
//! - Services: Script execution and artifact collection
//! - Scheduler: Long-polling and job lifecycle management
//!
//! The runner connects to the orchestrator, long-polls for jobs it is
//! eligible for, runs each job's script in its own workspace, reports the
//! outcome and uploads the result files the job produced.

mod config;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::JobPoller;
use crate::service::{ExecutionService, ShellExecutionService};
use verdict_client::OrchestratorClient;
use verdict_core::dto::runner::ConnectRunner;

/// Headroom on top of the long-poll wait before a request counts as hung
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "verdict_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Verdict Runner");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    info!(
        "Loaded configuration: runner_id={}, server_url={}, tags={:?}",
        config.runner_id, config.server_url, config.tags
    );

    // Initialize orchestrator client
    let http = reqwest::Client::builder()
        .timeout(config.poll_wait + REQUEST_TIMEOUT_MARGIN)
        .build()
        .context("Failed to build HTTP client")?;
    let client = Arc::new(OrchestratorClient::with_client(
        config.server_url.clone(),
        config.api_key.clone(),
        http,
    ));

    info!("Connecting to orchestrator");
    connect_with_retry(&client, &config).await?;
    info!("Connected as runner {}", config.runner_id);

    let executor: Arc<dyn ExecutionService> = Arc::new(ShellExecutionService::new());
    let poller = JobPoller::new(config, client, executor);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Shutdown signal received, finishing running jobs");
            shutdown.cancel();
        });
    }

    // Start polling loop
    if let Err(e) = poller.run(shutdown).await {
        error!("Poller error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Connect to the orchestrator with retry logic and exponential backoff
///
/// This handles the case where the orchestrator may not be ready yet when
/// the runner starts (common in container environments). A rejected API
/// key is not retried.
async fn connect_with_retry(client: &OrchestratorClient, config: &Config) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let request = ConnectRunner {
        id: config.runner_id.clone(),
        name: config.runner_name.clone(),
        tags: config.tags.clone(),
    };

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match client.connect(request.clone()).await {
            Ok(_) => {
                if attempt > 1 {
                    info!(
                        "Successfully connected to orchestrator after {} attempt(s)",
                        attempt
                    );
                }
                return Ok(());
            }
            Err(e) if e.is_unauthorized() => {
                return Err(anyhow::anyhow!("Orchestrator rejected the API key: {}", e));
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!(
                        "Failed to connect to orchestrator after {} attempts",
                        MAX_RETRIES
                    );
                    return Err(anyhow::anyhow!(
                        "Failed to connect to orchestrator: {}",
                        e
                    ));
                }

                warn!(
                    "Failed to connect to orchestrator (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                // Exponential backoff with cap
                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}
