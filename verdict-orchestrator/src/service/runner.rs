//! Runner Service
//!
//! Business logic for the runner registry.

use chrono::Utc;
use verdict_core::domain::runner::Runner;
use verdict_core::dto::runner::{ConnectRunner, RunnerView};

use crate::repository::StoreError;
use crate::state::AppState;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("runner not found: {0}")]
    NotFound(String),

    #[error("runner {0} is registered to another tenant")]
    OwnedByOtherTenant(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, RunnerError>;

/// Connect a runner to the orchestrator
///
/// Creates the runner or replaces the existing record with the same id;
/// the latest connect wins, including its tags. A runner id stays with the
/// tenant that first connected it.
pub async fn connect(state: &AppState, tenant_id: &str, req: ConnectRunner) -> Result<Runner> {
    validate_connect_request(&req)?;

    if let Some(existing) = state.store.runners.find_by_id(&req.id).await? {
        if existing.tenant_id != tenant_id {
            tracing::warn!(
                "Tenant {} tried to connect runner {} owned by tenant {}",
                tenant_id,
                req.id,
                existing.tenant_id
            );
            return Err(RunnerError::OwnedByOtherTenant(req.id));
        }
    }

    let name = match req.name.trim() {
        "" => req.id.clone(),
        name => name.to_string(),
    };

    let runner = Runner {
        id: req.id,
        name,
        tags: req.tags,
        tenant_id: tenant_id.to_string(),
        last_seen: Utc::now(),
    };
    state.store.runners.upsert(&runner).await?;

    tracing::info!("Runner connected: {} (tenant {})", runner.id, tenant_id);

    Ok(runner)
}

/// Whether a runner is known and has been seen recently
pub async fn health(state: &AppState, tenant_id: &str, runner_id: &str) -> Result<bool> {
    let runner = state.store.runners.find_by_id(runner_id).await?;
    Ok(runner
        .filter(|r| r.tenant_id == tenant_id)
        .is_some_and(|r| is_healthy(state, &r)))
}

/// Get a runner by ID
pub async fn get_runner(state: &AppState, tenant_id: &str, id: &str) -> Result<RunnerView> {
    let runner = find_for_tenant(state, tenant_id, id).await?;
    Ok(view(state, runner))
}

/// List the runners of a tenant
pub async fn list_runners(state: &AppState, tenant_id: &str) -> Result<Vec<RunnerView>> {
    let runners = state.store.runners.list_by_tenant(tenant_id).await?;
    Ok(runners.into_iter().map(|r| view(state, r)).collect())
}

/// Load a runner, treating runners of other tenants as missing.
pub(crate) async fn find_for_tenant(state: &AppState, tenant_id: &str, id: &str) -> Result<Runner> {
    state
        .store
        .runners
        .find_by_id(id)
        .await?
        .filter(|r| r.tenant_id == tenant_id)
        .ok_or_else(|| RunnerError::NotFound(id.to_string()))
}

fn is_healthy(state: &AppState, runner: &Runner) -> bool {
    let stale_after = chrono::Duration::from_std(state.config.runner_stale_after)
        .unwrap_or(chrono::Duration::MAX);
    runner.is_healthy(Utc::now(), stale_after)
}

fn view(state: &AppState, runner: Runner) -> RunnerView {
    let healthy = is_healthy(state, &runner);
    RunnerView { runner, healthy }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_connect_request(req: &ConnectRunner) -> Result<()> {
    if req.id.trim().is_empty() {
        return Err(RunnerError::Validation(
            "Runner ID cannot be empty".to_string(),
        ));
    }

    if req.id.len() > 255 {
        return Err(RunnerError::Validation(
            "Runner ID is too long (max 255 characters)".to_string(),
        ));
    }

    if req.tags.iter().any(|t| t.trim().is_empty()) {
        return Err(RunnerError::Validation(
            "Runner tags cannot be blank".to_string(),
        ));
    }

    Ok(())
}
