//! Job poller
//!
//! Long-polls the orchestrator for jobs and executes them. Each job runs in
//! its own task with a private workspace; the number of jobs in flight is
//! bounded by `max_parallel_jobs`.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use verdict_client::{JobAssignment, OrchestratorClient};
use verdict_core::domain::job::JobStatus;
use verdict_core::dto::job::JobStatusUpdate;

use crate::config::Config;
use crate::service::{self, ExecutionOutcome, ExecutionService};

const ERROR_BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const ERROR_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Job poller that continuously long-polls for and executes jobs
pub struct JobPoller {
    config: Config,
    client: Arc<OrchestratorClient>,
    executor: Arc<dyn ExecutionService>,
    semaphore: Arc<Semaphore>,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(
        config: Config,
        client: Arc<OrchestratorClient>,
        executor: Arc<dyn ExecutionService>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_jobs));
        Self {
            config,
            client,
            executor,
            semaphore,
        }
    }

    /// Runs the polling loop until `shutdown` is cancelled, then waits for
    /// the jobs still running.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting job poller (wait: {:?}, parallel jobs: {})",
            self.config.poll_wait, self.config.max_parallel_jobs
        );

        let mut tasks = JoinSet::new();
        let mut backoff = ERROR_BACKOFF_INITIAL;

        loop {
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    warn!("Job task panicked: {}", e);
                }
            }

            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = self.semaphore.clone().acquire_owned() => {
                    permit.context("Job semaphore closed")?
                }
            };

            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.client.poll_job(&self.config.runner_id, Some(self.config.poll_wait)) => polled,
            };

            match polled {
                Ok(Some(job)) => {
                    backoff = ERROR_BACKOFF_INITIAL;
                    info!("Received job {} (pipeline {})", job.guid, job.pipeline_id);

                    let client = Arc::clone(&self.client);
                    let executor = Arc::clone(&self.executor);
                    let config = self.config.clone();
                    tasks.spawn(async move {
                        let guid = job.guid;
                        if let Err(e) = execute_job(job, &config, &client, executor.as_ref()).await {
                            error!("Failed to execute job {}: {:#}", guid, e);
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    backoff = ERROR_BACKOFF_INITIAL;
                    debug!("No job available");
                }
                Err(e) => {
                    error!("Error polling for jobs: {}", e);
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(ERROR_BACKOFF_MAX);
                }
            }
        }

        if !tasks.is_empty() {
            info!("Waiting for {} running job(s) to finish", tasks.len());
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Job task panicked: {}", e);
            }
        }

        info!("Job poller stopped");
        Ok(())
    }
}

/// Runs one job end to end: report `Running`, execute, report the outcome,
/// then collect and upload artifacts.
async fn execute_job(
    job: JobAssignment,
    config: &Config,
    client: &OrchestratorClient,
    executor: &dyn ExecutionService,
) -> Result<()> {
    let runner_id = config.runner_id.as_str();

    if let Err(e) = client
        .update_job_status(runner_id, job.guid, &status(JobStatus::Running))
        .await
    {
        if e.is_conflict() {
            info!("Job {} can no longer start: {}", job.guid, e);
            return Ok(());
        }
        return Err(e).context("Failed to report job as running");
    }

    let workspace = config.workspace_dir.join(job.guid.to_string());
    tokio::fs::create_dir_all(&workspace)
        .await
        .with_context(|| format!("Failed to create workspace {}", workspace.display()))?;

    let outcome = match executor.execute(&job, &workspace, config.job_timeout).await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Job {} could not be executed: {:#}", job.guid, e);
            ExecutionOutcome {
                exit_code: -1,
                message: Some(format!("{:#}", e)),
            }
        }
    };

    if !outcome.success() {
        info!(
            "Job {} failed with exit code {}: {}",
            job.guid,
            outcome.exit_code,
            outcome.message.as_deref().unwrap_or("no message")
        );
    }

    let update = JobStatusUpdate {
        exit_code: Some(outcome.exit_code),
        status: None,
        message: outcome.message,
    };
    match client.update_job_status(runner_id, job.guid, &update).await {
        Ok(reported) => info!("Job {} finished as {}", job.guid, reported.status),
        // Canceled while running; results are still worth keeping
        Err(e) if e.is_conflict() => warn!("Job {} outcome rejected: {}", job.guid, e),
        Err(e) => warn!("Failed to report outcome of job {}: {}", job.guid, e),
    }

    if let Err(e) = upload_artifacts(&job, &workspace, runner_id, client).await {
        warn!("Artifact upload for job {} failed: {:#}", job.guid, e);
    }

    if let Err(e) = tokio::fs::remove_dir_all(&workspace).await {
        warn!("Failed to clean up workspace {}: {}", workspace.display(), e);
    }

    Ok(())
}

async fn upload_artifacts(
    job: &JobAssignment,
    workspace: &Path,
    runner_id: &str,
    client: &OrchestratorClient,
) -> Result<()> {
    let patterns = service::job_patterns(&job.artifact_patterns)?;
    let root = workspace.to_path_buf();
    let archive = tokio::task::spawn_blocking(move || service::collect_artifacts(&root, &patterns))
        .await
        .context("Artifact collection task failed")??;

    let Some(archive) = archive else {
        debug!("Job {} produced no artifacts", job.guid);
        return Ok(());
    };

    info!(
        "Uploading {} artifact(s) for job {} ({} bytes)",
        archive.files,
        job.guid,
        archive.bytes.len()
    );

    match client.upload_artifacts(runner_id, job.guid, archive.bytes).await {
        Ok(report) => {
            info!(
                "Job {} artifacts: {} imported, {} unsupported, {} failed",
                job.guid, report.imported, report.unsupported, report.failed
            );
            Ok(())
        }
        Err(e) if e.status() == Some(400) => {
            info!("Orchestrator did not import artifacts for job {}: {}", job.guid, e);
            Ok(())
        }
        Err(e) => Err(e).context("Failed to upload artifacts"),
    }
}

fn status(status: JobStatus) -> JobStatusUpdate {
    JobStatusUpdate {
        status: Some(status),
        ..Default::default()
    }
}
