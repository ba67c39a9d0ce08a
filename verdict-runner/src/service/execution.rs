//! Execution service
//!
//! Runs a job's script with `sh -c` inside the job workspace and turns the
//! process result into the exit code and message reported to the
//! orchestrator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};
use verdict_core::dto::job::JobAssignment;

/// Result of running one job script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub exit_code: i32,
    /// Why the job failed, when it did
    pub message: Option<String>,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Service trait for executing job scripts
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Runs the job's script in `workspace`, killing it after `timeout`.
    async fn execute(
        &self,
        job: &JobAssignment,
        workspace: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome>;
}

/// Runs scripts through the system shell
pub struct ShellExecutionService {
    shell: String,
}

impl ShellExecutionService {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for ShellExecutionService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionService for ShellExecutionService {
    async fn execute(
        &self,
        job: &JobAssignment,
        workspace: &Path,
        timeout: Duration,
    ) -> Result<ExecutionOutcome> {
        let Some(script) = job.script.as_deref().filter(|s| !s.trim().is_empty()) else {
            info!("Job {} has no script, nothing to run", job.guid);
            return Ok(ExecutionOutcome {
                exit_code: 0,
                message: None,
            });
        };

        debug!("Running script for job {} in {}", job.guid, workspace.display());

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(script)
            .current_dir(workspace)
            .env("VERDICT_JOB_GUID", job.guid.to_string())
            .env("VERDICT_PIPELINE_ID", job.pipeline_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", self.shell))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => output.context("Failed to wait for job script")?,
            Err(_) => {
                warn!("Job {} timed out after {:?}", job.guid, timeout);
                return Ok(ExecutionOutcome {
                    exit_code: -1,
                    message: Some(format!("Timed out after {}s", timeout.as_secs())),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            debug!("[{}] {}", job.guid, line);
        }

        let exit_code = output.status.code().unwrap_or(-1);
        let message = if output.status.success() {
            None
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last_line = stderr.lines().rev().find(|l| !l.trim().is_empty());
            Some(match (output.status.code(), last_line) {
                (_, Some(line)) => line.trim().to_string(),
                (Some(code), None) => format!("Exited with code {}", code),
                (None, None) => "Terminated by signal".to_string(),
            })
        };

        info!("Job {} script exited with code {}", job.guid, exit_code);

        Ok(ExecutionOutcome { exit_code, message })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn job(script: Option<&str>) -> JobAssignment {
        JobAssignment {
            guid: Uuid::new_v4(),
            pipeline_id: 1,
            script: script.map(str::to_string),
            artifact_patterns: Vec::new(),
            result_format: None,
        }
    }

    #[tokio::test]
    async fn test_script_runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ShellExecutionService::new()
            .execute(
                &job(Some("echo \"$VERDICT_PIPELINE_ID\" > marker.txt")),
                dir.path(),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert!(outcome.success());
        let marker = std::fs::read_to_string(dir.path().join("marker.txt")).unwrap();
        assert_eq!(marker.trim(), "1");
    }

    #[tokio::test]
    async fn test_failure_reports_exit_code_and_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ShellExecutionService::new()
            .execute(
                &job(Some("echo 'tests failed' >&2; exit 3")),
                dir.path(),
                Duration::from_secs(10),
            )
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 3);
        assert_eq!(outcome.message.as_deref(), Some("tests failed"));
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ShellExecutionService::new()
            .execute(&job(Some("sleep 30")), dir.path(), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(!outcome.success());
        assert!(outcome.message.unwrap().starts_with("Timed out"));
    }

    #[tokio::test]
    async fn test_missing_script_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ShellExecutionService::new()
            .execute(&job(None), dir.path(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(outcome.success());
    }
}
