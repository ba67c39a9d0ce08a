//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::{Job, JobStatus};

/// A group of jobs corresponding to one external CI/CD run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: i64,
    /// Per-project sequence number
    pub number: i64,
    pub tenant_id: String,
    pub project_id: i64,
    pub external_identifier: Option<String>,
    pub cicd_system: Option<String>,
    pub status: PipelineStatus,
    pub test_run_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub jobs: Vec<Job>,
}

impl Pipeline {
    /// Recompute `status` from the current job list.
    pub fn refresh_status(&mut self) {
        self.status = PipelineStatus::derive(self.jobs.iter().map(|j| j.status));
    }
}

/// Aggregate pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineStatus {
    Running,
    Succeeded,
    Failed,
}

impl PipelineStatus {
    /// Derive the pipeline status from its jobs.
    ///
    /// A pipeline without jobs, or with any non-terminal job, is `Running`.
    pub fn derive(statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        let mut any_job = false;
        let mut any_unsuccessful = false;

        for status in statuses {
            any_job = true;
            if !status.is_terminal() {
                return PipelineStatus::Running;
            }
            if status != JobStatus::Succeeded {
                any_unsuccessful = true;
            }
        }

        match (any_job, any_unsuccessful) {
            (false, _) => PipelineStatus::Running,
            (true, true) => PipelineStatus::Failed,
            (true, false) => PipelineStatus::Succeeded,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Running => "Running",
            PipelineStatus::Succeeded => "Succeeded",
            PipelineStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Running" => Ok(PipelineStatus::Running),
            "Succeeded" => Ok(PipelineStatus::Succeeded),
            "Failed" => Ok(PipelineStatus::Failed),
            other => Err(format!("unknown pipeline status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    #[test]
    fn test_any_pending_job_keeps_pipeline_running() {
        assert_eq!(
            PipelineStatus::derive([Succeeded, Running]),
            PipelineStatus::Running
        );
        assert_eq!(
            PipelineStatus::derive([Failed, Queued]),
            PipelineStatus::Running
        );
    }

    #[test]
    fn test_failure_wins_once_all_terminal() {
        assert_eq!(
            PipelineStatus::derive([Succeeded, Failed]),
            PipelineStatus::Failed
        );
        assert_eq!(
            PipelineStatus::derive([Succeeded, Canceled]),
            PipelineStatus::Failed
        );
    }

    #[test]
    fn test_all_succeeded() {
        assert_eq!(
            PipelineStatus::derive([Succeeded, Succeeded]),
            PipelineStatus::Succeeded
        );
    }

    #[test]
    fn test_empty_pipeline_is_running() {
        assert_eq!(PipelineStatus::derive(Vec::<JobStatus>::new()), PipelineStatus::Running);
    }
}
