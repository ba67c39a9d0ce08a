//! Job DTOs for runner communication

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus};
use crate::domain::result::ResultFormat;

/// Job specification inside a pipeline creation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub script: Option<String>,
    #[serde(default)]
    pub artifact_patterns: Vec<String>,
    pub result_format: Option<ResultFormat>,
}

/// Status report sent by a runner for one job
///
/// When `status` is omitted, `exit_code` decides the outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusUpdate {
    pub exit_code: Option<i32>,
    pub status: Option<JobStatus>,
    pub message: Option<String>,
}

impl JobStatusUpdate {
    /// The status this update asks for, if it names one.
    pub fn requested_status(&self) -> Option<JobStatus> {
        self.status.or(match self.exit_code {
            Some(0) => Some(JobStatus::Succeeded),
            Some(_) => Some(JobStatus::Failed),
            None => None,
        })
    }
}

/// Work handed to a runner by the long-poll endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssignment {
    pub guid: Uuid,
    pub pipeline_id: i64,
    pub script: Option<String>,
    pub artifact_patterns: Vec<String>,
    pub result_format: Option<ResultFormat>,
}

impl From<Job> for JobAssignment {
    fn from(job: Job) -> Self {
        Self {
            guid: job.guid,
            pipeline_id: job.pipeline_id,
            script: job.script,
            artifact_patterns: job.artifact_patterns,
            result_format: job.result_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_decides_missing_status() {
        let ok = JobStatusUpdate {
            exit_code: Some(0),
            ..Default::default()
        };
        let failed = JobStatusUpdate {
            exit_code: Some(2),
            ..Default::default()
        };
        assert_eq!(ok.requested_status(), Some(JobStatus::Succeeded));
        assert_eq!(failed.requested_status(), Some(JobStatus::Failed));
        assert_eq!(JobStatusUpdate::default().requested_status(), None);
    }

    #[test]
    fn test_explicit_status_wins_over_exit_code() {
        let update = JobStatusUpdate {
            exit_code: Some(1),
            status: Some(JobStatus::Canceled),
            message: None,
        };
        assert_eq!(update.requested_status(), Some(JobStatus::Canceled));
    }

    #[test]
    fn test_status_update_wire_format() {
        let update: JobStatusUpdate =
            serde_json::from_str(r#"{"exitCode": 3, "message": "boom"}"#).unwrap();
        assert_eq!(update.exit_code, Some(3));
        assert_eq!(update.message.as_deref(), Some("boom"));
        assert!(update.status.is_none());
    }
}
