//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::result::ResultFormat;

/// A unit of work dispatched to exactly one runner
///
/// Structure shared between orchestrator (persists, dispatches) and runner (executes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Globally unique id, also the idempotency key for status updates
    pub guid: Uuid,
    pub pipeline_id: i64,
    pub tenant_id: String,
    /// Tags a runner must share with this job; empty matches any runner
    pub runner_selector: BTreeSet<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Last runner that reported on this job (audit only)
    pub runner_id: Option<String>,
    pub exit_code: Option<i32>,
    /// Shell script the runner executes
    pub script: Option<String>,
    /// Artifact glob patterns; empty means the server defaults apply
    pub artifact_patterns: Vec<String>,
    /// Declared result encoding of the job's artifacts, if known
    pub result_format: Option<ResultFormat>,
}

impl Job {
    /// Whether a runner advertising `tags` may receive this job
    pub fn matches_runner(&self, tags: &BTreeSet<String>) -> bool {
        self.runner_selector.is_empty() || !self.runner_selector.is_disjoint(tags)
    }
}

/// Job execution status
///
/// `Queued → Dispatched → Running → {Succeeded | Failed | Canceled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Dispatched,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    /// Whether `self → next` is an edge of the job state machine.
    ///
    /// Re-applying the current status is not an edge; callers treat it as a no-op.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;

        match self {
            Queued => matches!(next, Dispatched | Canceled),
            Dispatched => matches!(next, Running | Succeeded | Failed | Canceled),
            Running => matches!(next, Succeeded | Failed | Canceled),
            Succeeded | Failed | Canceled => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Dispatched => "Dispatched",
            JobStatus::Running => "Running",
            JobStatus::Succeeded => "Succeeded",
            JobStatus::Failed => "Failed",
            JobStatus::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(JobStatus::Queued),
            "Dispatched" => Ok(JobStatus::Dispatched),
            "Running" => Ok(JobStatus::Running),
            "Succeeded" => Ok(JobStatus::Succeeded),
            "Failed" => Ok(JobStatus::Failed),
            "Canceled" => Ok(JobStatus::Canceled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}
