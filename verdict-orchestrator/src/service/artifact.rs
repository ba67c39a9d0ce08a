//! Artifact Service
//!
//! Turns an uploaded artifact archive into imported test results. Every
//! matched entry gets its own outcome in the report; one bad file never
//! aborts the rest of the upload.

use std::io::Cursor;
use uuid::Uuid;
use verdict_core::domain::result::ResultFormat;
use verdict_core::dto::artifact::{EntryOutcome, IngestReport};
use verdict_core::pattern::PatternSet;

use crate::events::DomainEvent;
use crate::ingest::{self, ArchiveError};
use crate::repository::StoreError;
use crate::service::import::{self, ImportError};
use crate::state::AppState;

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    #[error("pipeline {0} has no linked test run")]
    NoLinkedTestRun(i64),

    #[error("invalid artifact pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("artifact extraction failed: {0}")]
    Extraction(String),
}

pub type Result<T> = std::result::Result<T, ArtifactError>;

/// Ingest the artifact archive uploaded by `runner_id` for job `guid`
///
/// The job is looked up by guid within the tenant; `runner_id` is only
/// logged.
pub async fn upload_artifacts<B>(
    state: &AppState,
    tenant_id: &str,
    runner_id: &str,
    guid: Uuid,
    archive: B,
) -> Result<IngestReport>
where
    B: AsRef<[u8]> + Send + 'static,
{
    let job = state
        .store
        .jobs
        .find_by_guid(guid)
        .await?
        .filter(|j| j.tenant_id == tenant_id)
        .ok_or(ArtifactError::JobNotFound(guid))?;

    let test_run_id = state
        .store
        .pipelines
        .find_by_id(job.pipeline_id)
        .await?
        .and_then(|p| p.test_run_id)
        .ok_or(ArtifactError::NoLinkedTestRun(job.pipeline_id))?;

    let patterns = if job.artifact_patterns.is_empty() {
        PatternSet::new(&state.config.default_artifact_patterns)
    } else {
        PatternSet::new(&job.artifact_patterns)
    }
    .map_err(|e| ArtifactError::InvalidPattern(e.to_string()))?;

    let entries = tokio::task::spawn_blocking(move || {
        ingest::extract_matching(Cursor::new(archive), &patterns)
    })
    .await
    .map_err(|e| ArtifactError::Extraction(e.to_string()))??;

    tracing::info!(
        "Artifact upload for job {} from {}: {} matching entries",
        guid,
        runner_id,
        entries.len()
    );

    let mut report = IngestReport::new(test_run_id);
    for entry in entries {
        if state.shutdown.is_cancelled() {
            tracing::warn!("Shutdown requested, stopping ingestion for job {}", guid);
            break;
        }

        let outcome = match entry.data {
            Ok(bytes) => {
                match ingest_entry(state, test_run_id, &entry.path, bytes, job.result_format).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        tracing::warn!("Failed to import artifact entry {}: {}", entry.path, e);
                        EntryOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
            Err(e) => EntryOutcome::Failed {
                error: e.to_string(),
            },
        };
        report.record(entry.path, outcome);
    }

    state
        .events
        .publish(DomainEvent::ArtifactsImported {
            guid,
            test_run_id,
            summary: report.totals,
        })
        .await;

    Ok(report)
}

async fn ingest_entry(
    state: &AppState,
    test_run_id: i64,
    path: &str,
    bytes: Vec<u8>,
    hint: Option<ResultFormat>,
) -> std::result::Result<EntryOutcome, ImportError> {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => {
            tracing::warn!("Artifact entry {} is not valid UTF-8", path);
            return Ok(EntryOutcome::Failed {
                error: "entry is not valid UTF-8".to_string(),
            });
        }
    };
    let content = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let Some(format) = state.codecs.detect(path, content, hint) else {
        tracing::debug!("No codec for artifact entry {}", path);
        return Ok(EntryOutcome::Unsupported);
    };

    let result = match state.codecs.parse(format, content) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Failed to parse artifact entry {}: {}", path, e);
            return Ok(EntryOutcome::Failed {
                error: e.to_string(),
            });
        }
    };

    let summary = import::import_results(state, test_run_id, &result).await?;
    Ok(EntryOutcome::Imported { format, summary })
}
