//! Result Importer
//!
//! Merges a canonical result into a test run. A case is identified by its
//! `(suite, case)` name pair: known cases are overwritten, new ones are
//! catalogued and added, and cases absent from the input are left alone.
//! Importing the same result twice leaves the run unchanged.

use chrono::Utc;
use std::collections::HashMap;
use verdict_core::domain::result::CanonicalResult;
use verdict_core::domain::test_run::TestCaseRun;
use verdict_core::dto::test_run::ImportSummary;

use crate::repository::{NewTestCaseRun, StoreError};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("test run not found: {0}")]
    TestRunNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub async fn import_results(
    state: &AppState,
    test_run_id: i64,
    result: &CanonicalResult,
) -> Result<ImportSummary, ImportError> {
    let _guard = state.run_locks.lock(test_run_id).await;

    let run = state
        .store
        .test_runs
        .find_by_id(test_run_id)
        .await?
        .ok_or(ImportError::TestRunNotFound(test_run_id))?;

    let mut existing: HashMap<(String, String), TestCaseRun> = state
        .store
        .test_runs
        .list_case_runs(test_run_id)
        .await?
        .into_iter()
        .map(|r| ((r.suite_name.clone(), r.case_name.clone()), r))
        .collect();

    let mut summary = ImportSummary::default();

    for suite in &result.suites {
        for case in &suite.cases {
            if case.name.trim().is_empty() {
                summary.skipped += 1;
                continue;
            }

            let key = (suite.name.clone(), case.name.clone());
            if let Some(stored) = existing.get_mut(&key) {
                stored.verdict = case.verdict;
                stored.duration_ms = case.duration_ms;
                stored.message = case.message.clone();
                stored.updated_at = Utc::now();
                state.store.test_runs.update_case_run(stored).await?;
                summary.updated += 1;
                continue;
            }

            let test_case = state
                .store
                .test_runs
                .find_or_create_test_case(&run.tenant_id, run.project_id, &suite.name, &case.name)
                .await?;

            let created = state
                .store
                .test_runs
                .insert_case_run(NewTestCaseRun {
                    test_run_id,
                    test_case_id: test_case.id,
                    suite_name: suite.name.clone(),
                    case_name: case.name.clone(),
                    verdict: case.verdict,
                    duration_ms: case.duration_ms,
                    message: case.message.clone(),
                })
                .await?;
            existing.insert(key, created);
            summary.created += 1;
        }
    }

    tracing::info!(
        "Imported into test run {}: {} created, {} updated, {} skipped",
        test_run_id,
        summary.created,
        summary.updated,
        summary.skipped
    );

    Ok(summary)
}
