//! Test run aggregate types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::result::Verdict;

/// A test run that imported results are merged into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: i64,
    pub number: i64,
    pub tenant_id: String,
    pub project_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Catalog entry giving a test case a stable id within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: i64,
    pub tenant_id: String,
    pub project_id: i64,
    pub suite_name: String,
    pub name: String,
}

/// The outcome of one test case within one test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseRun {
    pub id: i64,
    pub test_run_id: i64,
    pub test_case_id: i64,
    pub suite_name: String,
    pub case_name: String,
    pub verdict: Verdict,
    pub duration_ms: i64,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}
