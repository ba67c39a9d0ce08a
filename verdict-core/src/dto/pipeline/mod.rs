//! Pipeline DTOs

use serde::{Deserialize, Serialize};

use crate::domain::pipeline::PipelineStatus;
use crate::dto::job::CreateJob;

/// Request to create a pipeline and queue its jobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePipeline {
    pub external_identifier: Option<String>,
    pub cicd_system: Option<String>,
    pub test_run_id: Option<i64>,
    #[serde(default)]
    pub jobs: Vec<CreateJob>,
}

/// Search filters for pipelines; unset fields match everything
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineFilter {
    pub project_id: Option<i64>,
    pub status: Option<PipelineStatus>,
    pub external_identifier: Option<String>,
    pub cicd_system: Option<String>,
}

/// A page of search results
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}
