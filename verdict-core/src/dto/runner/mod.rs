//! Runner DTOs
//!
//! Data transfer objects for runner-related operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::runner::Runner;

/// Request sent by a runner when it connects
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRunner {
    /// Unique identifier for the runner
    pub id: String,

    /// Display name
    pub name: String,

    /// Tags used for job selector matching
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// A runner together with its current health
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerView {
    #[serde(flatten)]
    pub runner: Runner,

    pub healthy: bool,
}
