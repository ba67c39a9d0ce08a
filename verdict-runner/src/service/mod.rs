//! Service layer
//!
//! Services contain business logic for the runner: running job scripts and
//! packing the artifacts they leave behind.
//!
//! Execution is trait-based so the poller can be driven by another executor.

mod artifacts;
mod execution;

pub use artifacts::{collect_artifacts, job_patterns};
pub use execution::{ExecutionOutcome, ExecutionService, ShellExecutionService};
