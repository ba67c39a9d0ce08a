//! Scheduler layer for the runner
//!
//! This layer long-polls the orchestrator for jobs and coordinates their
//! execution, from the `Running` report to the artifact upload.

pub mod poller;

pub use poller::JobPoller;
