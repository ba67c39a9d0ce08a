//! Data Transfer Objects
//!
//! Request/response shapes exchanged between runners, management callers and
//! the orchestrator. JSON field names are camelCase on the wire.

pub mod artifact;
pub mod job;
pub mod pipeline;
pub mod runner;
pub mod test_run;
