//! Core domain types
//!
//! This module contains the core domain structures used across Verdict services.
//! These types are shared between the orchestrator (which persists and dispatches
//! them) and runners (which execute jobs and report back).

pub mod job;
pub mod pipeline;
pub mod result;
pub mod runner;
pub mod test_run;
