//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories, the dispatcher and the event
//! bus, and contain the domain rules.

pub mod artifact;
pub mod import;
pub mod job;
pub mod pipeline;
pub mod runner;
pub mod sequence;
pub mod test_run;

// Re-export for convenience
pub use artifact as artifact_service;
pub use import as import_service;
pub use job as job_service;
pub use pipeline as pipeline_service;
pub use runner as runner_service;
pub use test_run as test_run_service;

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::Config;
    use crate::events::EventBus;
    use crate::repository::Store;
    use crate::state::AppState;

    pub fn state() -> AppState {
        AppState::new(Config::default(), Store::memory(), EventBus::new(Vec::new()))
    }
}
