//! Shared application state
//!
//! One `AppState` is built at startup and cloned into every request.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use verdict_core::domain::job::JobStatus;

use crate::codec::CodecRegistry;
use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::events::{AuditLogHandler, EventBus, EventHandler, RunnerActivityHandler};
use crate::keyed_lock::KeyedLocks;
use crate::repository::{Store, StoreResult};
use crate::service::sequence::SequenceGenerator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Store,
    pub sequences: Arc<SequenceGenerator>,
    pub dispatcher: Arc<Dispatcher>,
    pub codecs: Arc<CodecRegistry>,
    pub events: EventBus,
    /// Serializes status updates per job
    pub job_locks: Arc<KeyedLocks<Uuid>>,
    /// Serializes result imports per test run
    pub run_locks: Arc<KeyedLocks<i64>>,
    /// Serializes status recomputation per pipeline
    pub pipeline_locks: Arc<KeyedLocks<i64>>,
    /// Cancelled when the server begins shutting down
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, store: Store, events: EventBus) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(store.jobs.clone()));
        Self {
            config: Arc::new(config),
            store,
            sequences: Arc::new(SequenceGenerator::new()),
            dispatcher,
            codecs: Arc::new(CodecRegistry::default()),
            events,
            job_locks: Arc::new(KeyedLocks::default()),
            run_locks: Arc::new(KeyedLocks::default()),
            pipeline_locks: Arc::new(KeyedLocks::default()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Handlers every deployment registers
    pub fn default_handlers(store: &Store) -> Vec<Arc<dyn EventHandler>> {
        vec![
            Arc::new(AuditLogHandler),
            Arc::new(RunnerActivityHandler::new(store.runners.clone())),
        ]
    }

    /// Puts jobs still `Queued` in storage back into the dispatcher.
    pub async fn restore_queue(&self) -> StoreResult<usize> {
        let queued = self.store.jobs.find_by_status(JobStatus::Queued).await?;
        let count = queued.len();
        self.dispatcher.restore(queued).await;
        Ok(count)
    }
}
