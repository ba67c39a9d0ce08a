//! Domain events
//!
//! Services publish events after a state change has been persisted.
//! Handlers run in registration order; a failing handler is logged and
//! never affects the publisher or the handlers after it.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;
use verdict_core::domain::job::JobStatus;
use verdict_core::domain::pipeline::PipelineStatus;
use verdict_core::dto::test_run::ImportSummary;

use crate::repository::RunnerRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    JobEnqueued {
        guid: Uuid,
        pipeline_id: i64,
        tenant_id: String,
    },
    JobStatusChanged {
        guid: Uuid,
        pipeline_id: i64,
        runner_id: Option<String>,
        from: JobStatus,
        to: JobStatus,
    },
    PipelineStatusChanged {
        pipeline_id: i64,
        from: PipelineStatus,
        to: PipelineStatus,
    },
    /// A job linked to a test run finished; its artifacts may follow.
    ArtifactsExpected {
        guid: Uuid,
        pipeline_id: i64,
        test_run_id: i64,
    },
    ArtifactsImported {
        guid: Uuid,
        test_run_id: i64,
        summary: ImportSummary,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::JobEnqueued { .. } => "job_enqueued",
            DomainEvent::JobStatusChanged { .. } => "job_status_changed",
            DomainEvent::PipelineStatusChanged { .. } => "pipeline_status_changed",
            DomainEvent::ArtifactsExpected { .. } => "artifacts_expected",
            DomainEvent::ArtifactsImported { .. } => "artifacts_imported",
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Fans events out to the registered handlers
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
    queue: Option<mpsc::UnboundedSender<DomainEvent>>,
}

impl EventBus {
    /// A bus that runs handlers inline inside `publish`.
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        Self {
            handlers: Arc::new(handlers),
            queue: None,
        }
    }

    /// A bus whose handlers run on a background worker task.
    ///
    /// The worker exits once every clone of the bus has been dropped.
    pub fn with_worker(handlers: Vec<Arc<dyn EventHandler>>) -> (Self, JoinHandle<()>) {
        let handlers = Arc::new(handlers);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker_handlers = handlers.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch(&worker_handlers, &event).await;
            }
            tracing::debug!("Event worker stopped");
        });

        let bus = Self {
            handlers,
            queue: Some(tx),
        };
        (bus, worker)
    }

    pub async fn publish(&self, event: DomainEvent) {
        if let Some(queue) = &self.queue {
            match queue.send(event) {
                Ok(()) => return,
                Err(mpsc::error::SendError(event)) => {
                    tracing::warn!("Event worker gone, handling {} inline", event.kind());
                    dispatch(&self.handlers, &event).await;
                    return;
                }
            }
        }
        dispatch(&self.handlers, &event).await;
    }
}

async fn dispatch(handlers: &[Arc<dyn EventHandler>], event: &DomainEvent) {
    for handler in handlers {
        if let Err(e) = handler.handle(event).await {
            tracing::error!(
                "Event handler {} failed on {}: {:#}",
                handler.name(),
                event.kind(),
                e
            );
        }
    }
}

// =============================================================================
// Built-in handlers
// =============================================================================

/// Writes every event to the log
pub struct AuditLogHandler;

#[async_trait]
impl EventHandler for AuditLogHandler {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        match event {
            DomainEvent::JobEnqueued {
                guid,
                pipeline_id,
                tenant_id,
            } => {
                tracing::info!(%guid, pipeline_id, tenant_id = %tenant_id, "job enqueued");
            }
            DomainEvent::JobStatusChanged {
                guid,
                pipeline_id,
                runner_id,
                from,
                to,
            } => {
                tracing::info!(
                    %guid,
                    pipeline_id,
                    runner_id = runner_id.as_deref().unwrap_or("-"),
                    %from,
                    %to,
                    "job status changed"
                );
            }
            DomainEvent::PipelineStatusChanged {
                pipeline_id,
                from,
                to,
            } => {
                tracing::info!(pipeline_id, %from, %to, "pipeline status changed");
            }
            DomainEvent::ArtifactsExpected {
                guid,
                pipeline_id,
                test_run_id,
            } => {
                tracing::info!(%guid, pipeline_id, test_run_id, "artifacts expected");
            }
            DomainEvent::ArtifactsImported {
                guid,
                test_run_id,
                summary,
            } => {
                tracing::info!(
                    %guid,
                    test_run_id,
                    created = summary.created,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "artifacts imported"
                );
            }
        }
        Ok(())
    }
}

/// Keeps `last_seen` fresh for runners that report on their jobs
pub struct RunnerActivityHandler {
    runners: Arc<dyn RunnerRepository>,
}

impl RunnerActivityHandler {
    pub fn new(runners: Arc<dyn RunnerRepository>) -> Self {
        Self { runners }
    }
}

#[async_trait]
impl EventHandler for RunnerActivityHandler {
    fn name(&self) -> &'static str {
        "runner_activity"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        if let DomainEvent::JobStatusChanged {
            runner_id: Some(runner_id),
            ..
        } = event
        {
            self.runners.touch(runner_id, Utc::now()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
            self.seen.lock().unwrap().push(event.kind());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl EventHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    fn enqueued() -> DomainEvent {
        DomainEvent::JobEnqueued {
            guid: Uuid::new_v4(),
            pipeline_id: 1,
            tenant_id: "acme".to_string(),
        }
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_later_handlers() {
        let recorder = Arc::new(Recorder::default());
        let bus = EventBus::new(vec![Arc::new(Failing), recorder.clone()]);

        bus.publish(enqueued()).await;

        assert_eq!(*recorder.seen.lock().unwrap(), vec!["job_enqueued"]);
    }

    #[tokio::test]
    async fn test_worker_delivers_in_order() {
        let recorder = Arc::new(Recorder::default());
        let (bus, worker) = EventBus::with_worker(vec![recorder.clone()]);

        bus.publish(enqueued()).await;
        bus.publish(DomainEvent::PipelineStatusChanged {
            pipeline_id: 1,
            from: PipelineStatus::Running,
            to: PipelineStatus::Succeeded,
        })
        .await;
        drop(bus);
        worker.await.unwrap();

        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["job_enqueued", "pipeline_status_changed"]
        );
    }
}
