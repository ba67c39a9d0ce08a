//! Job Queue & Dispatcher
//!
//! Queued jobs wait in a FIFO per tenant. A long-polling runner takes the
//! oldest job whose selector it satisfies, or parks until a new job is
//! enqueued, its timeout elapses, or the server shuts down.
//!
//! The queue lock is held across the storage claim, so a job leaves the
//! queue only once it is persisted as `Dispatched`, and no two runners
//! can ever receive the same job.

use chrono::Utc;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use verdict_core::domain::job::{Job, JobStatus};

use crate::repository::{JobRepository, StoreResult};

#[derive(Default)]
struct TenantQueue {
    pending: tokio::sync::Mutex<VecDeque<Job>>,
    wake: Notify,
}

pub struct Dispatcher {
    jobs: Arc<dyn JobRepository>,
    queues: Mutex<HashMap<String, Arc<TenantQueue>>>,
}

impl Dispatcher {
    pub fn new(jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            jobs,
            queues: Mutex::new(HashMap::new()),
        }
    }

    fn queue(&self, tenant_id: &str) -> Arc<TenantQueue> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.entry(tenant_id.to_string()).or_default().clone()
    }

    /// Appends a queued job and wakes every runner parked on its tenant.
    pub async fn enqueue(&self, job: Job) {
        let queue = self.queue(&job.tenant_id);
        tracing::debug!("Enqueued job {} for tenant {}", job.guid, job.tenant_id);
        queue.pending.lock().await.push_back(job);
        queue.wake.notify_waiters();
    }

    /// Loads jobs that were still queued when the server last stopped.
    pub async fn restore(&self, mut jobs: Vec<Job>) {
        jobs.retain(|j| j.status == JobStatus::Queued);
        jobs.sort_by_key(|j| j.created_at);

        let mut by_tenant: HashMap<String, Vec<Job>> = HashMap::new();
        for job in jobs {
            by_tenant.entry(job.tenant_id.clone()).or_default().push(job);
        }

        for (tenant_id, jobs) in by_tenant {
            let queue = self.queue(&tenant_id);
            let count = jobs.len();
            queue.pending.lock().await.extend(jobs);
            queue.wake.notify_waiters();
            tracing::info!("Restored {} queued jobs for tenant {}", count, tenant_id);
        }
    }

    /// Removes a job from its queue; returns whether it was still there.
    pub async fn withdraw(&self, tenant_id: &str, guid: Uuid) -> bool {
        let queue = self.queue(tenant_id);
        let mut pending = queue.pending.lock().await;
        match pending.iter().position(|j| j.guid == guid) {
            Some(index) => {
                pending.remove(index);
                true
            }
            None => false,
        }
    }

    pub async fn queued_len(&self, tenant_id: &str) -> usize {
        self.queue(tenant_id).pending.lock().await.len()
    }

    /// Hands the oldest matching job to `runner_id`, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout or when `cancel` fires.
    pub async fn try_dispatch(
        &self,
        tenant_id: &str,
        runner_id: &str,
        tags: &BTreeSet<String>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> StoreResult<Option<Job>> {
        let queue = self.queue(tenant_id);
        let deadline = Instant::now() + timeout;

        loop {
            if cancel.is_cancelled() {
                return Ok(None);
            }

            // Register before looking so an enqueue in between still wakes us.
            let notified = queue.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(job) = self.take_matching(&queue, runner_id, tags).await? {
                tracing::info!("Dispatched job {} to runner {}", job.guid, runner_id);
                return Ok(Some(job));
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(None),
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn take_matching(
        &self,
        queue: &TenantQueue,
        runner_id: &str,
        tags: &BTreeSet<String>,
    ) -> StoreResult<Option<Job>> {
        let mut pending = queue.pending.lock().await;
        let mut index = 0;

        while index < pending.len() {
            if !pending[index].matches_runner(tags) {
                index += 1;
                continue;
            }

            let now = Utc::now();
            let guid = pending[index].guid;
            let claimed = self.jobs.mark_dispatched(guid, runner_id, now).await?;
            let Some(mut job) = pending.remove(index) else {
                break;
            };

            if claimed {
                job.status = JobStatus::Dispatched;
                job.dispatched_at = Some(now);
                job.runner_id = Some(runner_id.to_string());
                return Ok(Some(job));
            }

            // Canceled or otherwise moved on since it was queued.
            tracing::debug!("Dropped stale queue entry {}", guid);
        }

        Ok(None)
    }
}
