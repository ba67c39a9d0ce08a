//! Sequence Generator
//!
//! Hands out per-project numbers for pipelines and test runs. The first
//! request for a key seeds the counter from storage; later requests only
//! touch the in-process cache. All callers share one lock, so numbers are
//! never duplicated or skipped within a process.

use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;

/// Entities numbered per project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityType {
    Pipeline,
    TestRun,
}

impl EntityType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Pipeline => "pipeline",
            EntityType::TestRun => "testrun",
        }
    }
}

#[derive(Default)]
pub struct SequenceGenerator {
    last_used: Mutex<HashMap<String, i64>>,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next number for `(tenant_id, project_id, entity)`.
    ///
    /// `fallback` returns the highest number already stored for the key. It
    /// runs only on a cache miss; when it fails nothing is cached and the
    /// next call retries it.
    pub async fn next<F, Fut, E>(
        &self,
        tenant_id: &str,
        project_id: i64,
        entity: EntityType,
        fallback: F,
    ) -> Result<i64, E>
    where
        F: FnOnce(String, i64) -> Fut,
        Fut: Future<Output = Result<i64, E>>,
    {
        let key = format!("{}:{}:{}", tenant_id, project_id, entity.as_str());
        let mut last_used = self.last_used.lock().await;

        let next = match last_used.get(&key) {
            Some(last) => last + 1,
            None => fallback(tenant_id.to_string(), project_id).await? + 1,
        };

        last_used.insert(key, next);
        Ok(next)
    }

    /// Forgets every cached counter, as after a restart.
    pub async fn reset(&self) {
        self.last_used.lock().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_seeds_from_fallback_then_increments() {
        let sequences = SequenceGenerator::new();
        let lookups = AtomicUsize::new(0);
        let counter = &lookups;

        for expected in [8, 9, 10] {
            let n = sequences
                .next("acme", 1, EntityType::Pipeline, |_, _| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(7)
                })
                .await
                .unwrap();
            assert_eq!(n, expected);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let sequences = SequenceGenerator::new();
        let seed = |_: String, _: i64| async { Ok::<_, String>(0) };

        assert_eq!(sequences.next("acme", 1, EntityType::Pipeline, seed).await, Ok(1));
        assert_eq!(sequences.next("acme", 1, EntityType::TestRun, seed).await, Ok(1));
        assert_eq!(sequences.next("acme", 2, EntityType::Pipeline, seed).await, Ok(1));
        assert_eq!(sequences.next("globex", 1, EntityType::Pipeline, seed).await, Ok(1));
        assert_eq!(sequences.next("acme", 1, EntityType::Pipeline, seed).await, Ok(2));
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_distinct_gapless_numbers() {
        let sequences = Arc::new(SequenceGenerator::new());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let sequences = sequences.clone();
            handles.push(tokio::spawn(async move {
                sequences
                    .next("acme", 1, EntityType::Pipeline, |_, _| async {
                        tokio::task::yield_now().await;
                        Ok::<_, String>(0)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut numbers = Vec::new();
        for handle in handles {
            numbers.push(handle.await.unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failed_lookup_is_not_cached() {
        let sequences = SequenceGenerator::new();

        let failed = sequences
            .next("acme", 1, EntityType::TestRun, |_, _| async {
                Err::<i64, _>("database down".to_string())
            })
            .await;
        assert!(failed.is_err());

        let n = sequences
            .next("acme", 1, EntityType::TestRun, |_, _| async { Ok::<_, String>(41) })
            .await
            .unwrap();
        assert_eq!(n, 42);
    }

    #[tokio::test]
    async fn test_reset_reseeds_from_storage() {
        let sequences = SequenceGenerator::new();
        let seed = |_: String, _: i64| async { Ok::<_, String>(3) };

        assert_eq!(sequences.next("acme", 1, EntityType::Pipeline, seed).await, Ok(4));
        assert_eq!(sequences.next("acme", 1, EntityType::Pipeline, seed).await, Ok(5));

        sequences.reset().await;
        assert_eq!(sequences.next("acme", 1, EntityType::Pipeline, seed).await, Ok(4));
    }
}
