//! Runner domain model
//!
//! Represents an agent that long-polls the orchestrator for jobs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A runner that can execute jobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runner {
    /// Caller-supplied identifier; reconnecting with the same id replaces the record
    pub id: String,

    /// Display name
    pub name: String,

    /// Tags matched against job selectors
    pub tags: BTreeSet<String>,

    /// Tenant the runner connected under
    pub tenant_id: String,

    /// Last time this runner connected, polled, or reported on a job
    pub last_seen: DateTime<Utc>,
}

impl Runner {
    /// A runner is healthy while it has been seen within `stale_after`.
    pub fn is_healthy(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        now.signed_duration_since(self.last_seen) <= stale_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_goes_stale() {
        let now = Utc::now();
        let runner = Runner {
            id: "r1".to_string(),
            name: "builder".to_string(),
            tags: BTreeSet::new(),
            tenant_id: "acme".to_string(),
            last_seen: now - Duration::seconds(90),
        };

        assert!(!runner.is_healthy(now, Duration::seconds(60)));
        assert!(runner.is_healthy(now, Duration::seconds(120)));
    }
}
