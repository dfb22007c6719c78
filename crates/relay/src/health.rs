use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use {botline_common::types::EndpointId, serde::Serialize, tracing::warn};

/// Time-windowed circuit breaker per endpoint.
///
/// An endpoint is excluded from dispatch for a fixed cooldown after a total
/// failure (silence past the deadline, or a rejected send). `blocked` is a
/// pure function of the stored failure instant — the exclusion lapses on its
/// own, there is no unblock step and no background sweeping. Entries are
/// created lazily and never deleted; a stale entry is harmless.
#[derive(Clone)]
pub struct EndpointHealthTracker {
    cooldown: Duration,
    failures: Arc<Mutex<HashMap<EndpointId, Instant>>>,
}

/// Per-endpoint health line for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealthReport {
    pub endpoint: EndpointId,
    pub blocked: bool,
    /// Seconds until the block lapses; 0 when not blocked.
    pub cooldown_remaining_secs: u64,
}

impl EndpointHealthTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record a total failure: the endpoint is excluded until the cooldown
    /// lapses.
    pub fn record_failure(&self, endpoint: &EndpointId) {
        self.record_failure_at(endpoint, Instant::now());
    }

    fn record_failure_at(&self, endpoint: &EndpointId, now: Instant) {
        warn!(
            endpoint = %endpoint,
            cooldown_secs = self.cooldown.as_secs(),
            "endpoint failed, excluding from dispatch"
        );
        self.lock().insert(endpoint.clone(), now);
    }

    /// Whether the endpoint is currently excluded.
    pub fn is_blocked(&self, endpoint: &EndpointId) -> bool {
        self.is_blocked_at(endpoint, Instant::now())
    }

    fn is_blocked_at(&self, endpoint: &EndpointId, now: Instant) -> bool {
        match self.lock().get(endpoint) {
            Some(last) => now.duration_since(*last) < self.cooldown,
            None => false,
        }
    }

    /// Health lines for the given endpoints, in the given order.
    pub fn snapshot(&self, endpoints: &[EndpointId]) -> Vec<EndpointHealthReport> {
        let now = Instant::now();
        let failures = self.lock();
        endpoints
            .iter()
            .map(|endpoint| {
                let remaining = failures
                    .get(endpoint)
                    .map(|last| self.cooldown.saturating_sub(now.duration_since(*last)))
                    .unwrap_or_default();
                EndpointHealthReport {
                    endpoint: endpoint.clone(),
                    blocked: !remaining.is_zero(),
                    cooldown_remaining_secs: remaining.as_secs(),
                }
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EndpointId, Instant>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
