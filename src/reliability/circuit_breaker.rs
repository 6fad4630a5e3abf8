use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::models::BreakerSnapshot;

#[derive(Debug, Clone, Copy, Default)]
struct CircuitBreakerState {
    failure_count: u32,
    last_failure_at: Option<i64>,
    is_open: bool,
}

/// Circuit breakers keyed by logical endpoint name.
///
/// A breaker opens once `failure_count >= threshold` and clears on its own when
/// `cooldown_ms` has passed since the last failure. The failure count survives
/// the cooldown, so a single further failure re-opens it.
pub struct CircuitBreakers {
    threshold: u32,
    cooldown_ms: i64,
    states: Mutex<HashMap<String, CircuitBreakerState>>,
}

impl CircuitBreakers {
    pub fn new(threshold: u32, cooldown_ms: i64) -> Self {
        Self { threshold, cooldown_ms, states: Mutex::new(HashMap::new()) }
    }

    /// Whether calls to `endpoint` should be skipped right now.
    pub fn is_open(&self, endpoint: &str, now: i64) -> bool {
        let mut states = self.states.lock();
        let Some(state) = states.get_mut(endpoint) else {
            return false;
        };
        if !state.is_open {
            return false;
        }

        let elapsed = now - state.last_failure_at.unwrap_or(now);
        if elapsed < self.cooldown_ms {
            true
        } else {
            info!("Circuit breaker for {endpoint} cooled down after {elapsed}ms");
            state.is_open = false;
            false
        }
    }

    pub fn record_success(&self, endpoint: &str) {
        let mut states = self.states.lock();
        if let Some(state) = states.get_mut(endpoint) {
            state.failure_count = 0;
            state.is_open = false;
        }
    }

    pub fn record_failure(&self, endpoint: &str, now: i64) {
        let mut states = self.states.lock();
        let state = states.entry(endpoint.to_string()).or_default();
        state.failure_count += 1;
        state.last_failure_at = Some(now);
        if state.failure_count >= self.threshold && !state.is_open {
            warn!(
                "Circuit breaker for {endpoint} tripped after {} failures, cooling down {}ms",
                state.failure_count, self.cooldown_ms
            );
            state.is_open = true;
        }
    }

    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let states = self.states.lock();
        let mut snapshots: Vec<BreakerSnapshot> = states
            .iter()
            .map(|(endpoint, s)| BreakerSnapshot {
                endpoint: endpoint.clone(),
                is_open: s.is_open,
                failures: s.failure_count,
                last_failure: s.last_failure_at,
            })
            .collect();
        snapshots.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        snapshots
    }
}
