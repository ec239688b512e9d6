//! # Circuit breaker manager.
//!
//! [`CircuitBreaker`] owns one [`CircuitRecord`] state machine per circuit id
//! and mediates every check/record call through the store:
//!
//! ```text
//! check / record_success / record_failure
//!   └─► acquire per-circuit lock (bounded wait)
//!         └─► load record (default CLOSED if missing)
//!               └─► pure transition (record.rs)
//!                     └─► save if changed ──► release lock
//! ```
//!
//! The lock is scoped to a single call, never a whole retry loop. Unknown
//! circuit ids are created lazily; persistence failures propagate because a
//! silently lost state change could mask a cascading failure.

use chrono::Utc;
use std::time::Duration;

use crate::breaker::{CircuitRecord, CircuitState, Gate};
use crate::error::RecoveryError;
use crate::policies::BreakerPolicy;
use crate::store::{CircuitLock, CircuitStore, StateDir};

/// Per-circuit fail-fast gate with durable state.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    store: CircuitStore,
    state_dir: StateDir,
    policy: BreakerPolicy,
    lock_wait: Duration,
}

impl CircuitBreaker {
    /// Builds a breaker over the given state directory.
    pub fn new(
        state_dir: &StateDir,
        policy: BreakerPolicy,
        lock_wait: Duration,
    ) -> Result<Self, RecoveryError> {
        Ok(Self {
            store: CircuitStore::open(state_dir.circuits_dir())?,
            state_dir: state_dir.clone(),
            policy,
            lock_wait,
        })
    }

    /// Pre-attempt check for `circuit_id`.
    ///
    /// Side-effecting only when an open circuit's probe window has elapsed:
    /// that transition (OPEN → HALF_OPEN) happens here on the read path and
    /// is persisted before returning.
    pub async fn check(&self, circuit_id: &str) -> Result<Gate, RecoveryError> {
        let _lock = self.lock(circuit_id).await?;
        let mut record = self.store.load(circuit_id)?;
        let before = record.state;

        let gate = record.gate(&self.policy, Utc::now());
        if record.state != before {
            tracing::info!(circuit = circuit_id, "circuit half-open, admitting probe");
            self.store.save(&record)?;
        }
        Ok(gate)
    }

    /// Records a successful attempt and persists the updated record.
    pub async fn record_success(&self, circuit_id: &str) -> Result<CircuitState, RecoveryError> {
        let _lock = self.lock(circuit_id).await?;
        let mut record = self.store.load(circuit_id)?;
        let before = record.state;

        record.note_success(&self.policy, Utc::now());
        self.store.save(&record)?;

        if before != record.state {
            tracing::info!(circuit = circuit_id, "circuit closed after probation");
        }
        Ok(record.state)
    }

    /// Records a failed attempt and persists the updated record.
    pub async fn record_failure(&self, circuit_id: &str) -> Result<CircuitState, RecoveryError> {
        let _lock = self.lock(circuit_id).await?;
        let mut record = self.store.load(circuit_id)?;
        let before = record.state;

        record.note_failure(&self.policy, Utc::now());
        self.store.save(&record)?;

        if before != record.state {
            tracing::warn!(
                circuit = circuit_id,
                failures = record.failure_count,
                "circuit tripped open"
            );
        }
        Ok(record.state)
    }

    /// Current state and counters for every known circuit. Read-only.
    pub fn stats(&self) -> Result<Vec<CircuitRecord>, RecoveryError> {
        self.store.list()
    }

    /// The thresholds this breaker runs with.
    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    async fn lock(&self, circuit_id: &str) -> Result<CircuitLock, RecoveryError> {
        CircuitLock::acquire(
            &self.state_dir.lock_path(circuit_id),
            circuit_id,
            self.lock_wait,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use tempfile::TempDir;

    const LOCK_WAIT: Duration = Duration::from_secs(1);

    fn breaker(state: &StateDir) -> CircuitBreaker {
        CircuitBreaker::new(state, BreakerPolicy::default(), LOCK_WAIT).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_circuit_is_allowed_and_lazy() {
        let tmp = TempDir::new().unwrap();
        let state = StateDir::open(tmp.path()).unwrap();
        let breaker = breaker(&state);

        assert!(breaker.check("fresh").await.unwrap().is_allowed());
        // check() alone does not persist anything.
        assert!(breaker.stats().unwrap().is_empty());

        breaker.record_failure("fresh").await.unwrap();
        let stats = breaker.stats().unwrap();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].failure_count, 1);
    }

    #[tokio::test]
    async fn test_threshold_trips_and_blocks() {
        let tmp = TempDir::new().unwrap();
        let state = StateDir::open(tmp.path()).unwrap();
        let breaker = breaker(&state);

        breaker.record_failure("api").await.unwrap();
        breaker.record_failure("api").await.unwrap();
        assert!(breaker.check("api").await.unwrap().is_allowed());

        let st = breaker.record_failure("api").await.unwrap();
        assert_eq!(st, CircuitState::Open);
        assert!(!breaker.check("api").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_state_survives_manager_restart() {
        let tmp = TempDir::new().unwrap();
        let state = StateDir::open(tmp.path()).unwrap();
        {
            let breaker = breaker(&state);
            for _ in 0..3 {
                breaker.record_failure("api").await.unwrap();
            }
        }

        // A fresh manager (new process, same state dir) still fails fast.
        let state2 = StateDir::open(tmp.path()).unwrap();
        let breaker2 = breaker(&state2);
        assert!(!breaker2.check("api").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_probe_window_then_close() {
        let tmp = TempDir::new().unwrap();
        let state = StateDir::open(tmp.path()).unwrap();
        let breaker = breaker(&state);

        for _ in 0..3 {
            breaker.record_failure("api").await.unwrap();
        }

        // Backdate the trip so the probe window has elapsed.
        let store = CircuitStore::open(state.circuits_dir()).unwrap();
        let mut rec = store.load("api").unwrap();
        rec.opened_at = Some(Utc::now() - TimeDelta::seconds(61));
        store.save(&rec).unwrap();

        assert!(breaker.check("api").await.unwrap().is_allowed());
        assert_eq!(store.load("api").unwrap().state, CircuitState::HalfOpen);

        assert_eq!(
            breaker.record_success("api").await.unwrap(),
            CircuitState::HalfOpen
        );
        assert_eq!(
            breaker.record_success("api").await.unwrap(),
            CircuitState::Closed
        );
        let rec = store.load("api").unwrap();
        assert_eq!(rec.failure_count, 0);
        assert_eq!(rec.success_count, 0);
    }

    #[tokio::test]
    async fn test_circuits_are_independent() {
        let tmp = TempDir::new().unwrap();
        let state = StateDir::open(tmp.path()).unwrap();
        let breaker = breaker(&state);

        for _ in 0..3 {
            breaker.record_failure("a").await.unwrap();
        }
        breaker.record_failure("b").await.unwrap();
        breaker.record_success("b").await.unwrap();

        let stats = breaker.stats().unwrap();
        let a = stats.iter().find(|r| r.circuit_id == "a").unwrap();
        let b = stats.iter().find(|r| r.circuit_id == "b").unwrap();
        assert_eq!(a.state, CircuitState::Open);
        assert_eq!(b.state, CircuitState::Closed);
        assert_eq!(b.failure_count, 0);
        assert!(!breaker.check("a").await.unwrap().is_allowed());
        assert!(breaker.check("b").await.unwrap().is_allowed());
    }
}
