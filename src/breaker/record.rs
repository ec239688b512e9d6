//! # Per-circuit state machine.
//!
//! [`CircuitRecord`] is the persisted unit of fail-fast protection: one JSON
//! document per circuit id. All transition logic lives here as pure methods
//! over an injected `now`, so the state machine is unit-testable without
//! touching the filesystem or the wall clock; the
//! [`CircuitBreaker`](crate::breaker::CircuitBreaker) manager wraps these
//! methods with locking and persistence.
//!
//! ```text
//!                 record_failure × failure_threshold
//!        CLOSED ────────────────────────────────────► OPEN
//!          ▲                                           │
//!          │ record_success × success_threshold        │ gate() after
//!          │                                           │ half_open_after
//!          │                                           ▼
//!          └─────────────────────────────────────── HALF_OPEN
//!                          ▲            │
//!                          └────────────┘
//!                     record_failure → OPEN (single failure reopens)
//! ```
//!
//! Counter invariants:
//! - entering OPEN zeroes `success_count`;
//! - entering CLOSED zeroes both counters;
//! - a failure while HALF_OPEN always reopens, `failure_count` is retained
//!   and incremented for observability only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::policies::BreakerPolicy;

/// State of one circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Attempts permitted; consecutive failures are counted.
    Closed,
    /// Attempts blocked (fail fast) until the probe window opens.
    Open,
    /// Probation: attempts permitted, consecutive successes are counted.
    HalfOpen,
}

impl CircuitState {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Verdict of a pre-attempt circuit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The attempt may proceed.
    Allowed,
    /// The circuit is open; fail fast without attempting.
    Blocked {
        /// Time remaining until a half-open probe becomes eligible.
        until_probe: Duration,
    },
}

impl Gate {
    /// Whether the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Gate::Allowed)
    }
}

/// Persisted state of one circuit.
///
/// Created lazily with [`CircuitRecord::new`] on the first check/record call
/// for an unknown id; never explicitly deleted (a missing backing record is
/// re-created with defaults).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircuitRecord {
    /// The circuit id, typically a task id.
    pub circuit_id: String,
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures since the last reset.
    pub failure_count: u32,
    /// Consecutive successes while half-open.
    pub success_count: u32,
    /// When the most recent failure was recorded.
    pub last_failure_time: Option<DateTime<Utc>>,
    /// When the circuit last tripped open.
    pub opened_at: Option<DateTime<Utc>>,
    /// When the state last changed.
    pub last_state_change: Option<DateTime<Utc>>,
}

impl CircuitRecord {
    /// A fresh closed circuit with zeroed counters.
    pub fn new(circuit_id: impl Into<String>) -> Self {
        Self {
            circuit_id: circuit_id.into(),
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            opened_at: None,
            last_state_change: None,
        }
    }

    /// Pre-attempt check. Read-only except for the OPEN → HALF_OPEN
    /// transition, which happens here on the read path once the probe window
    /// has elapsed.
    pub(crate) fn gate(&mut self, policy: &BreakerPolicy, now: DateTime<Utc>) -> Gate {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => Gate::Allowed,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| {
                        now.signed_duration_since(opened)
                            .to_std()
                            .unwrap_or(Duration::ZERO)
                    })
                    // No opened_at on an open circuit is a degenerate record;
                    // let the probe through rather than block forever.
                    .unwrap_or(policy.half_open_after);

                if elapsed >= policy.half_open_after {
                    self.transition(CircuitState::HalfOpen, now);
                    self.success_count = 0;
                    Gate::Allowed
                } else {
                    Gate::Blocked {
                        until_probe: policy.half_open_after - elapsed,
                    }
                }
            }
        }
    }

    /// Records a failed attempt.
    pub(crate) fn note_failure(&mut self, policy: &BreakerPolicy, now: DateTime<Utc>) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(now);

        match self.state {
            CircuitState::Closed => {
                if self.failure_count >= policy.failure_threshold {
                    self.trip(now);
                }
            }
            // A single failure on probation always reopens.
            CircuitState::HalfOpen => self.trip(now),
            CircuitState::Open => {}
        }
    }

    /// Records a successful attempt.
    pub(crate) fn note_success(&mut self, policy: &BreakerPolicy, now: DateTime<Utc>) {
        match self.state {
            CircuitState::Closed => {
                self.failure_count = 0;
            }
            // A success recorded while still OPEN can only come from an
            // attempt admitted by a concurrent run; count it toward the
            // probation threshold like a half-open success.
            CircuitState::HalfOpen | CircuitState::Open => {
                self.success_count = self.success_count.saturating_add(1);
                if self.success_count >= policy.success_threshold {
                    self.transition(CircuitState::Closed, now);
                    self.failure_count = 0;
                    self.success_count = 0;
                }
            }
        }
    }

    fn trip(&mut self, now: DateTime<Utc>) {
        self.transition(CircuitState::Open, now);
        self.opened_at = Some(now);
        self.success_count = 0;
    }

    fn transition(&mut self, to: CircuitState, now: DateTime<Utc>) {
        self.state = to;
        self.last_state_change = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn policy() -> BreakerPolicy {
        BreakerPolicy {
            failure_threshold: 3,
            half_open_after: Duration::from_secs(60),
            success_threshold: 2,
        }
    }

    #[test]
    fn test_closed_allows_below_threshold() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();

        rec.note_failure(&policy(), now);
        rec.note_failure(&policy(), now);
        assert_eq!(rec.state, CircuitState::Closed);
        assert_eq!(rec.failure_count, 2);
        assert!(rec.gate(&policy(), now).is_allowed());
    }

    #[test]
    fn test_third_failure_trips_open() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();

        for _ in 0..3 {
            rec.note_failure(&policy(), now);
        }
        assert_eq!(rec.state, CircuitState::Open);
        assert_eq!(rec.opened_at, Some(now));
        assert_eq!(rec.success_count, 0);
        assert!(!rec.gate(&policy(), now).is_allowed());
    }

    #[test]
    fn test_success_resets_closed_failure_count() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();

        rec.note_failure(&policy(), now);
        rec.note_failure(&policy(), now);
        rec.note_success(&policy(), now);
        assert_eq!(rec.failure_count, 0);
        assert_eq!(rec.state, CircuitState::Closed);
    }

    #[test]
    fn test_open_blocks_until_probe_window() {
        let mut rec = CircuitRecord::new("a");
        let opened = Utc::now();
        for _ in 0..3 {
            rec.note_failure(&policy(), opened);
        }

        // One second early: still blocked, with the remaining wait reported.
        let early = opened + TimeDelta::seconds(59);
        match rec.gate(&policy(), early) {
            Gate::Blocked { until_probe } => assert_eq!(until_probe, Duration::from_secs(1)),
            Gate::Allowed => panic!("expected blocked"),
        }
        assert_eq!(rec.state, CircuitState::Open);

        // Exactly at the boundary: the check itself moves the circuit to
        // half-open and admits the probe.
        let at = opened + TimeDelta::seconds(60);
        assert!(rec.gate(&policy(), at).is_allowed());
        assert_eq!(rec.state, CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_closes_after_success_threshold() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();
        for _ in 0..3 {
            rec.note_failure(&policy(), now);
        }
        let later = now + TimeDelta::seconds(61);
        assert!(rec.gate(&policy(), later).is_allowed());

        rec.note_success(&policy(), later);
        assert_eq!(rec.state, CircuitState::HalfOpen);
        assert_eq!(rec.success_count, 1);

        rec.note_success(&policy(), later);
        assert_eq!(rec.state, CircuitState::Closed);
        assert_eq!(rec.failure_count, 0);
        assert_eq!(rec.success_count, 0);
    }

    #[test]
    fn test_single_half_open_failure_reopens() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();
        for _ in 0..3 {
            rec.note_failure(&policy(), now);
        }
        let later = now + TimeDelta::seconds(61);
        assert!(rec.gate(&policy(), later).is_allowed());
        rec.note_success(&policy(), later);

        rec.note_failure(&policy(), later);
        assert_eq!(rec.state, CircuitState::Open);
        assert_eq!(rec.opened_at, Some(later));
        assert_eq!(rec.success_count, 0);
        // Retained for observability.
        assert_eq!(rec.failure_count, 4);
    }

    #[test]
    fn test_clock_skew_does_not_unblock_early() {
        let mut rec = CircuitRecord::new("a");
        let now = Utc::now();
        for _ in 0..3 {
            rec.note_failure(&policy(), now);
        }
        // A check timestamped before opened_at must not open the probe window.
        let skewed = now - TimeDelta::seconds(10);
        assert!(!rec.gate(&policy(), skewed).is_allowed());
    }

    #[test]
    fn test_serde_round_trip_uses_snake_case_state() {
        let mut rec = CircuitRecord::new("task-7");
        rec.note_failure(&policy(), Utc::now());
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains("\"closed\""));

        let back: CircuitRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
