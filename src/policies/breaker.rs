//! # Circuit breaker thresholds.
//!
//! [`BreakerPolicy`] parameterizes the per-circuit state machine in
//! [`breaker`](crate::breaker): how many consecutive failures trip a circuit,
//! how long it stays open before a probe is allowed, and how many consecutive
//! probe successes close it again.

use std::time::Duration;

/// Thresholds for the per-circuit state machine.
#[derive(Clone, Copy, Debug)]
pub struct BreakerPolicy {
    /// Consecutive failures (while closed) that trip the circuit open.
    pub failure_threshold: u32,
    /// How long an open circuit blocks attempts before a half-open probe
    /// is permitted.
    pub half_open_after: Duration,
    /// Consecutive successes (while half-open) that close the circuit.
    pub success_threshold: u32,
}

impl Default for BreakerPolicy {
    /// Returns a policy with:
    /// - `failure_threshold = 3`;
    /// - `half_open_after = 60s`;
    /// - `success_threshold = 2`.
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            half_open_after: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}
