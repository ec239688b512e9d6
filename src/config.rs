//! # Global configuration for the recovery core.
//!
//! Provides [`Config`], the centralized settings consumed by
//! [`Orchestrator::new`](crate::Orchestrator::new).
//!
//! ## Sentinel values
//! - `timeout = 0s` → no per-attempt timeout (treated as `None` by
//!   [`Config::attempt_timeout`])

use std::path::PathBuf;
use std::time::Duration;

use crate::policies::{BreakerPolicy, RetryPolicy};

/// Global configuration for the recovery core.
///
/// Defines:
/// - **Persistence**: where circuit, failed-task, and journal state live
/// - **Retry defaults**: attempt budget, backoff, transient pacing
/// - **Breaker thresholds**: trip/probe/close parameters
/// - **Attempt timeout**: per-attempt wall-clock bound
/// - **Lock wait**: bounded wait for per-circuit lock acquisition
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to
/// avoid sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Root directory of the persisted recovery state.
    ///
    /// Created on [`Orchestrator::new`](crate::Orchestrator::new) with the
    /// layout documented on [`StateDir`](crate::StateDir).
    pub state_dir: PathBuf,

    /// Default retry policy.
    ///
    /// Can be overridden per call via
    /// [`retry_with_policy`](crate::Orchestrator::retry_with_policy).
    pub retry: RetryPolicy,

    /// Circuit breaker thresholds, shared by every circuit.
    pub breaker: BreakerPolicy,

    /// Per-attempt timeout.
    ///
    /// - `Duration::ZERO` = no timeout (an attempt runs until completion)
    /// - `> 0` = the attempt is cancelled and counted as a transient failure
    pub timeout: Duration,

    /// Bounded wait for acquiring a per-circuit lock.
    ///
    /// Exceeding it surfaces
    /// [`RecoveryError::LockContended`](crate::RecoveryError::LockContended)
    /// rather than retrying silently.
    pub lock_wait: Duration,

    /// Capacity of the event bus broadcast ring buffer (minimum 1).
    pub bus_capacity: usize,
}

impl Config {
    /// A default configuration rooted at the given state directory.
    pub fn at(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            ..Self::default()
        }
    }

    /// Returns the per-attempt timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per attempt
    #[inline]
    pub fn attempt_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `state_dir = ".recovery"`
    /// - `retry = RetryPolicy::default()` (3 attempts, exponential backoff
    ///   1s → 30s, ×2, jitter on, transient fast-first)
    /// - `breaker = BreakerPolicy::default()` (trip after 3, probe after 60s,
    ///   close after 2)
    /// - `timeout = 0s` (no per-attempt timeout)
    /// - `lock_wait = 5s`
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".recovery"),
            retry: RetryPolicy::default(),
            breaker: BreakerPolicy::default(),
            timeout: Duration::ZERO,
            lock_wait: Duration::from_secs(5),
            bus_capacity: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_sentinel() {
        let mut cfg = Config::default();
        assert_eq!(cfg.attempt_timeout(), None);

        cfg.timeout = Duration::from_secs(5);
        assert_eq!(cfg.attempt_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_defaults_match_documentation() {
        let cfg = Config::at("/tmp/recovery");
        assert_eq!(cfg.state_dir, PathBuf::from("/tmp/recovery"));
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.breaker.failure_threshold, 3);
        assert_eq!(cfg.lock_wait, Duration::from_secs(5));
        assert_eq!(cfg.bus_capacity_clamped(), 256);
    }
}
