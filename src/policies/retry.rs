//! # Retry policy: attempt budget and per-class pacing.
//!
//! [`RetryPolicy`] bundles the attempt budget with the backoff parameters and
//! the transient-retry pacing choice. The orchestrator consults it once per
//! failed attempt:
//!
//! ```text
//! attempt n fails
//!   ├─ Permanent      → stop, no further attempts
//!   ├─ Transient      → TransientRetry decides: immediate or backoff
//!   └─ Intermittent   → always sleep backoff.delay(n)
//! ```

use crate::policies::BackoffPolicy;

/// Pacing for transient failures.
///
/// The documented behavior of the recovery flow retries a transient failure
/// immediately (no sleep) only on the very first attempt; some deployments
/// prefer skipping the wait on every transient failure. This is the
/// configurable policy choice between the two readings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransientRetry {
    /// Retry immediately only when the *first* attempt fails transiently;
    /// later transient failures wait out the backoff (default).
    #[default]
    FirstAttemptFast,
    /// Retry immediately after every transient failure.
    AlwaysFast,
}

impl TransientRetry {
    /// Whether the retry after a transient failure on `attempt` skips backoff.
    pub fn skips_backoff(&self, attempt: u32) -> bool {
        match self {
            TransientRetry::FirstAttemptFast => attempt == 1,
            TransientRetry::AlwaysFast => true,
        }
    }
}

/// Policy for one retry sequence.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempt budget (including the first attempt). Minimum 1.
    pub max_retries: u32,
    /// Delay growth between attempts.
    pub backoff: BackoffPolicy,
    /// Pacing for transient failures.
    pub transient: TransientRetry,
}

impl Default for RetryPolicy {
    /// Returns a policy with `max_retries = 3`, default exponential backoff,
    /// and [`TransientRetry::FirstAttemptFast`].
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: BackoffPolicy::default(),
            transient: TransientRetry::default(),
        }
    }
}

impl RetryPolicy {
    /// This policy reduced to a single fresh attempt, as used by redrive.
    pub fn single_attempt(&self) -> Self {
        Self {
            max_retries: 1,
            ..*self
        }
    }
}
