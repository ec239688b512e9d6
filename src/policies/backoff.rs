//! # Backoff policy for retry delays.
//!
//! [`BackoffPolicy`] controls how long the orchestrator waits before the next
//! attempt. It is parameterized by:
//! - [`BackoffPolicy::initial`] the delay base for the first retry;
//! - [`BackoffPolicy::multiplier`] the multiplicative growth factor;
//! - [`BackoffPolicy::max`] the cap applied before jitter;
//! - [`BackoffPolicy::jitter`] whether a random fraction is added on top.
//!
//! The delay for attempt `n` (1-based) is `initial × multiplier^(n-1)`,
//! clamped to `max`. When jitter is enabled, a uniform draw from
//! `[0, clamped/4]` is added so that concurrent retriers do not wake in
//! lockstep; the jittered value is never fed back into subsequent
//! calculations — each attempt derives its base independently.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use retryvisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy {
//!     initial: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     multiplier: 2.0,
//!     jitter: false,
//! };
//!
//! // Attempt 1 — uses 'initial' (100ms)
//! assert_eq!(backoff.delay(1), Duration::from_millis(100));
//!
//! // Attempt 2 — initial × multiplier^1 = 200ms
//! assert_eq!(backoff.delay(2), Duration::from_millis(200));
//!
//! // Attempt 10 — 100ms × 2^9 = 51_200ms → capped at max=10s
//! assert_eq!(backoff.delay(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use rand::Rng;

/// Retry backoff policy.
///
/// Encapsulates the parameters that determine how retry delays grow:
/// - [`BackoffPolicy::initial`] — delay for the first retry;
/// - [`BackoffPolicy::multiplier`] — multiplicative growth factor;
/// - [`BackoffPolicy::max`] — the maximum delay cap (pre-jitter);
/// - [`BackoffPolicy::jitter`] — randomized addition to spread retry storms.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Maximum delay cap; applied to the base before jitter.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub multiplier: f64,
    /// When enabled, adds a uniform draw from `[0, clamped/4]` to the delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    /// Returns a policy with:
    /// - `initial = 1000ms`;
    /// - `max = 30s`;
    /// - `multiplier = 2.0`;
    /// - `jitter` enabled.
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before the retry that follows attempt `attempt`.
    ///
    /// `attempt` is 1-based; values below 1 are a caller contract violation
    /// and are clamped to 1. The base delay is
    /// `initial × multiplier^(attempt-1)`, clamped to [`BackoffPolicy::max`];
    /// non-finite or negative intermediate values also clamp to `max`. With
    /// jitter enabled the result lies in `[clamped, clamped * 1.25]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1) - 1;
        let max_secs = self.max.as_secs_f64();
        let raw = self.initial.as_secs_f64() * self.multiplier.powi(exp.min(i32::MAX as u32) as i32);

        let capped = if !raw.is_finite() || raw < 0.0 || raw > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(raw)
        };

        if !self.jitter {
            return capped;
        }
        let quarter = capped.as_millis().min(u128::from(u64::MAX)) as u64 / 4;
        if quarter == 0 {
            return capped;
        }
        capped + Duration::from_millis(rand::rng().random_range(0..=quarter))
    }
}
