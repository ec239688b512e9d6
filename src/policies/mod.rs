//! # Policies: pure decision functions for the retry core.
//!
//! This module groups everything that *decides* without doing I/O:
//! - [`BackoffPolicy`] — how long to wait before the next attempt;
//! - [`RetryPolicy`] / [`TransientRetry`] — attempt budget and pacing;
//! - [`BreakerPolicy`] — circuit breaker thresholds;
//! - [`ErrorClass`] / [`classify`] — failure classification.

mod backoff;
mod breaker;
mod classify;
mod retry;

pub use backoff::BackoffPolicy;
pub use breaker::BreakerPolicy;
pub use classify::{
    classify, ErrorClass, INTERMITTENT_MARKERS, PERMANENT_MARKERS, TRANSIENT_MARKERS,
};
pub use retry::{RetryPolicy, TransientRetry};
