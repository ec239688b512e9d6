//! # In-process lifecycle events emitted by the retry loop.
//!
//! [`EventKind`] classifies what happened to an attempt; [`Event`] carries the
//! metadata (task, attempt number, delays, failure class). These events are
//! the live, per-attempt observability channel — durable terminal outcomes go
//! to the [`RecoveryJournal`](crate::RecoveryJournal) instead.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Within one task's retry sequence events are published in
//! attempt order; across tasks, `seq` restores a total order if needed.
//!
//! ## Example
//! ```rust
//! use retryvisor::{Event, EventKind, ErrorClass};
//!
//! let ev = Event::new(EventKind::AttemptFailed)
//!     .with_task("demo-task")
//!     .with_attempt(2)
//!     .with_reason("execution failed: rate limit")
//!     .with_class(ErrorClass::Intermittent);
//!
//! assert_eq!(ev.kind, EventKind::AttemptFailed);
//! assert_eq!(ev.task.as_deref(), Some("demo-task"));
//! assert_eq!(ev.class, Some(ErrorClass::Intermittent));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::policies::ErrorClass;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of retry-loop events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Attempt lifecycle ===
    /// An attempt is starting.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempt number (1-based)
    AttemptStarted,

    /// The attempt finished successfully.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempt number
    AttemptSucceeded,

    /// The attempt failed (classified, non-fatal to the loop).
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempt number
    /// - `reason`: failure message
    /// - `class`: failure classification
    AttemptFailed,

    /// The attempt exceeded its configured timeout.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempt number
    /// - `timeout_ms`: configured attempt timeout (ms)
    TimeoutHit,

    /// A backoff wait was scheduled before the next attempt.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: the attempt that just failed
    /// - `delay_ms`: wait before the next attempt (ms)
    /// - `reason`: last failure message
    BackoffScheduled,

    // === Terminal states ===
    /// The circuit breaker blocked the sequence (fail fast, no attempt).
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempts consumed so far
    /// - `reason`: probe eligibility detail
    CircuitBlocked,

    /// The sequence reached a terminal failure (permanent or budget spent).
    ///
    /// Sets:
    /// - `task`: task id
    /// - `attempt`: attempts consumed
    /// - `reason`: last failure message
    TaskExhausted,

    // === Redrive ===
    /// A stored failed task is being re-driven.
    ///
    /// Sets:
    /// - `task`: task id
    /// - `reason`: stored command descriptor
    RedriveStarted,

    /// A redrive succeeded and the stored task was resolved.
    ///
    /// Sets:
    /// - `task`: task id
    TaskResolved,
}

/// Retry-loop event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Task id, if applicable.
    pub task: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (failure message, probe detail, …).
    pub reason: Option<Arc<str>>,
    /// Failure classification, for failure events.
    pub class: Option<ErrorClass>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
            class: None,
        }
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a failure classification.
    #[inline]
    pub fn with_class(mut self, class: ErrorClass) -> Self {
        self.class = Some(class);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::AttemptStarted);
        let b = Event::new(EventKind::AttemptStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::new(EventKind::BackoffScheduled)
            .with_task("t1")
            .with_attempt(2)
            .with_delay(Duration::from_millis(1500))
            .with_reason("execution failed: rate limit");

        assert_eq!(ev.task.as_deref(), Some("t1"));
        assert_eq!(ev.attempt, Some(2));
        assert_eq!(ev.delay_ms, Some(1500));
        assert!(ev.class.is_none());
    }
}
