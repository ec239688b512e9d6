//! # Failure classification for retry decisions.
//!
//! [`classify`] maps an operation's error text into one of three
//! [`ErrorClass`]es by case-insensitive keyword matching:
//!
//! - **Transient** — momentary conditions (timeouts, connection resets) that
//!   are worth an immediate re-attempt.
//! - **Intermittent** — pressure conditions (rate limits, overloaded
//!   upstreams) that need a backoff wait before re-attempting.
//! - **Permanent** — conditions no retry will fix (missing resources, denied
//!   access, invalid input); the loop stops after one attempt.
//!
//! Unmatched text defaults to Intermittent: an unknown failure stays eligible
//! for a backoff retry rather than being written off as unrecoverable.
//! Permanent markers are checked first so an unrecoverable signal is never
//! shadowed by an incidental transient word in the same message.

use serde::{Deserialize, Serialize};

use crate::error::OpError;

/// Keywords marking a failure as transient.
pub const TRANSIENT_MARKERS: &[&str] = &["timeout", "connection refused", "network", "temporary"];

/// Keywords marking a failure as intermittent.
pub const INTERMITTENT_MARKERS: &[&str] =
    &["rate limit", "too many requests", "service unavailable"];

/// Keywords marking a failure as permanent.
pub const PERMANENT_MARKERS: &[&str] = &["not found", "forbidden", "unauthorized", "invalid"];

/// Failure class controlling whether and how a retry occurs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Momentary failure: retried immediately on the first failure
    /// (see [`TransientRetry`](crate::TransientRetry)), with backoff after.
    Transient,
    /// Pressure failure: always waits out the computed backoff.
    Intermittent,
    /// Unrecoverable failure: terminates the retry loop after one attempt.
    Permanent,
}

impl ErrorClass {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorClass::Transient => "transient",
            ErrorClass::Intermittent => "intermittent",
            ErrorClass::Permanent => "permanent",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Classifies an error message into an [`ErrorClass`].
///
/// Pure and total: matching is case-insensitive substring search against the
/// fixed marker vocabularies, and anything unmatched is Intermittent.
///
/// # Example
/// ```
/// use retryvisor::{classify, ErrorClass};
///
/// assert_eq!(classify("Connection refused (os error 111)"), ErrorClass::Transient);
/// assert_eq!(classify("429 Too Many Requests"), ErrorClass::Intermittent);
/// assert_eq!(classify("404 Not Found"), ErrorClass::Permanent);
/// assert_eq!(classify("something exploded"), ErrorClass::Intermittent);
/// ```
pub fn classify(error_text: &str) -> ErrorClass {
    let text = error_text.to_lowercase();
    if contains_any(&text, PERMANENT_MARKERS) {
        return ErrorClass::Permanent;
    }
    if contains_any(&text, TRANSIENT_MARKERS) {
        return ErrorClass::Transient;
    }
    // Explicit intermittent markers and everything unmatched both land here:
    // still eligible for a backoff retry, never silently unrecoverable.
    ErrorClass::Intermittent
}

fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

impl OpError {
    /// Classifies this failure, if it is classifiable.
    ///
    /// Timeouts are transient by definition; [`OpError::Fail`] goes through
    /// [`classify`]. Returns `None` for [`OpError::Canceled`], which aborts
    /// the retry sequence instead of being retried.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            OpError::Timeout { .. } => Some(ErrorClass::Transient),
            OpError::Fail { error } => Some(classify(error)),
            OpError::Canceled => None,
        }
    }
}
