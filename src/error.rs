//! Error types used by the retryvisor core and retried operations.
//!
//! This module defines two main error enums:
//!
//! - [`RecoveryError`] — infrastructure errors raised by the orchestration core
//!   itself (persistence, locking, cancellation). Always fatal to the current
//!   attempt sequence and propagated to the caller.
//! - [`OpError`] — failures of the retried operation. These never escape the
//!   retry loop: they are classified (see [`classify`](crate::classify)) and
//!   drive the retry policy only.
//!
//! Both types provide `as_label` helpers for logging/metrics.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// # Infrastructure errors produced by the recovery core.
///
/// Losing circuit or failed-task state silently would corrupt the resilience
/// guarantees themselves, so every variant here aborts the current attempt
/// sequence and propagates to the caller.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// Reading or writing persisted state failed.
    #[error("state i/o at {path}: {source}")]
    Io {
        /// The file or directory the operation touched.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted record could not be decoded.
    #[error("corrupt record at {path}: {detail}")]
    Corrupt {
        /// The file holding the record.
        path: PathBuf,
        /// What failed to decode (line number, serde message).
        detail: String,
    },

    /// The per-circuit lock could not be acquired within the bounded wait.
    ///
    /// Surfaced rather than retried silently, so contention on a circuit id
    /// stays visible to the caller.
    #[error("circuit '{circuit}' lock contended after {waited:?}")]
    LockContended {
        /// The contended circuit id.
        circuit: String,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// The retry sequence was cancelled before reaching a terminal outcome.
    #[error("retry sequence cancelled")]
    Canceled,
}

impl RecoveryError {
    /// Wraps an I/O error with the path it occurred at.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecoveryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use retryvisor::RecoveryError;
    ///
    /// let err = RecoveryError::Canceled;
    /// assert_eq!(err.as_label(), "canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RecoveryError::Io { .. } => "state_io",
            RecoveryError::Corrupt { .. } => "state_corrupt",
            RecoveryError::LockContended { .. } => "lock_contended",
            RecoveryError::Canceled => "canceled",
        }
    }
}

/// # Failures produced by one attempt of a retried operation.
///
/// These are contained within the retry loop: the orchestrator classifies the
/// failure and decides whether and when to re-attempt. They are never surfaced
/// past the final [`RetryOutcome`](crate::RetryOutcome).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum OpError {
    /// The attempt exceeded its configured timeout.
    ///
    /// Classified as transient by [`OpError::class`].
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout duration that was exceeded.
        timeout: Duration,
    },

    /// The operation failed with an error message.
    ///
    /// The message text is what the classifier inspects.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The operation observed cancellation and stopped.
    #[error("operation cancelled")]
    Canceled,
}

impl OpError {
    /// Shorthand for an [`OpError::Fail`] with the given message.
    ///
    /// # Example
    /// ```
    /// use retryvisor::OpError;
    ///
    /// let err = OpError::fail("connection refused by upstream");
    /// assert_eq!(err.as_label(), "op_failed");
    /// ```
    pub fn fail(error: impl Into<String>) -> Self {
        OpError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            OpError::Timeout { .. } => "op_timeout",
            OpError::Fail { .. } => "op_failed",
            OpError::Canceled => "op_canceled",
        }
    }
}
