//! # Per-circuit advisory file lock.
//!
//! Concurrent orchestrator runs on the *same* circuit id must serialize their
//! check/record calls. [`CircuitLock`] scopes an exclusive OS advisory lock
//! (via `fs2`) to one such call: acquired with a bounded wait, released on
//! drop. It is never held across a whole retry loop, which keeps blocking
//! windows short and rules out deadlock between runs.
//!
//! Failing to acquire within the wait budget is a
//! [`RecoveryError::LockContended`] — surfaced, not silently retried.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::time::Duration;

use fs2::FileExt;

use crate::error::RecoveryError;

/// How often acquisition is re-attempted while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A held exclusive lock for one circuit id.
///
/// Released when dropped. The lock file itself is left in place; only the
/// advisory lock is relinquished.
#[derive(Debug)]
pub(crate) struct CircuitLock {
    file: File,
    circuit: String,
}

impl CircuitLock {
    /// Acquires the lock at `path`, waiting up to `wait`.
    pub(crate) async fn acquire(
        path: &Path,
        circuit: &str,
        wait: Duration,
    ) -> Result<Self, RecoveryError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| RecoveryError::io(path, e))?;

        let deadline = tokio::time::Instant::now() + wait;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    return Ok(Self {
                        file,
                        circuit: circuit.to_string(),
                    });
                }
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if tokio::time::Instant::now() >= deadline {
                        tracing::warn!(circuit, ?wait, "circuit lock contended");
                        return Err(RecoveryError::LockContended {
                            circuit: circuit.to_string(),
                            waited: wait,
                        });
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(wait)).await;
                }
                Err(e) => return Err(RecoveryError::io(path, e)),
            }
        }
    }

    /// Lock file path helper for a circuit id (used by tests).
    #[cfg(test)]
    pub(crate) fn path_in(dir: &Path, circuit: &str) -> std::path::PathBuf {
        dir.join(format!("{}.lock", crate::store::sanitize_id(circuit)))
    }
}

impl Drop for CircuitLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(circuit = %self.circuit, error = %e, "failed to release circuit lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let tmp = TempDir::new().unwrap();
        let path = CircuitLock::path_in(tmp.path(), "a");

        let lock = CircuitLock::acquire(&path, "a", Duration::from_millis(100))
            .await
            .unwrap();
        drop(lock);

        // Re-acquirable after release.
        CircuitLock::acquire(&path, "a", Duration::from_millis(100))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_contended_lock_times_out() {
        let tmp = TempDir::new().unwrap();
        let path = CircuitLock::path_in(tmp.path(), "a");

        let _held = CircuitLock::acquire(&path, "a", Duration::from_millis(100))
            .await
            .unwrap();

        let err = CircuitLock::acquire(&path, "a", Duration::from_millis(200))
            .await
            .unwrap_err();
        match err {
            RecoveryError::LockContended { circuit, waited } => {
                assert_eq!(circuit, "a");
                assert_eq!(waited, Duration::from_millis(200));
            }
            other => panic!("expected LockContended, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_distinct_circuits_do_not_contend() {
        let tmp = TempDir::new().unwrap();
        let _a = CircuitLock::acquire(
            &CircuitLock::path_in(tmp.path(), "a"),
            "a",
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        CircuitLock::acquire(
            &CircuitLock::path_in(tmp.path(), "b"),
            "b",
            Duration::from_millis(100),
        )
        .await
        .unwrap();
    }
}
