//! # Failed-task store (redrive queue).
//!
//! Log-structured record of tasks that gave up: the orchestrator appends an
//! entry when a retry sequence exhausts its budget (`recoverable`) or hits a
//! permanent failure (`failed`), and redrive appends a `resolved` entry when a
//! later attempt succeeds. The log is never rewritten; the *current* status of
//! a task is the latest entry for its id. Duplicate entries per task id are
//! expected (each exhausted sequence appends again).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RecoveryError;
use crate::store::{append_jsonl, read_jsonl};

/// Status of a failed-task entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Automatic retries were exhausted; eligible for redrive.
    Recoverable,
    /// A permanently-classified failure; redriven only when named explicitly.
    Failed,
    /// A later redrive succeeded; the task is no longer pending.
    Resolved,
}

/// One entry of the failed-task log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    /// The task id (doubles as the circuit id).
    pub task_id: String,
    /// Opaque descriptor of the operation, kept so a redrive can rebuild it.
    pub command: String,
    /// Attempts consumed before giving up.
    pub attempts: u32,
    /// When this entry was stored.
    pub timestamp: DateTime<Utc>,
    /// Entry status.
    pub status: TaskStatus,
}

impl FailedTask {
    /// Builds an entry timestamped now.
    pub fn new(
        task_id: impl Into<String>,
        command: impl Into<String>,
        attempts: u32,
        status: TaskStatus,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            command: command.into(),
            attempts,
            timestamp: Utc::now(),
            status,
        }
    }
}

/// Append-only store of [`FailedTask`] entries.
#[derive(Clone, Debug)]
pub struct FailedTaskStore {
    path: PathBuf,
}

impl FailedTaskStore {
    /// Opens the store backed by the given `.jsonl` file.
    ///
    /// The file is created on first append; a missing file reads as empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Appends one entry, fsyncing before returning.
    pub fn append(&self, task: &FailedTask) -> Result<(), RecoveryError> {
        tracing::debug!(
            task = %task.task_id,
            status = ?task.status,
            attempts = task.attempts,
            "recording failed task"
        );
        append_jsonl(&self.path, task)
    }

    /// Every entry in append order, resolved ones included.
    pub fn all(&self) -> Result<Vec<FailedTask>, RecoveryError> {
        read_jsonl(&self.path)
    }

    /// Currently-unresolved tasks: the latest entry per task id, excluding
    /// resolved ones. Ordered by task id.
    pub fn pending(&self) -> Result<Vec<FailedTask>, RecoveryError> {
        let mut latest: BTreeMap<String, FailedTask> = BTreeMap::new();
        for entry in self.all()? {
            latest.insert(entry.task_id.clone(), entry);
        }
        Ok(latest
            .into_values()
            .filter(|t| t.status != TaskStatus::Resolved)
            .collect())
    }

    /// Marks `task_id` resolved by appending a `resolved` entry cloned from
    /// its latest record. Returns the appended entry, or `None` when the task
    /// has no unresolved record.
    pub fn resolve(&self, task_id: &str) -> Result<Option<FailedTask>, RecoveryError> {
        let Some(current) = self
            .pending()?
            .into_iter()
            .find(|t| t.task_id == task_id)
        else {
            return Ok(None);
        };

        let resolved = FailedTask {
            status: TaskStatus::Resolved,
            timestamp: Utc::now(),
            ..current
        };
        self.append(&resolved)?;
        Ok(Some(resolved))
    }
}
