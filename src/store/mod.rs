//! # Durable state: per-circuit records, failed-task log, recovery journal.
//!
//! Every invocation of the orchestrator is a fresh process that reads,
//! mutates, and durably writes exactly the state it touches — there are no
//! process-wide singletons. The on-disk layout under [`StateDir`]:
//!
//! ```text
//! <state_dir>/
//! ├── circuits/
//! │   └── <circuit_id>.json        one record per circuit (atomic rewrite)
//! ├── locks/
//! │   └── <circuit_id>.lock        advisory lock per circuit id
//! ├── failed_tasks.jsonl           append-only failed-task log
//! └── recovery_events.jsonl        append-only recovery journal
//! ```
//!
//! Circuit records are rewritten atomically (temp file + rename + fsync); the
//! two `.jsonl` streams are append-only and never rewritten. Circuit ids are
//! sanitized before they become file names.

mod circuits;
mod failed;
mod journal;
mod lock;

pub use circuits::CircuitStore;
pub use failed::{FailedTask, FailedTaskStore, TaskStatus};
pub use journal::{EventCounts, RecoveryEvent, RecoveryEventKind, RecoveryJournal};
pub(crate) use lock::CircuitLock;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::RecoveryError;

/// Root of the persisted recovery state.
///
/// Opening a state dir creates the directory skeleton; all stores hand out
/// paths relative to it.
#[derive(Clone, Debug)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Opens (creating if needed) the state directory skeleton.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, RecoveryError> {
        let root = root.as_ref().to_path_buf();
        for dir in [root.clone(), root.join("circuits"), root.join("locks")] {
            fs::create_dir_all(&dir).map_err(|e| RecoveryError::io(&dir, e))?;
        }
        Ok(Self { root })
    }

    /// The state root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one JSON record per circuit.
    pub(crate) fn circuits_dir(&self) -> PathBuf {
        self.root.join("circuits")
    }

    /// Lock file for the given circuit id.
    pub(crate) fn lock_path(&self, circuit_id: &str) -> PathBuf {
        self.root
            .join("locks")
            .join(format!("{}.lock", sanitize_id(circuit_id)))
    }

    /// The append-only failed-task log.
    pub(crate) fn failed_log(&self) -> PathBuf {
        self.root.join("failed_tasks.jsonl")
    }

    /// The append-only recovery journal.
    pub(crate) fn journal_log(&self) -> PathBuf {
        self.root.join("recovery_events.jsonl")
    }
}

/// Maps a circuit/task id to a safe file stem.
///
/// Keeps ASCII alphanumerics plus `.`, `_`, `-`; everything else becomes `-`.
/// Ids that would reduce to an empty or dots-only stem map to `"task"`.
pub(crate) fn sanitize_id(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "task".to_string()
    } else {
        cleaned
    }
}

/// Reads a JSON document, returning `None` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, RecoveryError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RecoveryError::io(path, e)),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| RecoveryError::Corrupt {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

/// Atomically replaces the JSON document at `path`.
///
/// Writes a sibling temp file, fsyncs it, and renames over the target so a
/// crash mid-write can never leave a half-written record behind.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), RecoveryError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        RecoveryError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp).map_err(|e| RecoveryError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .map_err(|e| RecoveryError::io(&tmp, e))?;
        file.sync_all().map_err(|e| RecoveryError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| RecoveryError::io(path, e))
}

/// Appends one record as a line of JSON, fsyncing before returning.
pub(crate) fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<(), RecoveryError> {
    let line = serde_json::to_string(value).map_err(|e| {
        RecoveryError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RecoveryError::io(path, e))?;
    writeln!(file, "{line}").map_err(|e| RecoveryError::io(path, e))?;
    file.sync_all().map_err(|e| RecoveryError::io(path, e))
}

/// Reads every record of a line-delimited JSON stream.
///
/// A missing file is an empty stream; a malformed line is a
/// [`RecoveryError::Corrupt`] naming the line number.
pub(crate) fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, RecoveryError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RecoveryError::io(path, e)),
    };

    let mut records = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|e| RecoveryError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("line {}: {e}", idx + 1),
        })?;
        records.push(record);
    }
    Ok(records)
}
