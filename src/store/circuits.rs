//! # Circuit record store.
//!
//! One JSON document per circuit id under `circuits/`. Loading an unknown id
//! yields a fresh CLOSED record (circuits are created lazily and never
//! explicitly deleted); saving rewrites the record atomically so that a crash
//! after a `record_*` call returns implies the state change is durable.

use std::fs;
use std::path::{Path, PathBuf};

use crate::breaker::CircuitRecord;
use crate::error::RecoveryError;
use crate::store::{read_json, sanitize_id, write_json_atomic};

/// Filesystem-backed store of [`CircuitRecord`]s.
#[derive(Clone, Debug)]
pub struct CircuitStore {
    dir: PathBuf,
}

impl CircuitStore {
    /// Opens the store rooted at `dir` (created if missing).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RecoveryError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| RecoveryError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// Loads the record for `circuit_id`, defaulting to a fresh CLOSED
    /// circuit when no backing file exists.
    pub fn load(&self, circuit_id: &str) -> Result<CircuitRecord, RecoveryError> {
        let path = self.record_path(circuit_id);
        Ok(read_json(&path)?.unwrap_or_else(|| CircuitRecord::new(circuit_id)))
    }

    /// Durably saves `record`, replacing any previous version.
    pub fn save(&self, record: &CircuitRecord) -> Result<(), RecoveryError> {
        write_json_atomic(&self.record_path(&record.circuit_id), record)
    }

    /// Loads every known circuit, ordered by file name.
    pub fn list(&self) -> Result<Vec<CircuitRecord>, RecoveryError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .map_err(|e| RecoveryError::io(&self.dir, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(record) = read_json(&path)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn record_path(&self, circuit_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_id(circuit_id)))
    }
}
