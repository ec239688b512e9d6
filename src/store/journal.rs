//! # Recovery journal (statistics recorder).
//!
//! Append-only log of terminal recovery outcomes. The orchestrator only ever
//! writes here; the read side aggregates counts for `recovery_stats`. The log
//! is never rewritten — truncation/archival is an external concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::RecoveryError;
use crate::store::{append_jsonl, read_jsonl};

/// Terminal outcome classes recorded in the journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryEventKind {
    /// An attempt eventually succeeded.
    Success,
    /// The circuit breaker suppressed the attempt sequence.
    CircuitTripped,
    /// A permanently-classified failure stopped the sequence.
    PermanentFailure,
    /// The attempt budget ran out without success.
    MaxRetriesExceeded,
}

impl RecoveryEventKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RecoveryEventKind::Success => "success",
            RecoveryEventKind::CircuitTripped => "circuit_tripped",
            RecoveryEventKind::PermanentFailure => "permanent_failure",
            RecoveryEventKind::MaxRetriesExceeded => "max_retries_exceeded",
        }
    }
}

impl std::fmt::Display for RecoveryEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// One journal entry. Write-once; identified by its position in the log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEvent {
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
    /// The task the outcome belongs to.
    pub task_id: String,
    /// Outcome class.
    pub event_type: RecoveryEventKind,
    /// Attempts consumed when the outcome was reached.
    pub attempts: u32,
    /// Free-text detail (last error message, probe window, …).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl RecoveryEvent {
    /// Builds an event timestamped now.
    pub fn new(event_type: RecoveryEventKind, task_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            task_id: task_id.into(),
            event_type,
            attempts,
            details: None,
        }
    }

    /// Attaches free-text detail.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregate counts over the journal, by event type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventCounts {
    /// `success` entries.
    pub successes: u64,
    /// `circuit_tripped` entries.
    pub circuit_tripped: u64,
    /// `permanent_failure` entries.
    pub permanent_failures: u64,
    /// `max_retries_exceeded` entries.
    pub retries_exceeded: u64,
}

/// Append-only journal of [`RecoveryEvent`]s.
#[derive(Clone, Debug)]
pub struct RecoveryJournal {
    path: PathBuf,
}

impl RecoveryJournal {
    /// Opens the journal backed by the given `.jsonl` file.
    ///
    /// The file is created on first record; a missing file reads as empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Appends one event, fsyncing before returning.
    ///
    /// A write failure propagates: outcomes are never dropped silently.
    pub fn record(&self, event: &RecoveryEvent) -> Result<(), RecoveryError> {
        tracing::debug!(
            task = %event.task_id,
            event = event.event_type.as_label(),
            attempts = event.attempts,
            "journal event"
        );
        append_jsonl(&self.path, event)
    }

    /// Every event in append order.
    pub fn all(&self) -> Result<Vec<RecoveryEvent>, RecoveryError> {
        read_jsonl(&self.path)
    }

    /// Aggregates counts by event type. Read-only.
    pub fn counts(&self) -> Result<EventCounts, RecoveryError> {
        let mut counts = EventCounts::default();
        for event in self.all()? {
            match event.event_type {
                RecoveryEventKind::Success => counts.successes += 1,
                RecoveryEventKind::CircuitTripped => counts.circuit_tripped += 1,
                RecoveryEventKind::PermanentFailure => counts.permanent_failures += 1,
                RecoveryEventKind::MaxRetriesExceeded => counts.retries_exceeded += 1,
            }
        }
        Ok(counts)
    }
}
