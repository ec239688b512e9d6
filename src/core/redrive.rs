//! # Redrive: re-attempting stored failed tasks.
//!
//! Redrive re-enters the retry loop for tasks the orchestrator previously
//! gave up on: each selected task gets a single fresh attempt (the stored
//! attempt counts do not carry over), and a success appends a `resolved`
//! entry to the failed-task log. A failed redrive re-appends through the
//! normal exhaustion path, so the log stays the single source of truth.
//!
//! The caller supplies a factory turning a stored [`FailedTask`] (its opaque
//! `command` descriptor) back into a runnable [`Operation`]; the produced
//! operation's `name()` should equal the stored task id so circuit state and
//! journal entries line up.

use tokio_util::sync::CancellationToken;

use crate::core::orchestrator::{Orchestrator, RetryOutcome};
use crate::error::RecoveryError;
use crate::events::{Event, EventKind};
use crate::store::{FailedTask, TaskStatus};
use crate::tasks::OperationRef;

/// Which stored tasks to redrive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RedriveTarget {
    /// One task by id. Also redrives `failed` (permanently-classified)
    /// entries — naming a task explicitly is an operator override.
    Task(String),
    /// Every pending `recoverable` task.
    All,
}

/// Per-task outcome of a redrive pass.
#[derive(Clone, Debug)]
pub struct RedriveReport {
    /// The redriven task id.
    pub task_id: String,
    /// Outcome of the single fresh attempt.
    pub outcome: RetryOutcome,
}

impl Orchestrator {
    /// Re-attempts stored failed tasks.
    ///
    /// Returns one [`RedriveReport`] per selected task, in task-id order; an
    /// empty vector means nothing matched the target. Infrastructure errors
    /// abort the pass; a task whose fresh attempt merely fails again is
    /// reported, not an error.
    pub async fn redrive<F>(
        &self,
        target: RedriveTarget,
        make_op: F,
        ctx: &CancellationToken,
    ) -> Result<Vec<RedriveReport>, RecoveryError>
    where
        F: Fn(&FailedTask) -> OperationRef,
    {
        let selected: Vec<FailedTask> = self
            .failed_tasks()
            .pending()?
            .into_iter()
            .filter(|t| match &target {
                RedriveTarget::Task(id) => t.task_id == *id,
                RedriveTarget::All => t.status == TaskStatus::Recoverable,
            })
            .collect();

        let mut reports = Vec::with_capacity(selected.len());
        for task in selected {
            if ctx.is_cancelled() {
                return Err(RecoveryError::Canceled);
            }

            self.bus().publish(
                Event::new(EventKind::RedriveStarted)
                    .with_task(task.task_id.clone())
                    .with_reason(task.command.clone()),
            );
            tracing::info!(task = %task.task_id, command = %task.command, "redriving");

            let op = make_op(&task);
            let policy = self.config().retry.single_attempt();
            let outcome = self.retry_with_policy(op.as_ref(), policy, ctx).await?;

            if outcome.is_success() {
                self.failed_tasks().resolve(&task.task_id)?;
                self.bus()
                    .publish(Event::new(EventKind::TaskResolved).with_task(task.task_id.clone()));
            }
            reports.push(RedriveReport {
                task_id: task.task_id,
                outcome,
            });
        }
        Ok(reports)
    }
}
