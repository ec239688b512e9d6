//! # Orchestrator: the retry loop over breaker, classifier, and backoff.
//!
//! [`Orchestrator`] is the top-level driver. For one task it loops attempts,
//! consulting the circuit breaker before each attempt, classifying failures,
//! pacing retries, and recording terminal outcomes durably:
//!
//! ```text
//! retry(op) ──► loop {
//!   ├─► cancelled? ──────────────► Err(Canceled)
//!   ├─► breaker.check(task)
//!   │     └─ Blocked ─► journal circuit_tripped ─► Exhausted (no attempt)
//!   ├─► run_once(op, timeout)
//!   │     ├─ Ok ──► breaker.record_success ─► journal success ─► Success
//!   │     └─ Err ─► classify ─► breaker.record_failure
//!   │          ├─ Permanent ──► store FailedTask(failed)
//!   │          │                journal permanent_failure ─► Exhausted
//!   │          ├─ Transient (fast) ─► next attempt, no sleep
//!   │          └─ otherwise ──► publish BackoffScheduled
//!   │                           cancellable sleep(backoff.delay(n))
//!   └─► budget spent ──► store FailedTask(recoverable)
//!                        journal max_retries_exceeded ─► Exhausted
//! }
//! ```
//!
//! Side effects are ordered within each attempt: breaker state changes and
//! journal entries are persisted synchronously, so a crash mid-sequence
//! leaves a consistent trail and a later redrive simply starts a fresh
//! sequence from attempt 1.

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::breaker::{CircuitBreaker, Gate};
use crate::config::Config;
use crate::core::runner::run_once;
use crate::error::RecoveryError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{ErrorClass, RetryPolicy};
use crate::store::{
    EventCounts, FailedTask, FailedTaskStore, RecoveryEvent, RecoveryEventKind, RecoveryJournal,
    StateDir, TaskStatus,
};
use crate::tasks::Operation;

/// Terminal result of one retry sequence.
#[derive(Clone, Debug)]
pub enum RetryOutcome {
    /// The operation eventually succeeded.
    Success {
        /// Attempts consumed, including the successful one.
        attempts: u32,
    },
    /// The sequence ended without success.
    Exhausted(Exhaustion),
}

impl RetryOutcome {
    /// Whether the sequence ended in success.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    /// Process exit convention: 0 on success, 1 on exhaustion.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }
}

/// Why a sequence ended without success, and what was stored.
#[derive(Clone, Debug)]
pub struct Exhaustion {
    /// The terminal cause.
    pub kind: ExhaustKind,
    /// The durable failed-task entry, if one was stored.
    ///
    /// `None` only for [`ExhaustKind::CircuitOpen`], which fails fast before
    /// consuming an attempt and stores nothing.
    pub task: Option<FailedTask>,
}

/// Terminal causes of an exhausted sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExhaustKind {
    /// The circuit breaker blocked the sequence.
    CircuitOpen,
    /// A permanently-classified failure stopped it after one attempt.
    PermanentFailure,
    /// The attempt budget ran out.
    RetriesExceeded,
}

/// Aggregate recovery statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Journal counts by event type.
    pub counts: EventCounts,
    /// Tasks currently awaiting redrive.
    pub pending_redrive: usize,
}

impl std::fmt::Display for RecoverySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "successes:            {}", self.counts.successes)?;
        writeln!(f, "circuit tripped:      {}", self.counts.circuit_tripped)?;
        writeln!(f, "permanent failures:   {}", self.counts.permanent_failures)?;
        writeln!(f, "max retries exceeded: {}", self.counts.retries_exceeded)?;
        write!(f, "pending redrive:      {}", self.pending_redrive)
    }
}

/// Top-level driver tying breaker, stores, and policies together.
///
/// One orchestrator serves any number of task ids; concurrent sequences on
/// *different* ids need no coordination, while check/record calls on the same
/// circuit id serialize through the per-circuit lock.
pub struct Orchestrator {
    cfg: Config,
    breaker: CircuitBreaker,
    failed: FailedTaskStore,
    journal: RecoveryJournal,
    bus: Bus,
}

impl Orchestrator {
    /// Builds an orchestrator over the configured state directory,
    /// creating the directory skeleton if needed.
    pub fn new(cfg: Config) -> Result<Self, RecoveryError> {
        let state = StateDir::open(&cfg.state_dir)?;
        let breaker = CircuitBreaker::new(&state, cfg.breaker, cfg.lock_wait)?;
        let failed = FailedTaskStore::open(state.failed_log());
        let journal = RecoveryJournal::open(state.journal_log());
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Ok(Self {
            cfg,
            breaker,
            failed,
            journal,
            bus,
        })
    }

    /// The live event bus; subscribe for per-attempt lifecycle events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The configuration this orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// The circuit breaker, for direct check/record/stats access.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// The failed-task store (redrive queue).
    pub fn failed_tasks(&self) -> &FailedTaskStore {
        &self.failed
    }

    /// The recovery journal.
    pub fn journal(&self) -> &RecoveryJournal {
        &self.journal
    }

    /// Runs one retry sequence with the configured default policy.
    pub async fn retry(
        &self,
        op: &dyn Operation,
        ctx: &CancellationToken,
    ) -> Result<RetryOutcome, RecoveryError> {
        self.retry_with_policy(op, self.cfg.retry, ctx).await
    }

    /// Runs one retry sequence with an explicit policy.
    pub async fn retry_with_policy(
        &self,
        op: &dyn Operation,
        policy: RetryPolicy,
        ctx: &CancellationToken,
    ) -> Result<RetryOutcome, RecoveryError> {
        let task_id = op.name();
        let max = policy.max_retries.max(1);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if ctx.is_cancelled() {
                return Err(RecoveryError::Canceled);
            }

            if let Gate::Blocked { until_probe } = self.breaker.check(task_id).await? {
                let detail = format!("circuit open; probe eligible in {until_probe:?}");
                self.bus.publish(
                    Event::new(EventKind::CircuitBlocked)
                        .with_task(task_id)
                        .with_attempt(attempt - 1)
                        .with_reason(detail.clone()),
                );
                self.journal.record(
                    &RecoveryEvent::new(RecoveryEventKind::CircuitTripped, task_id, attempt - 1)
                        .with_details(detail),
                )?;
                return Ok(RetryOutcome::Exhausted(Exhaustion {
                    kind: ExhaustKind::CircuitOpen,
                    task: None,
                }));
            }

            self.bus.publish(
                Event::new(EventKind::AttemptStarted)
                    .with_task(task_id)
                    .with_attempt(attempt),
            );

            let err = match run_once(op, ctx, self.cfg.attempt_timeout(), &self.bus, attempt).await
            {
                Ok(()) => {
                    self.breaker.record_success(task_id).await?;
                    self.journal.record(&RecoveryEvent::new(
                        RecoveryEventKind::Success,
                        task_id,
                        attempt,
                    ))?;
                    self.bus.publish(
                        Event::new(EventKind::AttemptSucceeded)
                            .with_task(task_id)
                            .with_attempt(attempt),
                    );
                    tracing::debug!(task = task_id, attempt, "operation recovered");
                    return Ok(RetryOutcome::Success { attempts: attempt });
                }
                Err(crate::error::OpError::Canceled) => return Err(RecoveryError::Canceled),
                Err(err) => err,
            };

            // `class()` is `None` only for Canceled, handled above; anything
            // else unknown stays retryable.
            let class = err.class().unwrap_or(ErrorClass::Intermittent);
            self.bus.publish(
                Event::new(EventKind::AttemptFailed)
                    .with_task(task_id)
                    .with_attempt(attempt)
                    .with_reason(err.to_string())
                    .with_class(class),
            );
            self.breaker.record_failure(task_id).await?;

            if class == ErrorClass::Permanent {
                return self
                    .exhaust(
                        op,
                        attempt,
                        ExhaustKind::PermanentFailure,
                        TaskStatus::Failed,
                        RecoveryEventKind::PermanentFailure,
                        &err.to_string(),
                    )
                    .map(RetryOutcome::Exhausted);
            }

            if attempt >= max {
                return self
                    .exhaust(
                        op,
                        max,
                        ExhaustKind::RetriesExceeded,
                        TaskStatus::Recoverable,
                        RecoveryEventKind::MaxRetriesExceeded,
                        &err.to_string(),
                    )
                    .map(RetryOutcome::Exhausted);
            }

            // Budget remains: pace the next attempt.
            let fast = class == ErrorClass::Transient && policy.transient.skips_backoff(attempt);
            if !fast {
                let delay = policy.backoff.delay(attempt);
                self.bus.publish(
                    Event::new(EventKind::BackoffScheduled)
                        .with_task(task_id)
                        .with_attempt(attempt)
                        .with_delay(delay)
                        .with_reason(err.to_string()),
                );

                let sleep = time::sleep(delay);
                tokio::pin!(sleep);
                select! {
                    _ = &mut sleep => {}
                    _ = ctx.cancelled() => return Err(RecoveryError::Canceled),
                }
            }
        }
    }

    /// Aggregate counts plus the pending-redrive backlog.
    pub fn summary(&self) -> Result<RecoverySummary, RecoveryError> {
        Ok(RecoverySummary {
            counts: self.journal.counts()?,
            pending_redrive: self.failed.pending()?.len(),
        })
    }

    fn exhaust(
        &self,
        op: &dyn Operation,
        attempts: u32,
        kind: ExhaustKind,
        status: TaskStatus,
        event: RecoveryEventKind,
        detail: &str,
    ) -> Result<Exhaustion, RecoveryError> {
        let task = FailedTask::new(op.name(), op.command(), attempts, status);
        self.failed.append(&task)?;
        self.journal
            .record(&RecoveryEvent::new(event, op.name(), attempts).with_details(detail))?;
        self.bus.publish(
            Event::new(EventKind::TaskExhausted)
                .with_task(op.name())
                .with_attempt(attempts)
                .with_reason(detail),
        );
        tracing::warn!(task = op.name(), attempts, outcome = event.as_label(), "giving up");
        Ok(Exhaustion {
            kind,
            task: Some(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::{BackoffPolicy, TransientRetry};
    use crate::tasks::OpFn;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_config(tmp: &TempDir) -> Config {
        let mut cfg = Config::at(tmp.path().join("state"));
        cfg.retry = RetryPolicy {
            max_retries: 3,
            backoff: BackoffPolicy {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(30),
                multiplier: 2.0,
                jitter: false,
            },
            transient: TransientRetry::FirstAttemptFast,
        };
        cfg
    }

    /// An operation that fails with scripted messages, then succeeds.
    fn scripted(
        name: &'static str,
        failures: &'static [&'static str],
    ) -> (Arc<impl Operation>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = calls.clone();
        let op = OpFn::arc(name, move |_ctx: CancellationToken| {
            let n = seen.fetch_add(1, Ordering::SeqCst) as usize;
            async move {
                match failures.get(n) {
                    Some(msg) => Err(crate::error::OpError::fail(*msg)),
                    None => Ok(()),
                }
            }
        });
        (op, calls)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermittent_failures_then_success() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let mut rx = orch.bus().subscribe();
        let (op, calls) = scripted("t1", &["rate limit", "rate limit"]);

        let started = time::Instant::now();
        let outcome = orch
            .retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Success { attempts: 3 }));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoff sleeps, per the formula for attempts 1 and 2.
        assert_eq!(started.elapsed(), Duration::from_millis(100 + 200));

        // Failure, failure, success — in attempt order.
        let kinds: Vec<EventKind> = drain(&mut rx)
            .into_iter()
            .map(|e| e.kind)
            .filter(|k| {
                matches!(
                    k,
                    EventKind::AttemptFailed | EventKind::AttemptSucceeded
                )
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::AttemptFailed,
                EventKind::AttemptFailed,
                EventKind::AttemptSucceeded
            ]
        );

        let journal = orch.journal().all().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].event_type, RecoveryEventKind::Success);
        assert_eq!(journal[0].attempts, 3);
        assert!(orch.failed_tasks().pending().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_stops_immediately() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let (op, calls) = scripted("t1", &["404 not found", "404 not found"]);

        let started = time::Instant::now();
        let outcome = orch
            .retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        // Exactly one attempt, never a sleep.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);

        let RetryOutcome::Exhausted(ex) = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(ex.kind, ExhaustKind::PermanentFailure);
        let task = ex.task.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.attempts, 1);

        // One record_failure reached the breaker.
        let stats = orch.breaker().stats().unwrap();
        assert_eq!(stats[0].failure_count, 1);

        let journal = orch.journal().all().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].event_type, RecoveryEventKind::PermanentFailure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_first_failure_skips_backoff() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let (op, _) = scripted("t1", &["connection refused", "rate limit"]);

        let started = time::Instant::now();
        let outcome = orch
            .retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(outcome, RetryOutcome::Success { attempts: 3 }));
        // Attempt 1 (transient) retried immediately; only attempt 2's
        // intermittent failure slept, per the formula for attempt 2.
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_after_first_attempt_backs_off() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let (op, _) = scripted("t1", &["rate limit", "network unreachable"]);

        let started = time::Instant::now();
        orch.retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        // Transient on attempt 2 still waits under FirstAttemptFast.
        assert_eq!(started.elapsed(), Duration::from_millis(100 + 200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_stores_recoverable_task() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let (op, calls) = scripted("t1", &["rate limit", "rate limit", "rate limit", "rate limit"]);

        let started = time::Instant::now();
        let outcome = orch
            .retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Sleeps after attempts 1 and 2 only; no sleep once the budget is
        // spent.
        assert_eq!(started.elapsed(), Duration::from_millis(100 + 200));
        assert_eq!(outcome.exit_code(), 1);

        let RetryOutcome::Exhausted(ex) = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(ex.kind, ExhaustKind::RetriesExceeded);
        assert_eq!(ex.task.as_ref().unwrap().attempts, 3);

        let pending = orch.failed_tasks().pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, TaskStatus::Recoverable);

        let journal = orch.journal().all().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].event_type, RecoveryEventKind::MaxRetriesExceeded);
        assert_eq!(journal[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_open_circuit_fails_fast_without_attempting() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        for _ in 0..3 {
            orch.breaker().record_failure("t1").await.unwrap();
        }

        let (op, calls) = scripted("t1", &[]);
        let outcome = orch
            .retry(op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let RetryOutcome::Exhausted(ex) = outcome else {
            panic!("expected exhaustion");
        };
        assert_eq!(ex.kind, ExhaustKind::CircuitOpen);
        assert!(ex.task.is_none());

        let journal = orch.journal().all().unwrap();
        assert_eq!(journal.len(), 1);
        assert_eq!(journal[0].event_type, RecoveryEventKind::CircuitTripped);
        assert_eq!(journal[0].attempts, 0);
        // Nothing stored for redrive: the task was never attempted.
        assert!(orch.failed_tasks().pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_sequence() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let (op, calls) = scripted("t1", &[]);

        let token = CancellationToken::new();
        token.cancel();
        let err = orch.retry(op.as_ref(), &token).await.unwrap_err();
        assert_eq!(err.as_label(), "canceled");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_operation_observing_cancellation_aborts() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();
        let op = OpFn::new("t1", |_ctx: CancellationToken| async {
            Err(crate::error::OpError::Canceled)
        });

        let err = orch
            .retry(&op, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "canceled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_combines_journal_and_backlog() {
        let tmp = TempDir::new().unwrap();
        let orch = Orchestrator::new(test_config(&tmp)).unwrap();

        let (ok_op, _) = scripted("good", &[]);
        orch.retry(ok_op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        let (bad_op, _) = scripted("bad", &["rate limit", "rate limit", "rate limit"]);
        orch.retry(bad_op.as_ref(), &CancellationToken::new())
            .await
            .unwrap();

        let summary = orch.summary().unwrap();
        assert_eq!(summary.counts.successes, 1);
        assert_eq!(summary.counts.retries_exceeded, 1);
        assert_eq!(summary.pending_redrive, 1);

        let printed = summary.to_string();
        assert!(printed.contains("successes:            1"));
        assert!(printed.contains("pending redrive:      1"));
    }
}
