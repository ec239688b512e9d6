//! # retryvisor
//!
//! **Retryvisor** is a lightweight resilience core for Rust: a retry engine
//! with exponential backoff and jitter, coupled to per-task circuit breakers
//! and a durable failed-task store with manual re-execution ("redrive").
//!
//! It decides *whether and when* to re-attempt a single logical operation
//! identified by a task id — it does not schedule work, coordinate across
//! machines, or provide exactly-once guarantees.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!    caller ──► Orchestrator::retry(op)
//!                     │
//!        ┌────────────┼─────────────────┐
//!        ▼            ▼                 ▼
//!  CircuitBreaker  classify()     BackoffPolicy
//!  (per-task gate) (error class)  (delay formula)
//!        │            │                 │
//!        └────────────┼─────────────────┘
//!                     ▼
//!              run_once(operation)
//!                     │
//!        ┌────────────┴────────────┐
//!        ▼                         ▼
//!   Bus (live events)      durable state under StateDir
//!   AttemptStarted/…       ├─ circuits/<id>.json
//!                          ├─ failed_tasks.jsonl   ──► redrive()
//!                          └─ recovery_events.jsonl ─► summary()
//! ```
//!
//! ### Retry lifecycle
//! ```text
//! loop (attempt = 1..=max_retries) {
//!   ├─► breaker.check(task)         Blocked → journal circuit_tripped, stop
//!   ├─► run_once(op, timeout)
//!   │     ├─ Ok   → record_success, journal success{attempts}, stop
//!   │     └─ Err  → classify:
//!   │          ├─ Permanent    → record_failure, store FailedTask(failed), stop
//!   │          ├─ Transient    → record_failure, immediate retry (first attempt)
//!   │          └─ Intermittent → record_failure, sleep backoff.delay(attempt)
//!   └─► budget spent → store FailedTask(recoverable), journal
//!                      max_retries_exceeded, stop
//! }
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types                                   |
//! |-----------------|----------------------------------------------------------|---------------------------------------------|
//! | **Retry**       | Attempt loop with classification-driven pacing.          | [`Orchestrator`], [`RetryOutcome`]          |
//! | **Policies**    | Backoff formula, attempt budget, breaker thresholds.     | [`BackoffPolicy`], [`RetryPolicy`], [`BreakerPolicy`] |
//! | **Breaker**     | Durable per-task fail-fast state machine.                | [`CircuitBreaker`], [`CircuitState`]        |
//! | **Redrive**     | Durable queue of exhausted tasks, manual re-execution.   | [`FailedTaskStore`], [`RedriveTarget`]      |
//! | **Statistics**  | Append-only journal of terminal outcomes.                | [`RecoveryJournal`], [`RecoverySummary`]    |
//! | **Operations**  | The async, cancellable unit being retried.               | [`Operation`], [`OpFn`]                     |
//! | **Errors**      | Infrastructure vs classified operation failures.         | [`RecoveryError`], [`OpError`], [`ErrorClass`] |
//!
//! ## Example
//! ```rust,no_run
//! use tokio_util::sync::CancellationToken;
//! use retryvisor::{Config, OpError, OpFn, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::new(Config::at(".recovery"))?;
//!
//!     let op = OpFn::arc("sync-users", |ctx: CancellationToken| async move {
//!         if ctx.is_cancelled() {
//!             return Err(OpError::Canceled);
//!         }
//!         // call the flaky upstream here...
//!         Ok(())
//!     });
//!
//!     let outcome = orch.retry(op.as_ref(), &CancellationToken::new()).await?;
//!     println!("{}", orch.summary()?);
//!     std::process::exit(outcome.exit_code());
//! }
//! ```

mod breaker;
mod config;
mod core;
mod error;
mod events;
mod policies;
mod store;
mod tasks;

// ---- Public re-exports ----

pub use breaker::{CircuitBreaker, CircuitRecord, CircuitState, Gate};
pub use config::Config;
pub use core::{
    ExhaustKind, Exhaustion, Orchestrator, RecoverySummary, RedriveReport, RedriveTarget,
    RetryOutcome,
};
pub use error::{OpError, RecoveryError};
pub use events::{Bus, Event, EventKind};
pub use policies::{
    classify, BackoffPolicy, BreakerPolicy, ErrorClass, RetryPolicy, TransientRetry,
    INTERMITTENT_MARKERS, PERMANENT_MARKERS, TRANSIENT_MARKERS,
};
pub use store::{
    CircuitStore, EventCounts, FailedTask, FailedTaskStore, RecoveryEvent, RecoveryEventKind,
    RecoveryJournal, StateDir, TaskStatus,
};
pub use tasks::{OpFn, Operation, OperationRef};
