//! # Demo: redrive
//!
//! Exhausts a task's retry budget so it lands in the failed-task store, then
//! redrives it once the (simulated) upstream has recovered.
//!
//! ## Flow
//! ```text
//! retry("nightly-export")           upstream down
//!   └─► 2 attempts fail ──► FailedTask{status=recoverable, attempts=2}
//!
//! redrive(All)                      upstream back
//!   └─► 1 fresh attempt succeeds ─► resolved entry appended
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example redrive
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use retryvisor::{Config, OpError, OpFn, OperationRef, Orchestrator, RedriveTarget};
use tokio_util::sync::CancellationToken;

static UPSTREAM_UP: AtomicBool = AtomicBool::new(false);

fn export_op(task_id: String) -> OperationRef {
    OpFn::arc(task_id, |_ctx: CancellationToken| async {
        if UPSTREAM_UP.load(Ordering::Relaxed) {
            println!("[nightly-export] upstream reachable, exported");
            Ok(())
        } else {
            println!("[nightly-export] upstream still down");
            Err(OpError::fail("503 service unavailable"))
        }
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let state_dir = std::env::temp_dir().join("retryvisor-redrive-demo");
    let _ = std::fs::remove_dir_all(&state_dir);
    let mut cfg = Config::at(state_dir);
    cfg.retry.max_retries = 2;
    cfg.retry.backoff.initial = Duration::from_millis(50);
    cfg.retry.backoff.jitter = false;
    let orch = Orchestrator::new(cfg)?;

    // 1. The upstream is down: the budget runs out and the task is stored.
    let token = CancellationToken::new();
    let outcome = orch
        .retry(export_op("nightly-export".into()).as_ref(), &token)
        .await?;
    println!("[main] first run: {outcome:?}");
    for task in orch.failed_tasks().pending()? {
        println!(
            "[main] pending redrive: {} (attempts={}, status={:?})",
            task.task_id, task.attempts, task.status
        );
    }

    // 2. The upstream recovers; redrive everything that is pending.
    UPSTREAM_UP.store(true, Ordering::Relaxed);
    let reports = orch
        .redrive(
            RedriveTarget::All,
            |task| export_op(task.task_id.clone()),
            &token,
        )
        .await?;
    for report in &reports {
        println!(
            "[main] redrive {} → success={}",
            report.task_id,
            report.outcome.is_success()
        );
    }

    println!("{}", orch.summary()?);
    Ok(())
}
