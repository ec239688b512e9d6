//! # Demo: retry_flaky
//!
//! Retries an operation that fails twice before succeeding, printing the
//! lifecycle events published on the [`Bus`] along the way.
//!
//! ## Flow
//! ```text
//! Orchestrator::retry()
//!   ├─► AttemptStarted{attempt=1}
//!   ├─► AttemptFailed{class=intermittent}
//!   ├─► BackoffScheduled{delay=100ms}
//!   ├─► AttemptStarted{attempt=2}
//!   ├─► AttemptFailed{class=intermittent}
//!   ├─► BackoffScheduled{delay≈200ms}
//!   ├─► AttemptStarted{attempt=3}
//!   └─► AttemptSucceeded → journal success{attempts=3}
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example retry_flaky
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use retryvisor::{BackoffPolicy, Config, OpError, OpFn, Orchestrator};
use tokio_util::sync::CancellationToken;

static CALLS: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // 1. Configure: fast backoff so the demo finishes quickly.
    let state_dir = std::env::temp_dir().join("retryvisor-demo");
    let _ = std::fs::remove_dir_all(&state_dir);
    let mut cfg = Config::at(state_dir);
    cfg.retry.backoff = BackoffPolicy {
        initial: Duration::from_millis(100),
        max: Duration::from_secs(2),
        multiplier: 2.0,
        jitter: true,
    };
    let orch = Orchestrator::new(cfg)?;

    // 2. Watch the live event stream.
    let mut events = orch.bus().subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(ev) = events.recv().await {
            println!(
                "[bus] {:?} task={} attempt={:?} delay_ms={:?}",
                ev.kind,
                ev.task.as_deref().unwrap_or("-"),
                ev.attempt,
                ev.delay_ms,
            );
        }
    });

    // 3. An operation that fails twice before succeeding.
    let flaky = OpFn::arc("flaky-sync", |_ctx: CancellationToken| async {
        let call = CALLS.fetch_add(1, Ordering::Relaxed) + 1;
        if call <= 2 {
            println!("[flaky-sync] simulated rate limit #{call}");
            Err(OpError::fail(format!("rate limit (call #{call})")))
        } else {
            println!("[flaky-sync] success on call {call}");
            Ok(())
        }
    });

    // 4. Run the retry sequence and print the aggregate view.
    let outcome = orch.retry(flaky.as_ref(), &CancellationToken::new()).await?;
    println!("[main] outcome: {outcome:?}");
    println!("{}", orch.summary()?);

    watcher.abort();
    Ok(())
}
