//! # Demo: circuit_trip
//!
//! Trips a circuit by exhausting retries against a dead upstream, then shows
//! the breaker failing fast on the next run and the per-circuit stats view.
//!
//! ## Run
//! ```bash
//! cargo run --example circuit_trip
//! ```

use std::time::Duration;

use retryvisor::{Config, ExhaustKind, OpError, OpFn, Orchestrator, RetryOutcome};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let state_dir = std::env::temp_dir().join("retryvisor-circuit-demo");
    let _ = std::fs::remove_dir_all(&state_dir);
    let mut cfg = Config::at(state_dir);
    cfg.retry.max_retries = 3;
    cfg.retry.backoff.initial = Duration::from_millis(50);
    cfg.retry.backoff.jitter = false;
    cfg.breaker.failure_threshold = 3;
    let orch = Orchestrator::new(cfg)?;

    let dead = OpFn::arc("billing-api", |_ctx: CancellationToken| async {
        Err(OpError::fail("connection refused"))
    });
    let token = CancellationToken::new();

    // 1. Three failed attempts: the circuit trips open.
    let outcome = orch.retry(dead.as_ref(), &token).await?;
    println!("[main] first run: {outcome:?}");

    // 2. The next run fails fast without touching the operation.
    match orch.retry(dead.as_ref(), &token).await? {
        RetryOutcome::Exhausted(ex) if ex.kind == ExhaustKind::CircuitOpen => {
            println!("[main] second run blocked by the open circuit");
        }
        other => println!("[main] unexpected outcome: {other:?}"),
    }

    // 3. Inspect breaker state directly.
    for circuit in orch.breaker().stats()? {
        println!(
            "[main] circuit {} state={} failures={} opened_at={:?}",
            circuit.circuit_id, circuit.state, circuit.failure_count, circuit.opened_at
        );
    }

    println!("{}", orch.summary()?);
    Ok(())
}
