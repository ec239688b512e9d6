//! # Run a single attempt of an operation with optional timeout.
//!
//! This helper drives one execution of an [`Operation`] under a child
//! [`CancellationToken`]:
//!
//! ```text
//!   ┌─────────────┐
//!   │  Operation  │
//!   └──────┬──────┘
//!      run_once()
//!          ▼
//!  CancellationToken ──► timeout? ──► result
//! ```
//!
//! - If `timeout` is `Some(dur) > 0`, the attempt is wrapped in
//!   [`tokio::time::timeout`]. On expiry the child token is cancelled, a
//!   [`EventKind::TimeoutHit`] is published, and [`OpError::Timeout`] is
//!   returned — which the classifier treats as transient.
//! - Cancellation of the parent token is the operation's responsibility to
//!   observe mid-attempt; the orchestrator checks it between attempts.

use std::time::Duration;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::OpError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::Operation;

/// Executes a single attempt of an operation with an optional timeout.
pub(crate) async fn run_once(
    op: &dyn Operation,
    parent: &CancellationToken,
    timeout: Option<Duration>,
    bus: &Bus,
    attempt: u32,
) -> Result<(), OpError> {
    let child = parent.child_token();

    match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, op.run(child.clone())).await {
            Ok(res) => res,
            Err(_elapsed) => {
                child.cancel();
                bus.publish(
                    Event::new(EventKind::TimeoutHit)
                        .with_task(op.name())
                        .with_attempt(attempt)
                        .with_timeout(dur),
                );
                Err(OpError::Timeout { timeout: dur })
            }
        },
        None => op.run(child).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::ErrorClass;
    use crate::tasks::OpFn;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_transient_op_error() {
        let op = OpFn::new("slow", |_ctx: CancellationToken| async {
            time::sleep(Duration::from_secs(60)).await;
            Ok::<_, OpError>(())
        });
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let token = CancellationToken::new();

        let err = run_once(&op, &token, Some(Duration::from_secs(1)), &bus, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, OpError::Timeout { .. }));
        assert_eq!(err.class(), Some(ErrorClass::Transient));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::TimeoutHit);
        assert_eq!(ev.timeout_ms, Some(1000));
    }

    #[tokio::test]
    async fn test_zero_timeout_means_none() {
        let op = OpFn::new("ok", |_ctx: CancellationToken| async { Ok::<_, OpError>(()) });
        let bus = Bus::new(16);
        let token = CancellationToken::new();

        run_once(&op, &token, Some(Duration::ZERO), &bus, 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_operation_error_passes_through() {
        let op = OpFn::new("fails", |_ctx: CancellationToken| async {
            Err(OpError::fail("not found"))
        });
        let bus = Bus::new(16);
        let token = CancellationToken::new();

        let err = run_once(&op, &token, None, &bus, 1).await.unwrap_err();
        assert_eq!(err.class(), Some(ErrorClass::Permanent));
    }
}
