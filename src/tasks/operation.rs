//! # The retried operation seam.
//!
//! [`Operation`] is the boundary between the recovery core and the business
//! work being retried: an async, cancellable unit identified by a stable name
//! (the task id, which doubles as the circuit id). The core never inspects
//! what an operation does — only whether it succeeded and, on failure, the
//! error text to classify.
//!
//! An operation also carries an opaque [`command`](Operation::command)
//! descriptor. It is stored with a failed task so a later redrive can rebuild
//! an equivalent operation; by default it is the operation's name.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::OpError;

/// Shared handle to an operation.
pub type OperationRef = Arc<dyn Operation>;

/// # Asynchronous, cancellable retried unit.
///
/// Implementors should check the [`CancellationToken`] at natural stopping
/// points and return [`OpError::Canceled`] promptly when it fires; the
/// orchestrator does not interrupt a running attempt on its own.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use retryvisor::{OpError, Operation};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Operation for Ping {
///     fn name(&self) -> &str { "ping-upstream" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), OpError> {
///         if ctx.is_cancelled() {
///             return Err(OpError::Canceled);
///         }
///         // do work...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Operation: Send + Sync + 'static {
    /// Stable task id; also used as the circuit id.
    fn name(&self) -> &str;

    /// Opaque descriptor stored for redrive. Defaults to the name.
    fn command(&self) -> &str {
        self.name()
    }

    /// Executes one attempt until completion or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<(), OpError>;
}
