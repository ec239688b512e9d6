//! # Function-backed operation (`OpFn`)
//!
//! [`OpFn`] wraps a closure `F: Fn(CancellationToken) -> Fut`, producing a
//! fresh future per attempt. Each attempt owns its own state; shared state
//! between attempts must be captured explicitly (e.g. an `Arc<AtomicU32>`)
//! inside the closure.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use retryvisor::{OpError, OpFn, Operation, OperationRef};
//!
//! let op: OperationRef = OpFn::arc("sync-users", |ctx: CancellationToken| async move {
//!     if ctx.is_cancelled() {
//!         return Err(OpError::Canceled);
//!     }
//!     // do work...
//!     Ok(())
//! });
//!
//! assert_eq!(op.name(), "sync-users");
//! assert_eq!(op.command(), "sync-users");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::OpError;
use crate::tasks::operation::Operation;

/// Function-backed operation implementation.
///
/// Wraps a closure that *creates* a new future per attempt.
pub struct OpFn<F> {
    name: Cow<'static, str>,
    command: Option<Cow<'static, str>>,
    f: F,
}

impl<F> OpFn<F> {
    /// Creates a new function-backed operation.
    ///
    /// Prefer [`OpFn::arc`] when you immediately need an
    /// [`OperationRef`](crate::OperationRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            command: None,
            f,
        }
    }

    /// Sets the redrive command descriptor (defaults to the name).
    pub fn with_command(mut self, command: impl Into<Cow<'static, str>>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Operation for OpFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), OpError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> &str {
        self.command.as_deref().unwrap_or(&self.name)
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), OpError> {
        (self.f)(ctx).await
    }
}
