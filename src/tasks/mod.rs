//! # Operation abstractions.
//!
//! This module provides the operation-related types:
//! - [`Operation`] - trait for the async, cancellable unit being retried
//! - [`OpFn`] - function-backed operation implementation
//! - [`OperationRef`] - shared reference to an operation (`Arc<dyn Operation>`)

mod op_fn;
mod operation;

pub use op_fn::OpFn;
pub use operation::{Operation, OperationRef};
