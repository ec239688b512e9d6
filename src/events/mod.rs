//! # Live observability for the retry loop.
//!
//! - [`Event`] / [`EventKind`] — per-attempt lifecycle events;
//! - [`Bus`] — broadcast channel the orchestrator publishes them on.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
