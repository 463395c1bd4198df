//! Queue events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the per-task driver (`core::driver`), `TaskQueue` (suspend/resume,
//!   produce, opaque work) and the repeat/retry engine.
//! - **Consumers**: anything holding a receiver from `TaskQueue::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
