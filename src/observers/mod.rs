//! # Task observers.
//!
//! - [`Observe`]: per-task lifecycle hooks, dispatched through [`ObserverSet`]
//! - [`BlockObserver`]: observer built from closures
//! - [`TimeoutObserver`]: deadline that preempts a running task
//! - [`LogObserver`]: `tracing` output for every event _(feature `logging`)_

mod block;
#[cfg(feature = "logging")]
mod log;
mod observe;
mod timeout;

pub use block::BlockObserver;
#[cfg(feature = "logging")]
pub use log::LogObserver;
pub use observe::{Observe, ObserverSet};
pub(crate) use observe::guarded;
pub use timeout::TimeoutObserver;
