//! Runtime core: queueing, scheduling and exclusivity.
//!
//! The public entry point is [`TaskQueue`]; everything a task goes through after
//! being added happens in the private `driver` module.
//!
//! Internal modules:
//! - `queue`: insertion, wiring, suspension, concurrency limit;
//! - `driver`: walks one task from `Pending` to `Finished`;
//! - `exclusivity`: category → current holder registry;
//! - `delegate`: queue-level callbacks;
//! - `config`: queue settings.

mod config;
mod delegate;
mod driver;
mod exclusivity;
mod queue;

pub use config::QueueConfig;
pub use delegate::QueueDelegate;
pub use exclusivity::ExclusivityRegistry;
pub use queue::{QueueBuilder, TaskQueue};
