//! # Tasks.
//!
//! - [`Task`]: handle to a unit of work and its lifecycle ([`TaskState`])
//! - [`Body`] / [`TaskFn`]: the work itself, receiving a [`TaskContext`]
//! - [`DelayTask`]: waits, then finishes without errors
//! - [`GroupTask`]: composite task running its members on a private queue

mod body;
mod context;
mod delay;
mod group;
mod state;
mod task;

pub use body::{Body, BoxBodyFuture, TaskFn};
pub use context::TaskContext;
pub use delay::{Delay, DelayTask};
pub use group::GroupTask;
pub(crate) use group::GroupHook;
pub use state::{TaskId, TaskState, UserIntent};
pub use task::{Task, WeakTask};
