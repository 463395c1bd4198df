//! # taskflow
//!
//! **Taskflow** is a dependency-aware task queue for tokio.
//!
//! Tasks declare dependencies on other tasks, conditions that gate their execution and
//! observers that follow their lifecycle. A [`TaskQueue`] parks every task until it is
//! allowed to run, then executes its body under a concurrency limit. Composite tasks
//! ([`GroupTask`], [`RepeatedTask`], [`RetryTask`]) run their members on a private
//! queue and finish once all of them did.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────┐   ┌──────────┐   ┌──────────┐
//!     │  Task A  │◄──│  Task B  │   │  Group G │ (private queue, members)
//!     └────┬─────┘   └────┬─────┘   └────┬─────┘
//!          │ dependency   │ conditions   │
//!          ▼              ▼              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  TaskQueue                                                        │
//! │  - wiring: queue hooks, default deadline, condition evaluator     │
//! │  - ExclusivityRegistry (category → current holder)                │
//! │  - Semaphore (max_concurrent) + suspension (watch)                │
//! │  - QueueDelegate (will_add / will_produce / will_finish / ...)    │
//! └──────┬──────────────────┬──────────────────┬──────────────┬───────┘
//!        ▼                  ▼                  ▼              │
//!     ┌──────────┐       ┌──────────┐       ┌──────────┐      │
//!     │  driver  │       │  driver  │       │  driver  │      │ one per task
//!     └┬─────────┘       └┬─────────┘       └┬─────────┘      │
//!      │ TaskStarting     │ ConditionFailed  │ TaskFinished   │
//!      ▼                  ▼                  ▼                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                    Bus (broadcast channel)                        │
//! │               (capacity: QueueConfig::bus_capacity)               │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Initialized ──add──► Pending ──deps finished──► EvaluatingConditions ──all satisfied──► Ready
//!                         │                              │                                 │
//!                         │ cancelled                    │ a condition failed              │ permit
//!                         ▼                              ▼                                 ▼
//!                      Finishing ◄───────────────────────┴──────────── finish(errors) ◄─ Executing
//!                         │ produced children finished
//!                         │ will_finish observers (may append errors)
//!                         │ exclusivity released, did_finish observers
//!                         ▼
//!                      Finished ──► dependents unblock
//! ```
//!
//! ## Features
//! | Area             | Description                                                     | Key types / traits                                  |
//! |------------------|-----------------------------------------------------------------|-----------------------------------------------------|
//! | **Tasks**        | Units of work with a lifecycle, dependencies and cancellation.  | [`Task`], [`Body`], [`TaskFn`], [`TaskContext`]     |
//! | **Queue**        | Dependency-aware scheduling with a concurrency limit.           | [`TaskQueue`], [`QueueConfig`], [`QueueDelegate`]   |
//! | **Conditions**   | Gates evaluated before the body, optionally mutually exclusive. | [`Condition`], [`MutuallyExclusive`], [`NegatedCondition`] |
//! | **Observers**    | Per-task lifecycle hooks, deadlines.                            | [`Observe`], [`BlockObserver`], [`TimeoutObserver`] |
//! | **Composites**   | Groups, repetition and retries.                                 | [`GroupTask`], [`RepeatedTask`], [`RetryTask`]      |
//! | **Policies**     | Delay sequences between repeated instances.                     | [`WaitStrategy`], [`JitterPolicy`]                  |
//! | **Errors**       | Task outcomes and API misuse.                                   | [`TaskError`], [`RuntimeError`]                     |
//! | **Events**       | Queue-level event stream.                                       | [`Event`], [`EventKind`]                            |
//!
//! ## Optional features
//! - `logging`: exports [`LogObserver`], a `tracing`-backed observer _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskflow::{Task, TaskContext, TaskError, TaskQueue, QueueConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = TaskQueue::new(QueueConfig {
//!         max_concurrent: 2,
//!         timeout: Duration::from_secs(5),
//!         ..QueueConfig::named("demo")
//!     });
//!
//!     let fetch = Task::from_fn("fetch", |ctx: TaskContext| async move {
//!         if ctx.is_cancelled() {
//!             return Err(TaskError::Canceled);
//!         }
//!         Ok(())
//!     });
//!     let report = Task::noop("report");
//!     report.add_dependency(&fetch)?;
//!
//!     queue.add_all([fetch, report.clone()])?;
//!     assert!(report.finished().await.is_empty());
//!     Ok(())
//! }
//! ```
mod conditions;
mod core;
mod error;
mod events;
mod observers;
mod policies;
mod repeat;
mod tasks;

// ---- Public re-exports ----

pub use conditions::{
    BlockCondition, Condition, ConditionResult, FalseCondition, MutuallyExclusive,
    NegatedCondition, NoFailedDependenciesCondition, SilentCondition, TrueCondition,
};
pub use core::{ExclusivityRegistry, QueueBuilder, QueueConfig, QueueDelegate, TaskQueue};
pub use error::{RuntimeError, TaskError};
pub use events::{Event, EventKind};
pub use observers::{BlockObserver, Observe, ObserverSet, TimeoutObserver};
pub use policies::{Delays, JitterPolicy, WaitStrategy};
pub use repeat::{
    Configure, Generator, RepeatBuilder, RepeatPayload, Repeatable, RepeatedTask, RetryBuilder,
    RetryFailureInfo, RetryHandler, RetryTask,
};
pub use tasks::{
    Body, BoxBodyFuture, Delay, DelayTask, GroupTask, Task, TaskContext, TaskFn, TaskId,
    TaskState, UserIntent, WeakTask,
};

// Optional: expose a tracing-backed observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogObserver;
