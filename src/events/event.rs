//! # Lifecycle events emitted by task queues.
//!
//! The [`EventKind`] enum classifies what happened:
//! - **Task lifecycle**: added, produced, starting, cancelled, condition failed, finished
//! - **Deadlines and scheduling**: timeout hit, retry/repeat scheduled
//! - **Queue control**: suspended, resumed, opaque work finished
//!
//! The [`Event`] struct carries additional metadata such as the task name and id,
//! the queue it ran on, a reason, attempt counters and delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskflow::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RetryScheduled)
//!     .with_task("fetch")
//!     .with_reason("connection reset")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(ev.kind, EventKind::RetryScheduled);
//! assert_eq!(ev.task.as_deref(), Some("fetch"));
//! assert_eq!(ev.delay_ms, Some(250));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::tasks::TaskId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of queue events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Task lifecycle ===
    /// Task was accepted by a queue and its driver spawned.
    ///
    /// Sets: `task`, `task_id`, `queue`.
    TaskAdded,

    /// A running task produced a child that was added to the same queue.
    ///
    /// Sets: `task` (the child), `task_id`, `queue`, `reason` (producer name).
    TaskProduced,

    /// Task passed its dependencies and conditions and its body is starting.
    ///
    /// Sets: `task`, `task_id`, `queue`.
    TaskStarting,

    /// Task observed cancellation before its body ran and is finishing without it.
    ///
    /// Sets: `task`, `task_id`, `queue`, `errors`.
    TaskCancelled,

    /// Condition evaluation failed; the body will not run.
    ///
    /// Sets: `task`, `task_id`, `queue`, `reason` (first error), `errors`.
    ConditionFailed,

    /// Task reached `Finished`.
    ///
    /// Sets: `task`, `task_id`, `queue`, `errors`, `reason` (first error, if any).
    TaskFinished,

    // === Deadlines and scheduling ===
    /// A deadline preempted a running body.
    ///
    /// Sets: `task`, `task_id`, `queue`.
    TimeoutHit,

    /// A retry group scheduled another attempt after a failure.
    ///
    /// Sets: `task` (group name), `attempt`, `delay_ms`, `reason`.
    RetryScheduled,

    /// A repeat group scheduled its next instance.
    ///
    /// Sets: `task` (group name), `attempt`, `delay_ms`.
    RepeatScheduled,

    // === Queue control ===
    /// Queue stopped starting new work.
    ///
    /// Sets: `queue`.
    QueueSuspended,

    /// Queue resumed starting work.
    ///
    /// Sets: `queue`.
    QueueResumed,

    /// An opaque work item finished.
    ///
    /// Sets: `task` (work item name), `queue`.
    OpaqueFinished,
}

/// Queue event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, if applicable.
    pub task: Option<Arc<str>>,
    /// Id of the task, if applicable.
    pub task_id: Option<TaskId>,
    /// Name of the queue the event originated from.
    pub queue: Option<Arc<str>>,
    /// Human-readable reason (first error, producer name, etc.).
    pub reason: Option<Arc<str>>,
    /// Number of errors the task finished or was cancelled with.
    pub errors: Option<u32>,
    /// Attempt/instance count (starting from 1).
    pub attempt: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            task_id: None,
            queue: None,
            reason: None,
            errors: None,
            attempt: None,
            delay_ms: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task_id(mut self, id: TaskId) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches the originating queue name.
    #[inline]
    pub fn with_queue(mut self, queue: impl Into<Arc<str>>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an error count.
    #[inline]
    pub fn with_errors(mut self, n: usize) -> Self {
        self.errors = Some(n.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// True for events that describe a task reaching a terminal outcome.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::TaskFinished)
    }
}
