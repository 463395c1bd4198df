//! Task identity, lifecycle states and user-intent hint.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global id counter; ids are never reused within a process.
static TASK_SEQ: AtomicU64 = AtomicU64::new(1);

/// Unique task identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(TASK_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// # Lifecycle of a task.
///
/// ```text
/// Initialized ─► Pending ─► EvaluatingConditions ─► Ready ─► Executing ─► Finishing ─► Finished
///                   │                 │               │                      ▲
///                   └─────────────────┴───────────────┴── cancelled / ───────┘
///                                                        condition failed
/// ```
///
/// Transitions only move forward; the declaration order is the transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskState {
    /// Created, not yet in a queue. Dependencies and conditions may still change.
    Initialized,
    /// In a queue, waiting for explicit dependencies.
    Pending,
    /// Waiting for the condition evaluator and indirect dependencies.
    EvaluatingConditions,
    /// Waiting for the queue to be resumed and a concurrency permit.
    Ready,
    /// Body is running.
    Executing,
    /// Finish requested; waiting for produced children and running finish observers.
    Finishing,
    /// Terminal.
    Finished,
}

impl TaskState {
    /// True only for [`TaskState::Finished`].
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Finished)
    }

    /// Short stable label (snake_case) for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            TaskState::Initialized => "initialized",
            TaskState::Pending => "pending",
            TaskState::EvaluatingConditions => "evaluating_conditions",
            TaskState::Ready => "ready",
            TaskState::Executing => "executing",
            TaskState::Finishing => "finishing",
            TaskState::Finished => "finished",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// How directly a task was requested by a user. Scheduling does not depend on it;
/// groups report the strongest intent among their members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserIntent {
    /// Background work.
    #[default]
    None,
    /// Consequence of something the user did.
    SideEffect,
    /// Directly requested by the user.
    Initiated,
}
