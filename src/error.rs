//! Error types used by the taskflow runtime and tasks.
//!
//! This module defines two main error enums:
//!
//! - [`TaskError`]: errors a task finishes with. They are cloneable values carried in a
//!   task's error list, aggregated by groups and kept as history by retries.
//! - [`RuntimeError`]: misuse of the task/queue API (finishing twice, mutating a task
//!   that is already running, adding a task to two queues).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

use crate::tasks::TaskState;

/// # Errors a task can finish with.
///
/// Condition failures short-circuit before the body runs and become the task's only
/// errors. Everything a body reports is carried as [`TaskError::Fail`] or
/// [`TaskError::Fatal`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// A condition evaluated to failed.
    #[error("condition '{condition}' failed: {reason}")]
    ConditionFailed {
        /// Name of the failing condition.
        condition: String,
        /// Why it failed.
        reason: String,
    },

    /// A negated condition found its inner condition satisfied.
    #[error("condition '{condition}' was satisfied")]
    ConditionSatisfied {
        /// Name of the inner condition.
        condition: String,
    },

    /// Condition evaluation was cancelled before it could decide.
    #[error("condition evaluation cancelled")]
    ConditionEvaluationCancelled,

    /// Some dependencies finished with errors.
    #[error("{count} dependencies finished with errors")]
    DependenciesFailed {
        /// Number of failed dependencies.
        count: usize,
    },

    /// Some dependencies were cancelled.
    #[error("{count} dependencies were cancelled")]
    DependenciesCancelled {
        /// Number of cancelled dependencies.
        count: usize,
    },

    /// A deadline observer force-cancelled the task.
    #[error("timed out after {timeout:?}")]
    TimedOut {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The owning group was cancelled with errors.
    #[error("parent cancelled with {} errors", .errors.len())]
    ParentCancelledWithErrors {
        /// Errors the parent was cancelled with.
        errors: Vec<TaskError>,
    },

    /// The body failed; another attempt may succeed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The body failed in a way that should not be retried.
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// A body, condition or observer panicked.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload, if it was a string.
        info: String,
    },

    /// The body observed cancellation and gave up.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskflow::TaskError;
    /// use std::time::Duration;
    ///
    /// let err = TaskError::TimedOut { timeout: Duration::from_secs(1) };
    /// assert_eq!(err.as_label(), "task_timed_out");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::ConditionFailed { .. } => "condition_failed",
            TaskError::ConditionSatisfied { .. } => "condition_satisfied",
            TaskError::ConditionEvaluationCancelled => "condition_evaluation_cancelled",
            TaskError::DependenciesFailed { .. } => "dependencies_failed",
            TaskError::DependenciesCancelled { .. } => "dependencies_cancelled",
            TaskError::TimedOut { .. } => "task_timed_out",
            TaskError::ParentCancelledWithErrors { .. } => "parent_cancelled",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::ConditionFailed { condition, reason } => {
                format!("condition {condition}: {reason}")
            }
            TaskError::ConditionSatisfied { condition } => {
                format!("negated condition {condition} was satisfied")
            }
            TaskError::ConditionEvaluationCancelled => "condition evaluation cancelled".into(),
            TaskError::DependenciesFailed { count } => format!("failed dependencies: {count}"),
            TaskError::DependenciesCancelled { count } => {
                format!("cancelled dependencies: {count}")
            }
            TaskError::TimedOut { timeout } => format!("timeout: {timeout:?}"),
            TaskError::ParentCancelledWithErrors { errors } => {
                let inner: Vec<String> = errors.iter().map(TaskError::as_message).collect();
                format!("parent cancelled: [{}]", inner.join(", "))
            }
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }

    /// Indicates whether another attempt might succeed.
    ///
    /// Returns `true` for [`TaskError::Fail`] and [`TaskError::TimedOut`]. A retry group
    /// without a handler stops once an attempt fails with no retryable error.
    ///
    /// # Example
    /// ```
    /// use taskflow::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Fail { .. } | TaskError::TimedOut { .. })
    }
}

/// # Errors produced by misuse of the task and queue API.
///
/// These never end up in a task's error list; they are returned to the caller that
/// attempted the invalid operation, and the task is left unchanged.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// `finish` was called on a task that already has a finish pending or completed.
    #[error("task '{task}' already finished")]
    AlreadyFinished {
        /// Task name.
        task: String,
    },

    /// The operation is not allowed in the task's current state.
    #[error("task '{task}' cannot {action} while {state}")]
    InvalidState {
        /// Task name.
        task: String,
        /// State the task was in.
        state: TaskState,
        /// What was attempted.
        action: &'static str,
    },

    /// A task was made to depend on itself.
    #[error("task '{task}' cannot depend on itself")]
    SelfDependency {
        /// Task name.
        task: String,
    },

    /// The task was already added to a queue.
    #[error("task '{task}' was already added to a queue")]
    AlreadyEnqueued {
        /// Task name.
        task: String,
    },

    /// No tokio runtime is reachable to drive the task.
    #[error("no tokio runtime available to drive the queue")]
    NoRuntime,

    /// The group already decided to finish.
    #[error("group '{group}' is finishing and accepts no new children")]
    GroupFinishing {
        /// Group name.
        group: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use taskflow::RuntimeError;
    ///
    /// let err = RuntimeError::AlreadyFinished { task: "fetch".into() };
    /// assert_eq!(err.as_label(), "runtime_already_finished");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyFinished { .. } => "runtime_already_finished",
            RuntimeError::InvalidState { .. } => "runtime_invalid_state",
            RuntimeError::SelfDependency { .. } => "runtime_self_dependency",
            RuntimeError::AlreadyEnqueued { .. } => "runtime_already_enqueued",
            RuntimeError::NoRuntime => "runtime_missing",
            RuntimeError::GroupFinishing { .. } => "runtime_group_finishing",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_info(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
