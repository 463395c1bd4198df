//! # Condition: a named gate on execution.
//!
//! A [`Condition`] is evaluated after a task's explicit dependencies finished and
//! before its body may run. Conditions can also:
//! - declare **mutual exclusivity** under a category, serializing every task that
//!   carries a condition of that category;
//! - provide a **dependency** task that must finish before evaluation (an "indirect"
//!   dependency, scheduled by the queue ahead of the gated task).
//!
//! # Example
//! ```rust
//! use async_trait::async_trait;
//! use taskflow::{Condition, ConditionResult, Task};
//!
//! struct Online;
//!
//! #[async_trait]
//! impl Condition for Online {
//!     fn name(&self) -> &str { "Online" }
//!
//!     async fn evaluate(&self, _task: &Task) -> ConditionResult {
//!         ConditionResult::Satisfied
//!     }
//! }
//! ```

use std::borrow::Cow;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::Task;

/// Outcome of one condition evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionResult {
    /// The task may proceed.
    Satisfied,
    /// The task finishes with this error and its body never runs.
    Failed(TaskError),
}

impl ConditionResult {
    /// Shorthand for a [`TaskError::ConditionFailed`] failure.
    pub fn failed(condition: &str, reason: impl Into<String>) -> Self {
        ConditionResult::Failed(TaskError::ConditionFailed {
            condition: condition.to_string(),
            reason: reason.into(),
        })
    }

    /// True for [`ConditionResult::Satisfied`].
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ConditionResult::Satisfied)
    }
}

/// Named predicate gating a task.
#[async_trait]
pub trait Condition: Send + Sync + 'static {
    /// Name used in errors and logs.
    fn name(&self) -> &str;

    /// Whether tasks carrying this condition are serialized by [`category`](Self::category).
    fn is_mutually_exclusive(&self) -> bool {
        false
    }

    /// Exclusivity category; defaults to the condition's name.
    fn category(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.name())
    }

    /// Task that must finish before this condition is evaluated.
    ///
    /// Called once, when the gated task is added to a queue.
    fn dependency(&self, _task: &Task) -> Option<Task> {
        None
    }

    /// Decides whether `task` may run.
    async fn evaluate(&self, task: &Task) -> ConditionResult;
}
