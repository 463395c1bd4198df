//! Deadline observer.

use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::TaskError;
use crate::observers::Observe;
use crate::tasks::{Task, TaskState};

/// Preempts a task that has been executing for longer than `timeout`.
///
/// The timer starts in `will_execute` and holds the task weakly, so a finished task
/// is never kept alive by its deadline. On expiry the task is cancelled with
/// [`TaskError::TimedOut`] and its body stops being awaited.
///
/// Usually attached through [`Task::add_timeout`] or a queue's default timeout.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutObserver {
    timeout: Duration,
}

impl TimeoutObserver {
    /// Creates a deadline of `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Configured deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Observe for TimeoutObserver {
    fn will_execute(&self, task: &Task) {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(task = %task.name(), "no tokio runtime, deadline ignored");
            return;
        };
        let timeout = self.timeout;
        let weak = task.downgrade();
        runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(task) = weak.upgrade() else {
                return;
            };
            if task.state() >= TaskState::Finishing || task.is_cancelled() {
                return;
            }
            tracing::warn!(task = %task.name(), id = %task.id(), ?timeout, "deadline exceeded");
            task.preempt(vec![TaskError::TimedOut { timeout }]);
        });
    }

    fn name(&self) -> &'static str {
        "timeout"
    }
}
