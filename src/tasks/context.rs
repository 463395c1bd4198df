//! Execution context handed to a task body.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::core::TaskQueue;
use crate::error::{RuntimeError, TaskError};
use crate::tasks::Task;

/// What a running body can see and do.
///
/// Clonable; clones refer to the same task and may be moved to other threads or tasks.
#[derive(Clone)]
pub struct TaskContext {
    task: Task,
    queue: TaskQueue,
    token: CancellationToken,
}

impl TaskContext {
    pub(crate) fn new(task: Task, queue: TaskQueue) -> Self {
        let token = task.cancellation_token();
        Self { task, queue, token }
    }

    /// The task being executed.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The task's name.
    pub fn name(&self) -> Arc<str> {
        self.task.name()
    }

    /// The queue running the task.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Cancellation token of the task.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once the task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Resolves when the task is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Finishes the task; see [`Task::finish`].
    pub fn finish(&self, errors: Vec<TaskError>) -> Result<(), RuntimeError> {
        self.task.finish(errors)
    }

    /// Produces a new task into the same queue; see [`Task::produce`].
    pub fn produce(&self, child: impl Into<Task>) -> Result<(), RuntimeError> {
        self.task.produce(child)
    }
}
