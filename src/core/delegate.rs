//! Queue-level hooks.

use crate::core::TaskQueue;
use crate::error::TaskError;
use crate::tasks::Task;

/// Callbacks a queue makes for every task it runs. All methods default to no-ops.
///
/// Called synchronously on the thread driving the task; implementations must not
/// block for long.
pub trait QueueDelegate: Send + Sync + 'static {
    /// A task is about to be started by `queue`.
    fn will_add(&self, _queue: &TaskQueue, _task: &Task) {}

    /// A running task produced `produced`, which is about to be added to `queue`.
    fn will_produce(&self, _queue: &TaskQueue, _produced: &Task) {}

    /// A task is finishing with `errors` (after its own will-finish observers).
    fn will_finish(&self, _queue: &TaskQueue, _task: &Task, _errors: &[TaskError]) {}

    /// A task finished with `errors`.
    fn did_finish(&self, _queue: &TaskQueue, _task: &Task, _errors: &[TaskError]) {}

    /// An opaque work item added with [`TaskQueue::add_opaque`] finished.
    fn did_finish_opaque(&self, _queue: &TaskQueue, _name: &str) {}
}
