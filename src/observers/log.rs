//! # LogObserver: lifecycle tracer
//!
//! Emits one `tracing` record per lifecycle event of the task it is attached to.
//! Enabled via the `logging` feature; meant for demos and debugging.
//!
//! ## Example output (with a fmt subscriber)
//! ```text
//! INFO taskflow: executing task="fetch" id=#3
//! INFO taskflow: produced task="fetch" produced="parse"
//! WARN taskflow: finished with errors task="fetch" errors=1 first="failed: connection refused"
//! ```

use crate::error::TaskError;
use crate::observers::Observe;
use crate::tasks::Task;

/// Traces every lifecycle event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl LogObserver {
    /// Construct a new [`LogObserver`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Observe for LogObserver {
    fn did_attach(&self, task: &Task) {
        tracing::debug!(task = %task.name(), id = %task.id(), "observer attached");
    }

    fn will_execute(&self, task: &Task) {
        tracing::info!(task = %task.name(), id = %task.id(), "executing");
    }

    fn will_cancel(&self, task: &Task, errors: &[TaskError]) {
        tracing::info!(task = %task.name(), id = %task.id(), errors = errors.len(), "cancelling");
    }

    fn did_cancel(&self, task: &Task) {
        tracing::debug!(task = %task.name(), id = %task.id(), "cancelled");
    }

    fn did_produce(&self, task: &Task, produced: &Task) {
        tracing::info!(task = %task.name(), produced = %produced.name(), "produced");
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        match errors.first() {
            None => tracing::info!(task = %task.name(), id = %task.id(), "finished"),
            Some(first) => tracing::warn!(
                task = %task.name(),
                id = %task.id(),
                errors = errors.len(),
                first = %first,
                "finished with errors"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
