//! # Observe: per-task lifecycle hooks
//!
//! The [`Observe`] trait is the main **extension point** for reacting to what a task
//! does. Observers are attached to a single task (before it starts executing) and are
//! called synchronously, in attachment order, at each lifecycle event:
//!
//! ```text
//! add_observer ─► did_attach
//! driver:         will_execute ─► (body) ─► will_finish(&mut errors) ─► did_finish
//! cancel_with:    will_cancel ─► did_cancel
//! produce:        did_produce
//! ```
//!
//! ## Rules
//! - Calls for one task never overlap: a per-task reentrant gate serializes dispatch,
//!   so an observer may itself cancel or produce on the same task.
//! - The gate stays held while the observer runs. An observer of task A that blocks on,
//!   or dispatches to, task B while B's observers do the same towards A can deadlock
//!   across threads. Hand such cross-task work to `tokio::spawn` instead.
//! - `will_finish` may **append** errors (recovery hooks); removal is not possible.
//! - A panicking observer is isolated with `catch_unwind`, logged through `tracing`,
//!   and turned into [`TaskError::Panicked`] for events that happen before the task's
//!   errors are final.
//!
//! **Warning**: `AssertUnwindSafe` is used, so an observer that panics while holding
//! its own lock may leave that state poisoned or inconsistent.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::error::{TaskError, panic_info};
use crate::tasks::Task;

/// Lifecycle hooks for a single task. Every method has an empty default.
pub trait Observe: Send + Sync + 'static {
    /// Called once, right after the observer was attached.
    fn did_attach(&self, _task: &Task) {}

    /// Called before the body starts.
    fn will_execute(&self, _task: &Task) {}

    /// Called before a cancellation takes effect.
    fn will_cancel(&self, _task: &Task, _errors: &[TaskError]) {}

    /// Called after a cancellation took effect.
    fn did_cancel(&self, _task: &Task) {}

    /// Called after `task` produced `produced`.
    fn did_produce(&self, _task: &Task, _produced: &Task) {}

    /// Called while finishing; may append to `errors`.
    fn will_finish(&self, _task: &Task, _errors: &mut Vec<TaskError>) {}

    /// Called with the task's final errors, just before it becomes `Finished`.
    fn did_finish(&self, _task: &Task, _errors: &[TaskError]) {}

    /// Name used in logs when this observer panics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Ordered snapshot of a task's observers with panic-isolated dispatch.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn Observe>>,
}

impl ObserverSet {
    /// Wraps a list of observers.
    pub fn new(observers: Vec<Arc<dyn Observe>>) -> Self {
        Self { observers }
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// True when no observer is attached.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub(crate) fn will_execute(&self, task: &Task) -> Vec<TaskError> {
        self.each(task, "will_execute", |o| o.will_execute(task))
    }

    pub(crate) fn will_cancel(&self, task: &Task, errors: &[TaskError]) -> Vec<TaskError> {
        self.each(task, "will_cancel", |o| o.will_cancel(task, errors))
    }

    pub(crate) fn did_cancel(&self, task: &Task) -> Vec<TaskError> {
        self.each(task, "did_cancel", |o| o.did_cancel(task))
    }

    pub(crate) fn did_produce(&self, task: &Task, produced: &Task) -> Vec<TaskError> {
        self.each(task, "did_produce", |o| o.did_produce(task, produced))
    }

    pub(crate) fn will_finish(&self, task: &Task, errors: &mut Vec<TaskError>) -> Vec<TaskError> {
        self.each(task, "will_finish", |o| o.will_finish(task, errors))
    }

    /// Errors are final at this point, so panics are only logged.
    pub(crate) fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        let _ = self.each(task, "did_finish", |o| o.did_finish(task, errors));
    }

    fn each(
        &self,
        task: &Task,
        event: &'static str,
        mut f: impl FnMut(&dyn Observe),
    ) -> Vec<TaskError> {
        let _gate = task.dispatch_gate();
        self.observers
            .iter()
            .filter_map(|o| guarded(task, o.as_ref(), event, &mut f))
            .collect()
    }
}

/// Calls `f(observer)`, converting a panic into [`TaskError::Panicked`].
pub(crate) fn guarded(
    task: &Task,
    observer: &dyn Observe,
    event: &'static str,
    f: &mut dyn FnMut(&dyn Observe),
) -> Option<TaskError> {
    let payload = catch_unwind(AssertUnwindSafe(|| f(observer))).err()?;
    let info = panic_info(payload.as_ref());
    tracing::error!(
        task = %task.name(),
        id = %task.id(),
        observer = observer.name(),
        event,
        "observer panicked: {info}"
    );
    Some(TaskError::Panicked {
        info: format!("observer {} panicked in {event}: {info}", observer.name()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        tag: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Observe for Recorder {
        fn will_execute(&self, _task: &Task) {
            self.seen.lock().push(format!("{}:will_execute", self.tag));
        }

        fn will_finish(&self, _task: &Task, errors: &mut Vec<TaskError>) {
            errors.push(TaskError::fail(self.tag));
        }
    }

    struct Panicky;

    impl Observe for Panicky {
        fn will_execute(&self, _task: &Task) {
            panic!("observer exploded");
        }
    }

    #[test]
    fn dispatch_follows_attachment_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new(vec![
            Arc::new(Recorder {
                tag: "a",
                seen: seen.clone(),
            }),
            Arc::new(Recorder {
                tag: "b",
                seen: seen.clone(),
            }),
        ]);
        let task = Task::noop("observed");

        assert!(set.will_execute(&task).is_empty());
        assert_eq!(*seen.lock(), vec!["a:will_execute", "b:will_execute"]);

        let mut errors = Vec::new();
        assert!(set.will_finish(&task, &mut errors).is_empty());
        assert_eq!(errors, vec![TaskError::fail("a"), TaskError::fail("b")]);
    }

    #[test]
    fn observer_may_cancel_its_own_task() {
        struct CancelOnStart;
        impl Observe for CancelOnStart {
            fn will_execute(&self, task: &Task) {
                task.cancel_with(vec![TaskError::fail("not today")]);
            }
        }

        let task = Task::noop("observed");
        task.add_observer(CancelOnStart).unwrap();
        let _gate = task.dispatch_gate();
        assert!(task.observers().will_execute(&task).is_empty());
        assert!(task.is_cancelled());
        assert_eq!(task.errors(), vec![TaskError::fail("not today")]);
    }

    #[test]
    fn panics_are_isolated_and_reported() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let set = ObserverSet::new(vec![
            Arc::new(Panicky),
            Arc::new(Recorder {
                tag: "after",
                seen: seen.clone(),
            }),
        ]);
        let task = Task::noop("observed");

        let panics = set.will_execute(&task);
        assert_eq!(panics.len(), 1);
        assert!(matches!(&panics[0], TaskError::Panicked { info } if info.contains("observer exploded")));
        assert_eq!(*seen.lock(), vec!["after:will_execute"]);
    }
}
