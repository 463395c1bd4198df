//! What a repeat or retry group schedules next.

use std::fmt;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::{Delay, Task};

/// Adjusts a freshly generated instance before it is added.
pub type Configure = Arc<dyn Fn(&Task) + Send + Sync>;

/// One generated instance: the task, how long to wait before it, an optional
/// configurator applied just before it is added, and an optional [`Repeatable`]
/// consulted once this instance finishes.
///
/// The delay of the very first payload is ignored; it starts right away.
#[derive(Clone)]
pub struct RepeatPayload {
    pub(crate) delay: Option<Delay>,
    pub(crate) task: Task,
    pub(crate) configure: Option<Configure>,
    pub(crate) repeatable: Option<Arc<dyn Repeatable>>,
}

impl RepeatPayload {
    /// Payload for `task` with no delay and no configurator.
    pub fn new(task: impl Into<Task>) -> Self {
        Self {
            delay: None,
            task: task.into(),
            configure: None,
            repeatable: None,
        }
    }

    /// Replaces the delay.
    pub fn with_delay(mut self, delay: impl Into<Delay>) -> Self {
        self.delay = Some(delay.into());
        self
    }

    /// Removes the delay.
    pub fn without_delay(mut self) -> Self {
        self.delay = None;
        self
    }

    /// Replaces the configurator.
    pub fn with_configure(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.configure = Some(Arc::new(f));
        self
    }

    /// Decides, from this instance's outcome, whether another one follows.
    ///
    /// Takes precedence over the builder's predicate for this instance.
    pub fn with_repeatable(mut self, r: impl Repeatable) -> Self {
        self.repeatable = Some(Arc::new(r));
        self
    }

    pub fn delay(&self) -> Option<Delay> {
        self.delay
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn configure(&self) -> Option<&Configure> {
        self.configure.as_ref()
    }
}

impl fmt::Debug for RepeatPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepeatPayload")
            .field("delay", &self.delay)
            .field("task", &self.task)
            .field("configure", &self.configure.is_some())
            .field("repeatable", &self.repeatable.is_some())
            .finish()
    }
}

/// Decides whether another instance is scheduled once `instance` finished.
///
/// `errors` are the instance's errors as it finishes and `count` the number of
/// instances started so far. Implemented for closures
/// `Fn(&Task, &[TaskError], usize) -> bool`.
pub trait Repeatable: Send + Sync + 'static {
    fn should_repeat(&self, instance: &Task, errors: &[TaskError], count: usize) -> bool;
}

impl<F> Repeatable for F
where
    F: Fn(&Task, &[TaskError], usize) -> bool + Send + Sync + 'static,
{
    fn should_repeat(&self, instance: &Task, errors: &[TaskError], count: usize) -> bool {
        self(instance, errors, count)
    }
}

/// Source of payloads; `None` ends the sequence.
pub type Generator = Box<dyn FnMut() -> Option<RepeatPayload> + Send>;
