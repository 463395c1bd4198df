//! Closure-based observer.

use crate::error::TaskError;
use crate::observers::Observe;
use crate::tasks::Task;

type TaskHook = Box<dyn Fn(&Task) + Send + Sync>;
type CancelHook = Box<dyn Fn(&Task, &[TaskError]) + Send + Sync>;
type ProduceHook = Box<dyn Fn(&Task, &Task) + Send + Sync>;
type WillFinishHook = Box<dyn Fn(&Task, &mut Vec<TaskError>) + Send + Sync>;
type DidFinishHook = Box<dyn Fn(&Task, &[TaskError]) + Send + Sync>;

/// Observer assembled from optional closures, one per lifecycle event.
///
/// ```
/// use taskflow::{BlockObserver, Task};
///
/// let task = Task::noop("report");
/// task.add_observer(
///     BlockObserver::new().on_did_finish(|task, errors| {
///         println!("{} finished with {} errors", task.name(), errors.len());
///     }),
/// )
/// .unwrap();
/// ```
#[derive(Default)]
pub struct BlockObserver {
    did_attach: Option<TaskHook>,
    will_execute: Option<TaskHook>,
    will_cancel: Option<CancelHook>,
    did_cancel: Option<TaskHook>,
    did_produce: Option<ProduceHook>,
    will_finish: Option<WillFinishHook>,
    did_finish: Option<DidFinishHook>,
}

impl BlockObserver {
    /// Observer with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_did_attach(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.did_attach = Some(Box::new(f));
        self
    }

    pub fn on_will_execute(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.will_execute = Some(Box::new(f));
        self
    }

    pub fn on_will_cancel(
        mut self,
        f: impl Fn(&Task, &[TaskError]) + Send + Sync + 'static,
    ) -> Self {
        self.will_cancel = Some(Box::new(f));
        self
    }

    pub fn on_did_cancel(mut self, f: impl Fn(&Task) + Send + Sync + 'static) -> Self {
        self.did_cancel = Some(Box::new(f));
        self
    }

    pub fn on_did_produce(mut self, f: impl Fn(&Task, &Task) + Send + Sync + 'static) -> Self {
        self.did_produce = Some(Box::new(f));
        self
    }

    /// The closure may append errors.
    pub fn on_will_finish(
        mut self,
        f: impl Fn(&Task, &mut Vec<TaskError>) + Send + Sync + 'static,
    ) -> Self {
        self.will_finish = Some(Box::new(f));
        self
    }

    pub fn on_did_finish(
        mut self,
        f: impl Fn(&Task, &[TaskError]) + Send + Sync + 'static,
    ) -> Self {
        self.did_finish = Some(Box::new(f));
        self
    }
}

impl Observe for BlockObserver {
    fn did_attach(&self, task: &Task) {
        if let Some(f) = &self.did_attach {
            f(task);
        }
    }

    fn will_execute(&self, task: &Task) {
        if let Some(f) = &self.will_execute {
            f(task);
        }
    }

    fn will_cancel(&self, task: &Task, errors: &[TaskError]) {
        if let Some(f) = &self.will_cancel {
            f(task, errors);
        }
    }

    fn did_cancel(&self, task: &Task) {
        if let Some(f) = &self.did_cancel {
            f(task);
        }
    }

    fn did_produce(&self, task: &Task, produced: &Task) {
        if let Some(f) = &self.did_produce {
            f(task, produced);
        }
    }

    fn will_finish(&self, task: &Task, errors: &mut Vec<TaskError>) {
        if let Some(f) = &self.will_finish {
            f(task, errors);
        }
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        if let Some(f) = &self.did_finish {
            f(task, errors);
        }
    }

    fn name(&self) -> &'static str {
        "block"
    }
}
