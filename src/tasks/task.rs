//! # Task handle.
//!
//! [`Task`] is a cheap, clonable handle (`Arc` inside) to one unit of work and its
//! lifecycle state. Everything that schedules, observes or depends on a task holds one.
//!
//! ## Ownership
//! ```text
//! Task ──► TaskInner ──► state     (watch channel, awaited by dependents)
//!                    ├─► core      (parking_lot mutex: deps, conditions, observers, errors)
//!                    ├─► token     (cancellation, handed to the body)
//!                    └─► finish    (Notify, wakes the driver on finish/preempt)
//! ```
//! The evaluator a queue builds for a task holds it weakly; dependents hold it strongly
//! until the task is `Finished`, at which point the task drops its body, observers,
//! conditions and dependency edges.
//!
//! ## Rules
//! - Dependencies and conditions can only change while `Initialized`.
//! - Observers can be attached until the task starts executing.
//! - `finish` succeeds once, and only while `Executing`.
//! - `cancel` is sticky and has no effect once the task is finishing.
//! - No state lock is held while user callbacks (observers, conditions, bodies) run.
//!   Observer dispatch does hold the task's reentrant dispatch gate; see
//!   [`Observe`](crate::Observe) for what that allows.
//! - Cancellation arriving after the driver collected the pre-finish errors is dropped:
//!   the task stays uncancelled rather than reporting errors it will never carry.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use tokio::sync::{Notify, watch};
use tokio_util::sync::CancellationToken;

use crate::conditions::Condition;
use crate::error::{RuntimeError, TaskError};
use crate::observers::{Observe, ObserverSet, TimeoutObserver, guarded};
use crate::tasks::body::{Body, TaskFn};
use crate::tasks::context::TaskContext;
use crate::tasks::state::{TaskId, TaskState, UserIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Regular,
    /// Condition evaluators and retry delays; groups do not aggregate their errors.
    Internal,
}

/// Outcome handed from `finish`/preempt to the driver.
#[derive(Debug, Default)]
pub(crate) struct FinishRequest {
    pub errors: Vec<TaskError>,
    pub preempted: bool,
}

#[derive(Default)]
struct TaskCore {
    body: Option<Arc<dyn Body>>,
    enqueued: bool,
    dependencies: Vec<Task>,
    /// Evaluator plus indirect (condition-provided) dependencies.
    gates: Vec<Task>,
    evaluator: Option<Task>,
    conditions: Vec<Arc<dyn Condition>>,
    exclusive: Vec<String>,
    observers: Vec<Arc<dyn Observe>>,
    produced: Vec<Task>,
    cancelling: bool,
    cancelled: bool,
    cancel_errors: Vec<TaskError>,
    /// Set once the driver collected `cancel_errors`; later cancellations are dropped.
    sealed: bool,
    observer_errors: Vec<TaskError>,
    finish: Option<FinishRequest>,
    errors: Vec<TaskError>,
    intent: UserIntent,
    timeout: Option<Duration>,
}

pub(crate) struct TaskInner {
    id: TaskId,
    kind: Kind,
    name: RwLock<Arc<str>>,
    state: watch::Sender<TaskState>,
    token: CancellationToken,
    finish_signal: Notify,
    gate: ReentrantMutex<()>,
    core: Mutex<TaskCore>,
}

/// Handle to a unit of work.
///
/// Equality and hashing use the task's [`TaskId`].
#[derive(Clone)]
pub struct Task {
    inner: Arc<TaskInner>,
}

/// Non-owning handle; see [`Task::downgrade`].
#[derive(Clone)]
pub struct WeakTask {
    inner: Weak<TaskInner>,
}

impl WeakTask {
    /// Returns the task if it is still alive.
    pub fn upgrade(&self) -> Option<Task> {
        self.inner.upgrade().map(|inner| Task { inner })
    }
}

impl Task {
    /// Creates a task running `body`.
    pub fn new(name: impl Into<Arc<str>>, body: impl Body) -> Self {
        Self::build(name.into(), Some(Arc::new(body)), Kind::Regular)
    }

    /// Creates a task from an async closure; the task finishes with the closure's result.
    pub fn from_fn<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::new(name, TaskFn::new(f))
    }

    /// Creates a task without a body; it finishes as soon as it is allowed to execute.
    pub fn noop(name: impl Into<Arc<str>>) -> Self {
        Self::build(name.into(), None, Kind::Regular)
    }

    pub(crate) fn internal(name: impl Into<Arc<str>>, body: impl Body) -> Self {
        Self::build(name.into(), Some(Arc::new(body)), Kind::Internal)
    }

    fn build(name: Arc<str>, body: Option<Arc<dyn Body>>, kind: Kind) -> Self {
        let (state, _) = watch::channel(TaskState::Initialized);
        Self {
            inner: Arc::new(TaskInner {
                id: TaskId::next(),
                kind,
                name: RwLock::new(name),
                state,
                token: CancellationToken::new(),
                finish_signal: Notify::new(),
                gate: ReentrantMutex::new(()),
                core: Mutex::new(TaskCore {
                    body,
                    ..TaskCore::default()
                }),
            }),
        }
    }

    /// Unique id.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Current name.
    pub fn name(&self) -> Arc<str> {
        self.inner.name.read().clone()
    }

    /// Renames the task (used in logs and events only).
    pub fn set_name(&self, name: impl Into<Arc<str>>) {
        *self.inner.name.write() = name.into();
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> TaskState {
        *self.inner.state.borrow()
    }

    /// True once the task reached [`TaskState::Finished`].
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }

    /// True once a cancellation took effect.
    pub fn is_cancelled(&self) -> bool {
        self.inner.core.lock().cancelled
    }

    /// Final errors once finished; the cancellation errors collected so far otherwise.
    pub fn errors(&self) -> Vec<TaskError> {
        let core = self.inner.core.lock();
        if self.is_finished() {
            core.errors.clone()
        } else {
            core.cancel_errors.clone()
        }
    }

    /// Token cancelled when the task is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// User-intent hint.
    pub fn user_intent(&self) -> UserIntent {
        self.inner.core.lock().intent
    }

    /// Sets the user-intent hint.
    pub fn set_user_intent(&self, intent: UserIntent) {
        self.inner.core.lock().intent = intent;
    }

    /// Returns a non-owning handle.
    pub fn downgrade(&self) -> WeakTask {
        WeakTask {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Makes this task wait until `dep` is finished.
    ///
    /// Adding the same dependency twice has no effect.
    pub fn add_dependency(&self, dep: &Task) -> Result<(), RuntimeError> {
        if dep.id() == self.id() {
            return Err(RuntimeError::SelfDependency {
                task: self.name().to_string(),
            });
        }
        let mut core = self.inner.core.lock();
        self.ensure_state(TaskState::Initialized, "add a dependency")?;
        if !core.dependencies.iter().any(|d| d.id() == dep.id()) {
            core.dependencies.push(dep.clone());
        }
        Ok(())
    }

    /// Adds several dependencies, stopping at the first rejected one.
    pub fn add_dependencies<'a>(
        &self,
        deps: impl IntoIterator<Item = &'a Task>,
    ) -> Result<(), RuntimeError> {
        deps.into_iter().try_for_each(|dep| self.add_dependency(dep))
    }

    /// Removes a dependency.
    pub fn remove_dependency(&self, dep: &Task) -> Result<(), RuntimeError> {
        let mut core = self.inner.core.lock();
        self.ensure_state(TaskState::Initialized, "remove a dependency")?;
        core.dependencies.retain(|d| d.id() != dep.id());
        Ok(())
    }

    /// Explicit dependencies (empty once the task finished).
    pub fn dependencies(&self) -> Vec<Task> {
        self.inner.core.lock().dependencies.clone()
    }

    /// Attaches a condition evaluated after the explicit dependencies finished.
    pub fn add_condition(&self, condition: impl Condition) -> Result<(), RuntimeError> {
        self.add_condition_arc(Arc::new(condition))
    }

    /// Shared-handle variant of [`add_condition`](Self::add_condition).
    pub fn add_condition_arc(&self, condition: Arc<dyn Condition>) -> Result<(), RuntimeError> {
        let mut core = self.inner.core.lock();
        self.ensure_state(TaskState::Initialized, "add a condition")?;
        core.conditions.push(condition);
        Ok(())
    }

    /// Attaches an observer.
    pub fn add_observer(&self, observer: impl Observe) -> Result<(), RuntimeError> {
        self.add_observer_arc(Arc::new(observer))
    }

    /// Shared-handle variant of [`add_observer`](Self::add_observer).
    pub fn add_observer_arc(&self, observer: Arc<dyn Observe>) -> Result<(), RuntimeError> {
        {
            let mut core = self.inner.core.lock();
            let state = self.state();
            if state >= TaskState::Executing {
                return Err(self.invalid(state, "attach an observer"));
            }
            core.observers.push(observer.clone());
        }
        let _gate = self.dispatch_gate();
        let mut attach = |o: &dyn Observe| o.did_attach(self);
        if let Some(err) = guarded(self, observer.as_ref(), "did_attach", &mut attach) {
            self.inner.core.lock().observer_errors.push(err);
        }
        Ok(())
    }

    /// Attaches a deadline: once executing for longer than `timeout`, the task is
    /// cancelled with [`TaskError::TimedOut`] and its body preempted.
    ///
    /// Tasks with an explicit deadline ignore the queue's default one.
    pub fn add_timeout(&self, timeout: Duration) -> Result<(), RuntimeError> {
        self.add_observer(TimeoutObserver::new(timeout))?;
        self.inner.core.lock().timeout = Some(timeout);
        Ok(())
    }

    /// Cancels the task without errors.
    pub fn cancel(&self) {
        self.cancel_with(Vec::new());
    }

    /// Cancels the task, recording `errors` among its final errors.
    ///
    /// Not-yet-started tasks skip their body; a running body sees its context cancelled
    /// and decides how to finish. Repeated calls and calls on finishing tasks are no-ops.
    pub fn cancel_with(&self, errors: Vec<TaskError>) {
        self.cancel_inner(errors);
    }

    fn cancel_inner(&self, errors: Vec<TaskError>) -> bool {
        {
            let mut core = self.inner.core.lock();
            if core.cancelling || self.state() >= TaskState::Finishing {
                return false;
            }
            core.cancelling = true;
        }
        let observers = self.observers();
        let panics = observers.will_cancel(self, &errors);
        {
            let mut core = self.inner.core.lock();
            if core.sealed {
                tracing::debug!(task = %self.name(), id = %self.id(), "cancel lost the race with finishing");
                return false;
            }
            core.cancelled = true;
            core.cancel_errors.extend(errors);
            core.observer_errors.extend(panics);
        }
        self.inner.token.cancel();
        tracing::debug!(task = %self.name(), id = %self.id(), "cancelled");

        let panics = observers.did_cancel(self);
        self.inner.core.lock().observer_errors.extend(panics);
        true
    }

    /// Cancels with `errors` and, if the body is running, finishes it right away.
    ///
    /// Bodies that run when cancelled (groups) are only cancelled: they wind down their
    /// members themselves and must not be cut short.
    pub(crate) fn preempt(&self, errors: Vec<TaskError>) {
        if !self.cancel_inner(errors.clone()) {
            let mut core = self.inner.core.lock();
            if !core.sealed && self.state() < TaskState::Finishing {
                core.cancel_errors.extend(errors);
            }
        }
        if self.runs_when_cancelled() {
            return;
        }
        let mut core = self.inner.core.lock();
        if self.state() == TaskState::Executing && core.finish.is_none() {
            core.finish = Some(FinishRequest {
                errors: Vec::new(),
                preempted: true,
            });
            drop(core);
            self.inner.finish_signal.notify_one();
        }
    }

    /// Hands a new task to the queue this task runs on; this task does not finish
    /// before the produced one has.
    ///
    /// Only valid between enqueueing and finishing.
    pub fn produce(&self, child: impl Into<Task>) -> Result<(), RuntimeError> {
        let child = child.into();
        {
            let mut core = self.inner.core.lock();
            let state = self.state();
            if state == TaskState::Initialized || state >= TaskState::Finishing {
                return Err(self.invalid(state, "produce a task"));
            }
            core.produced.push(child.clone());
        }
        let panics = self.observers().did_produce(self, &child);
        self.inner.core.lock().observer_errors.extend(panics);
        Ok(())
    }

    /// Reports the body's outcome.
    ///
    /// Returns [`RuntimeError::AlreadyFinished`] on a second call (the task is left
    /// unchanged) and [`RuntimeError::InvalidState`] outside `Executing`.
    pub fn finish(&self, errors: Vec<TaskError>) -> Result<(), RuntimeError> {
        let mut core = self.inner.core.lock();
        let state = self.state();
        if core.finish.is_some() || state >= TaskState::Finishing {
            return Err(RuntimeError::AlreadyFinished {
                task: self.name().to_string(),
            });
        }
        if state != TaskState::Executing {
            return Err(self.invalid(state, "finish"));
        }
        core.finish = Some(FinishRequest {
            errors,
            preempted: false,
        });
        drop(core);
        self.inner.finish_signal.notify_one();
        Ok(())
    }

    /// Waits until the task is `Finished` and returns its final errors.
    pub async fn finished(&self) -> Vec<TaskError> {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| s.is_terminal()).await;
        self.errors()
    }

    fn ensure_state(&self, expected: TaskState, action: &'static str) -> Result<(), RuntimeError> {
        let state = self.state();
        if state == expected {
            Ok(())
        } else {
            Err(self.invalid(state, action))
        }
    }

    fn invalid(&self, state: TaskState, action: &'static str) -> RuntimeError {
        RuntimeError::InvalidState {
            task: self.name().to_string(),
            state,
            action,
        }
    }
}

/// Driver and queue plumbing.
impl Task {
    #[inline]
    pub(crate) fn is_internal(&self) -> bool {
        self.inner.kind == Kind::Internal
    }

    pub(crate) fn dispatch_gate(&self) -> ReentrantMutexGuard<'_, ()> {
        self.inner.gate.lock()
    }

    pub(crate) fn mark_enqueued(&self) -> Result<(), RuntimeError> {
        let mut core = self.inner.core.lock();
        if core.enqueued || self.state() != TaskState::Initialized {
            return Err(RuntimeError::AlreadyEnqueued {
                task: self.name().to_string(),
            });
        }
        core.enqueued = true;
        Ok(())
    }

    /// Moves forward to `to`; never moves backwards.
    pub(crate) fn transition(&self, to: TaskState) {
        let _core = self.inner.core.lock();
        self.inner.state.send_if_modified(|s| {
            if *s < to {
                *s = to;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn body(&self) -> Option<Arc<dyn Body>> {
        self.inner.core.lock().body.clone()
    }

    pub(crate) fn runs_when_cancelled(&self) -> bool {
        self.body().is_some_and(|b| b.runs_when_cancelled())
    }

    pub(crate) fn observers(&self) -> ObserverSet {
        ObserverSet::new(self.inner.core.lock().observers.clone())
    }

    pub(crate) fn conditions(&self) -> Vec<Arc<dyn Condition>> {
        self.inner.core.lock().conditions.clone()
    }

    pub(crate) fn has_conditions(&self) -> bool {
        !self.inner.core.lock().conditions.is_empty()
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.inner.core.lock().timeout
    }

    pub(crate) fn set_exclusive(&self, categories: Vec<String>) {
        self.inner.core.lock().exclusive = categories;
    }

    pub(crate) fn exclusive(&self) -> Vec<String> {
        self.inner.core.lock().exclusive.clone()
    }

    pub(crate) fn set_gates(&self, evaluator: Task, indirect: Vec<Task>) {
        let mut core = self.inner.core.lock();
        core.gates = indirect;
        core.gates.push(evaluator.clone());
        core.evaluator = Some(evaluator);
    }

    pub(crate) fn gates(&self) -> Vec<Task> {
        self.inner.core.lock().gates.clone()
    }

    pub(crate) fn evaluator(&self) -> Option<Task> {
        self.inner.core.lock().evaluator.clone()
    }

    pub(crate) fn produced(&self) -> Vec<Task> {
        self.inner.core.lock().produced.clone()
    }

    pub(crate) fn finish_signal(&self) -> &Notify {
        &self.inner.finish_signal
    }

    /// Takes the reported errors; the request itself stays so later finishes are rejected.
    pub(crate) fn take_finish_request(&self) -> FinishRequest {
        let mut core = self.inner.core.lock();
        match core.finish.as_mut() {
            Some(request) => FinishRequest {
                errors: std::mem::take(&mut request.errors),
                preempted: request.preempted,
            },
            None => FinishRequest::default(),
        }
    }

    /// Cancellation errors followed by errors raised by panicking observers.
    pub(crate) fn take_pre_finish_errors(&self) -> Vec<TaskError> {
        let mut core = self.inner.core.lock();
        core.sealed = true;
        let mut errors = core.cancel_errors.clone();
        errors.append(&mut core.observer_errors);
        errors
    }

    pub(crate) fn record_observer_errors(&self, errors: Vec<TaskError>) {
        self.inner.core.lock().observer_errors.extend(errors);
    }

    pub(crate) fn store_errors(&self, errors: Vec<TaskError>) {
        self.inner.core.lock().errors = errors;
    }

    /// Marks the task `Finished` and drops everything it no longer needs.
    pub(crate) fn complete(&self) {
        let released = {
            let mut core = self.inner.core.lock();
            let released = (
                core.body.take(),
                std::mem::take(&mut core.observers),
                std::mem::take(&mut core.conditions),
                std::mem::take(&mut core.dependencies),
                std::mem::take(&mut core.gates),
                core.evaluator.take(),
                std::mem::take(&mut core.produced),
            );
            self.inner.state.send_replace(TaskState::Finished);
            released
        };
        // dropped outside the lock: a body may own queues whose teardown touches tasks
        drop(released);
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}
