//! # Task queue.
//!
//! [`TaskQueue`] accepts tasks, wires them (observers, conditions, exclusivity edges)
//! and spawns one driver per task on the tokio runtime. The driver parks the task until
//! its dependencies and conditions allow it to run, then executes its body under the
//! queue's concurrency limit.
//!
//! ## Insertion
//! ```text
//! add(T)
//!   1. attach queue hooks: produced children are added here, finish events reach the delegate
//!   2. attach the default deadline (if configured and T has none)
//!   3. if T has conditions:
//!        swap T into the exclusivity registry per category → previous holders become deps
//!        build evaluator + indirect deps (conditions::evaluator), add them first
//!   4. delegate.will_add(T), track T, spawn driver(T)
//! ```
//!
//! ## Rules
//! - A task can be added once, to one queue, while `Initialized`.
//! - Suspension stops tasks from **starting**; running bodies are unaffected.
//! - `max_concurrent` bounds running bodies only; waiting tasks hold no permit.
//! - No lock is held while the delegate or any task callback runs.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast, watch};

use crate::conditions::evaluator;
use crate::core::config::QueueConfig;
use crate::core::delegate::QueueDelegate;
use crate::core::driver;
use crate::core::exclusivity::ExclusivityRegistry;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::observers::Observe;
use crate::tasks::{Task, TaskId, TaskState};

pub(crate) struct QueueInner {
    name: Arc<str>,
    cfg: QueueConfig,
    semaphore: Option<Arc<Semaphore>>,
    suspended: watch::Sender<bool>,
    /// Tracked tasks plus running opaque work items.
    active: watch::Sender<usize>,
    tasks: Mutex<HashMap<TaskId, Task>>,
    delegate: RwLock<Option<Arc<dyn QueueDelegate>>>,
    exclusivity: RwLock<Arc<ExclusivityRegistry>>,
    bus: Bus,
    runtime: OnceLock<Handle>,
}

/// Dependency-aware, concurrency-limited task queue. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<QueueInner>,
}

/// Builder for [`TaskQueue`].
pub struct QueueBuilder {
    cfg: QueueConfig,
    delegate: Option<Arc<dyn QueueDelegate>>,
    exclusivity: Option<Arc<ExclusivityRegistry>>,
    runtime: Option<Handle>,
    suspended: bool,
}

impl QueueBuilder {
    /// Starts from `cfg`.
    pub fn new(cfg: QueueConfig) -> Self {
        Self {
            cfg,
            delegate: None,
            exclusivity: None,
            runtime: None,
            suspended: false,
        }
    }

    /// Installs a delegate.
    pub fn with_delegate(mut self, delegate: Arc<dyn QueueDelegate>) -> Self {
        self.delegate = Some(delegate);
        self
    }

    /// Shares an exclusivity registry (a fresh one is created otherwise).
    pub fn with_exclusivity(mut self, registry: Arc<ExclusivityRegistry>) -> Self {
        self.exclusivity = Some(registry);
        self
    }

    /// Runtime used when tasks are added from outside any tokio context.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Caps concurrency at one running body.
    pub fn serial(mut self) -> Self {
        self.cfg.max_concurrent = 1;
        self
    }

    /// Starts suspended; nothing executes until [`TaskQueue::resume`].
    pub fn suspended(mut self) -> Self {
        self.suspended = true;
        self
    }

    /// Builds the queue. No runtime is needed until the first task is added.
    pub fn build(self) -> TaskQueue {
        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(|n| Arc::new(Semaphore::new(n)));
        let (suspended, _) = watch::channel(self.suspended);
        let (active, _) = watch::channel(0usize);
        let runtime = OnceLock::new();
        if let Some(handle) = self.runtime {
            let _ = runtime.set(handle);
        }
        TaskQueue {
            inner: Arc::new(QueueInner {
                name: Arc::from(self.cfg.name.as_str()),
                bus: Bus::new(self.cfg.bus_capacity_clamped()),
                cfg: self.cfg,
                semaphore,
                suspended,
                active,
                tasks: Mutex::new(HashMap::new()),
                delegate: RwLock::new(self.delegate),
                exclusivity: RwLock::new(self.exclusivity.unwrap_or_default()),
                runtime,
            }),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl TaskQueue {
    /// Creates a queue from `cfg`.
    pub fn new(cfg: QueueConfig) -> Self {
        QueueBuilder::new(cfg).build()
    }

    /// Starts a builder.
    pub fn builder(cfg: QueueConfig) -> QueueBuilder {
        QueueBuilder::new(cfg)
    }

    /// Queue running one body at a time.
    pub fn serial(name: impl Into<String>) -> Self {
        QueueBuilder::new(QueueConfig::named(name)).serial().build()
    }

    /// Queue name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.inner.cfg
    }

    /// Replaces (or removes) the delegate.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn QueueDelegate>>) {
        *self.inner.delegate.write() = delegate;
    }

    /// Exclusivity registry used for tasks added from now on.
    pub fn exclusivity(&self) -> Arc<ExclusivityRegistry> {
        self.inner.exclusivity.read().clone()
    }

    pub(crate) fn adopt_exclusivity(&self, registry: Arc<ExclusivityRegistry>) {
        *self.inner.exclusivity.write() = registry;
    }

    /// Subscribes to this queue's events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.bus.subscribe()
    }

    /// Adds a task; see the module docs for the wiring performed.
    pub fn add(&self, task: impl Into<Task>) -> Result<(), RuntimeError> {
        let task = task.into();
        let runtime = self.runtime()?;
        task.mark_enqueued()?;

        task.add_observer(QueueHooks {
            queue: Arc::downgrade(&self.inner),
        })?;
        if !task.is_internal() && task.timeout().is_none() {
            if let Some(timeout) = self.inner.cfg.default_timeout() {
                task.add_timeout(timeout)?;
            }
        }
        if task.has_conditions() {
            self.wire_conditions(&task)?;
        }

        if let Some(delegate) = self.delegate() {
            delegate.will_add(self, &task);
        }
        self.track(&task);
        self.publish(
            Event::new(EventKind::TaskAdded)
                .with_task(task.name())
                .with_task_id(task.id()),
        );
        tracing::trace!(queue = %self.inner.name, task = %task.name(), id = %task.id(), "task added");

        task.transition(TaskState::Pending);
        runtime.spawn(driver::drive(self.clone(), task));
        Ok(())
    }

    /// Adds several tasks in order, stopping at the first rejected one.
    pub fn add_all<I, T>(&self, tasks: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        tasks.into_iter().try_for_each(|t| self.add(t))
    }

    /// Runs an opaque future under the queue's suspension and concurrency rules.
    ///
    /// Opaque work has no lifecycle, conditions or observers; its completion is
    /// reported through [`QueueDelegate::did_finish_opaque`].
    pub fn add_opaque<F>(&self, name: impl Into<Arc<str>>, work: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.runtime()?;
        let name = name.into();
        self.inner.active.send_modify(|n| *n += 1);

        let queue = self.clone();
        runtime.spawn(async move {
            let permit = queue.admit().await;
            work.await;
            drop(permit);

            queue.publish(Event::new(EventKind::OpaqueFinished).with_task(name.clone()));
            if let Some(delegate) = queue.delegate() {
                delegate.did_finish_opaque(&queue, &name);
            }
            queue.inner.active.send_modify(|n| *n = n.saturating_sub(1));
        });
        Ok(())
    }

    /// Stops starting new work.
    pub fn suspend(&self) {
        if !self.inner.suspended.send_replace(true) {
            self.publish(Event::new(EventKind::QueueSuspended));
        }
    }

    /// Lets waiting work start again.
    pub fn resume(&self) {
        if self.inner.suspended.send_replace(false) {
            self.publish(Event::new(EventKind::QueueResumed));
        }
    }

    /// True while suspended.
    pub fn is_suspended(&self) -> bool {
        *self.inner.suspended.borrow()
    }

    /// Cancels every unfinished task in the queue.
    pub fn cancel_all(&self) {
        for task in self.tasks() {
            task.cancel();
        }
    }

    /// Unfinished tasks, internal ones included.
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.tasks.lock().values().cloned().collect()
    }

    /// Number of unfinished tasks and running opaque items.
    pub fn len(&self) -> usize {
        *self.inner.active.borrow()
    }

    /// True when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until every tracked task finished and no opaque item is running.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.active.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    fn wire_conditions(&self, task: &Task) -> Result<(), RuntimeError> {
        let registry = self.exclusivity();
        let mut categories: Vec<String> = Vec::new();
        for condition in task.conditions() {
            if condition.is_mutually_exclusive() {
                let category = condition.category().into_owned();
                if !categories.contains(&category) {
                    categories.push(category);
                }
            }
        }

        let mut predecessors: Vec<Task> = Vec::new();
        for category in &categories {
            if let Some(previous) = registry.register(task, category) {
                if !predecessors.contains(&previous) {
                    predecessors.push(previous);
                }
            }
        }
        task.add_dependencies(&predecessors)?;
        task.set_exclusive(categories);

        let wiring = evaluator::wire(task, &predecessors);
        for dep in &wiring.indirect {
            match self.add(dep.clone()) {
                Ok(()) | Err(RuntimeError::AlreadyEnqueued { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        self.add(wiring.evaluator.clone())?;
        task.set_gates(wiring.evaluator, wiring.indirect);
        Ok(())
    }

    fn runtime(&self) -> Result<Handle, RuntimeError> {
        if let Ok(handle) = Handle::try_current() {
            let _ = self.inner.runtime.set(handle.clone());
            return Ok(handle);
        }
        self.inner.runtime.get().cloned().ok_or(RuntimeError::NoRuntime)
    }

    pub(crate) fn delegate(&self) -> Option<Arc<dyn QueueDelegate>> {
        self.inner.delegate.read().clone()
    }

    pub(crate) fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev.with_queue(self.inner.name.clone()));
    }

    /// Waits for the queue to be resumed, then for a concurrency permit.
    pub(crate) async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        let mut rx = self.inner.suspended.subscribe();
        let _ = rx.wait_for(|suspended| !*suspended).await;
        match &self.inner.semaphore {
            Some(semaphore) => semaphore.clone().acquire_owned().await.ok(),
            None => None,
        }
    }

    pub(crate) fn release_exclusivity(&self, task: &Task) {
        let registry = self.exclusivity();
        for category in task.exclusive() {
            registry.unregister(task, &category);
        }
    }

    fn track(&self, task: &Task) {
        self.inner.tasks.lock().insert(task.id(), task.clone());
        self.inner.active.send_modify(|n| *n += 1);
    }

    pub(crate) fn untrack(&self, task: &Task) {
        let removed = self.inner.tasks.lock().remove(&task.id()).is_some();
        if removed {
            self.inner.active.send_modify(|n| *n = n.saturating_sub(1));
        }
    }

    fn on_produced(&self, producer: &Task, produced: &Task) {
        if let Some(delegate) = self.delegate() {
            delegate.will_produce(self, produced);
        }
        self.publish(
            Event::new(EventKind::TaskProduced)
                .with_task(produced.name())
                .with_task_id(produced.id())
                .with_reason(producer.name()),
        );
        match self.add(produced.clone()) {
            Ok(()) | Err(RuntimeError::AlreadyEnqueued { .. }) => {}
            Err(e) => tracing::error!(
                queue = %self.inner.name,
                producer = %producer.name(),
                task = %produced.name(),
                error = %e,
                "produced task rejected"
            ),
        }
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("suspended", &self.is_suspended())
            .finish()
    }
}

/// Observer the queue attaches to every task it accepts.
struct QueueHooks {
    queue: Weak<QueueInner>,
}

impl QueueHooks {
    fn queue(&self) -> Option<TaskQueue> {
        self.queue.upgrade().map(|inner| TaskQueue { inner })
    }
}

impl Observe for QueueHooks {
    fn did_produce(&self, task: &Task, produced: &Task) {
        if let Some(queue) = self.queue() {
            queue.on_produced(task, produced);
        }
    }

    fn will_finish(&self, task: &Task, errors: &mut Vec<TaskError>) {
        if let Some(queue) = self.queue() {
            if let Some(delegate) = queue.delegate() {
                delegate.will_finish(&queue, task, errors);
            }
        }
    }

    fn did_finish(&self, task: &Task, errors: &[TaskError]) {
        if let Some(queue) = self.queue() {
            if let Some(delegate) = queue.delegate() {
                delegate.did_finish(&queue, task, errors);
            }
        }
    }

    fn name(&self) -> &'static str {
        "queue"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use super::*;
    use crate::conditions::{
        BlockCondition, FalseCondition, MutuallyExclusive, NegatedCondition,
    };
    use crate::tasks::TaskContext;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(name: &'static str, log: &Log, sleep_ms: u64) -> Task {
        let log = log.clone();
        Task::from_fn(name, move |_| {
            let log = log.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                log.lock().push(name.to_string());
                Ok(())
            }
        })
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl QueueDelegate for Recorder {
        fn will_add(&self, _queue: &TaskQueue, task: &Task) {
            self.calls.lock().push(format!("will_add:{}", task.name()));
        }

        fn will_finish(&self, _queue: &TaskQueue, task: &Task, errors: &[TaskError]) {
            self.calls
                .lock()
                .push(format!("will_finish:{}:{}", task.name(), errors.len()));
        }

        fn did_finish(&self, _queue: &TaskQueue, task: &Task, _errors: &[TaskError]) {
            self.calls.lock().push(format!("did_finish:{}", task.name()));
        }

        fn did_finish_opaque(&self, _queue: &TaskQueue, name: &str) {
            self.calls.lock().push(format!("opaque:{name}"));
        }
    }

    #[tokio::test]
    async fn dependencies_run_first() {
        let log: Log = Arc::default();
        let a = recording("a", &log, 20);
        let b = recording("b", &log, 0);
        b.add_dependency(&a).unwrap();

        let queue = TaskQueue::default();
        queue.add(b.clone()).unwrap();
        queue.add(a).unwrap();
        b.finished().await;

        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failed_condition_skips_the_body() {
        let log: Log = Arc::default();
        let task = recording("gated", &log, 0);
        task.add_condition(BlockCondition::new("x", || Ok(false)))
            .unwrap();

        let queue = TaskQueue::default();
        queue.add(task.clone()).unwrap();
        let errors = task.finished().await;

        assert!(log.lock().is_empty());
        assert_eq!(
            errors,
            vec![TaskError::ConditionFailed {
                condition: "x".into(),
                reason: "block returned false".into(),
            }]
        );
    }

    #[tokio::test]
    async fn negated_false_condition_runs_the_body() {
        let log: Log = Arc::default();
        let task = recording("inverted", &log, 0);
        task.add_condition(NegatedCondition::new(FalseCondition))
            .unwrap();

        TaskQueue::default().add(task.clone()).unwrap();
        assert!(task.finished().await.is_empty());
        assert_eq!(*log.lock(), vec!["inverted"]);
    }

    #[tokio::test]
    async fn delegate_sees_every_step() {
        let recorder = Arc::new(Recorder::default());
        let queue = TaskQueue::builder(QueueConfig::named("delegated"))
            .with_delegate(recorder.clone())
            .build();
        let task = Task::from_fn("t", |_| async { Err(TaskError::fail("boom")) });
        queue.add(task.clone()).unwrap();
        task.finished().await;

        assert_eq!(
            *recorder.calls.lock(),
            vec!["will_add:t", "will_finish:t:1", "did_finish:t"]
        );
    }

    #[tokio::test]
    async fn suspended_queue_holds_tasks_at_ready() {
        let queue = TaskQueue::builder(QueueConfig::default()).suspended().build();
        let task = Task::noop("held");
        queue.add(task.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(task.state(), TaskState::Ready);

        queue.resume();
        assert!(task.finished().await.is_empty());
        assert!(!queue.is_suspended());
    }

    #[tokio::test]
    async fn cancel_all_skips_unstarted_bodies() {
        let log: Log = Arc::default();
        let queue = TaskQueue::builder(QueueConfig::default()).suspended().build();
        let a = recording("a", &log, 0);
        let b = recording("b", &log, 0);
        queue.add_all([a.clone(), b.clone()]).unwrap();

        queue.cancel_all();
        queue.resume();
        queue.wait_until_idle().await;

        assert!(log.lock().is_empty());
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(a.is_finished() && b.is_finished());
    }

    #[tokio::test]
    async fn producer_waits_for_produced_task() {
        let child = Task::from_fn("child", |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        let parent = Task::from_fn("parent", {
            let child = child.clone();
            move |ctx: TaskContext| {
                let child = child.clone();
                async move { ctx.produce(child).map_err(|e| TaskError::fail(e.to_string())) }
            }
        });

        let queue = TaskQueue::default();
        queue.add(parent.clone()).unwrap();
        parent.finished().await;
        assert!(child.is_finished());
    }

    struct Provides {
        dep: Task,
    }

    #[async_trait::async_trait]
    impl crate::Condition for Provides {
        fn name(&self) -> &str {
            "provides"
        }

        fn dependency(&self, _task: &Task) -> Option<Task> {
            Some(self.dep.clone())
        }

        async fn evaluate(&self, _task: &Task) -> crate::ConditionResult {
            crate::ConditionResult::Satisfied
        }
    }

    #[tokio::test]
    async fn condition_dependency_runs_after_holder_and_explicit_deps() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let explicit = recording("explicit", &log, 10);
        let holder = recording("holder", &log, 30);
        let provided = recording("provided", &log, 0);
        let gated = recording("gated", &log, 0);
        holder.add_condition(MutuallyExclusive::new("K")).unwrap();
        gated.add_condition(MutuallyExclusive::new("K")).unwrap();
        gated.add_condition(Provides { dep: provided }).unwrap();
        gated.add_dependency(&explicit).unwrap();

        let queue = TaskQueue::default();
        queue.add(holder).unwrap();
        queue.add(explicit).unwrap();
        queue.add(gated.clone()).unwrap();
        assert!(gated.finished().await.is_empty());

        let log = log.lock();
        let at = |name: &str| log.iter().position(|n| n == name).unwrap();
        assert_eq!(log.len(), 4);
        assert!(at("provided") > at("explicit"));
        assert!(at("provided") > at("holder"));
        assert_eq!(at("gated"), 3);
    }

    #[tokio::test]
    async fn cancelled_evaluator_fails_the_gated_task() {
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let gated = Task::from_fn("gated", move |_| {
            r.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        let blocker = Task::from_fn("blocker", |_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        });
        gated.add_dependency(&blocker).unwrap();
        gated
            .add_condition(BlockCondition::new("ok", || Ok(true)))
            .unwrap();

        let queue = TaskQueue::default();
        queue.add_all([blocker, gated.clone()]).unwrap();
        gated.evaluator().unwrap().cancel();

        assert_eq!(
            gated.finished().await,
            vec![TaskError::ConditionEvaluationCancelled]
        );
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn opaque_work_reports_completion() {
        let recorder = Arc::new(Recorder::default());
        let queue = TaskQueue::builder(QueueConfig::default())
            .with_delegate(recorder.clone())
            .build();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        queue
            .add_opaque("flush", async move {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        queue.wait_until_idle().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(*recorder.calls.lock(), vec!["opaque:flush"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn serial_queue_runs_one_body_at_a_time() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let queue = TaskQueue::serial("serial");
        let tasks: Vec<Task> = (0..4)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                Task::from_fn(format!("t{i}"), move |_| {
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    }
                })
            })
            .collect();
        queue.add_all(tasks).unwrap();
        queue.wait_until_idle().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_finish_from_a_body_is_rejected() {
        let second = Arc::new(Mutex::new(None));
        let s = second.clone();
        let task = Task::new(
            "twice",
            crate::tasks::TaskFn::new(move |ctx: TaskContext| {
                let s = s.clone();
                async move {
                    ctx.finish(vec![TaskError::fail("first")])
                        .map_err(|e| TaskError::fail(e.to_string()))?;
                    *s.lock() = Some(ctx.finish(Vec::new()));
                    Ok(())
                }
            }),
        );

        TaskQueue::default().add(task.clone()).unwrap();
        assert_eq!(task.finished().await, vec![TaskError::fail("first")]);
        assert!(matches!(
            second.lock().take(),
            Some(Err(RuntimeError::AlreadyFinished { .. }))
        ));
    }

    #[tokio::test]
    async fn deadline_preempts_a_stuck_body() {
        let queue = TaskQueue::new(QueueConfig {
            timeout: Duration::from_millis(20),
            ..QueueConfig::named("deadline")
        });
        let task = Task::from_fn("stuck", |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let mut events = queue.subscribe();
        queue.add(task.clone()).unwrap();

        let errors = tokio::time::timeout(Duration::from_secs(5), task.finished())
            .await
            .expect("deadline should preempt");
        assert_eq!(
            errors,
            vec![TaskError::TimedOut {
                timeout: Duration::from_millis(20)
            }]
        );
        assert!(task.is_cancelled());

        let mut kinds = Vec::new();
        while let Ok(ev) = events.try_recv() {
            kinds.push(ev.kind);
        }
        assert!(kinds.contains(&EventKind::TimeoutHit));
    }

    #[tokio::test]
    async fn panicking_body_becomes_an_error() {
        let task = Task::from_fn("explodes", |_| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        TaskQueue::default().add(task.clone()).unwrap();

        let errors = task.finished().await;
        assert!(matches!(&errors[..], [TaskError::Panicked { info }] if info.contains("kaboom")));
    }

    #[tokio::test]
    async fn same_category_runs_in_enqueue_order() {
        let finished_a = Arc::new(Mutex::new(None::<Instant>));
        let started_b = Arc::new(Mutex::new(None::<Instant>));
        let fa = finished_a.clone();
        let a = Task::from_fn("a", move |_| {
            let fa = fa.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                *fa.lock() = Some(Instant::now());
                Ok(())
            }
        });
        let sb = started_b.clone();
        let b = Task::from_fn("b", move |_| {
            let sb = sb.clone();
            async move {
                *sb.lock() = Some(Instant::now());
                Ok(())
            }
        });
        a.add_condition(MutuallyExclusive::new("K")).unwrap();
        b.add_condition(MutuallyExclusive::new("K")).unwrap();

        let queue = TaskQueue::default();
        queue.add(a).unwrap();
        queue.add(b.clone()).unwrap();
        b.finished().await;

        let fa = (*finished_a.lock()).expect("a finished");
        let sb = (*started_b.lock()).expect("b started");
        assert!(sb >= fa);
        assert!(queue.exclusivity().is_empty());
    }

    #[tokio::test]
    async fn adding_twice_is_rejected() {
        let queue = TaskQueue::default();
        let task = Task::noop("once");
        queue.add(task.clone()).unwrap();
        assert!(matches!(
            queue.add(task.clone()),
            Err(RuntimeError::AlreadyEnqueued { .. })
        ));
        task.finished().await;
    }

    #[test]
    fn adding_outside_a_runtime_fails() {
        let queue = TaskQueue::default();
        assert_eq!(queue.add(Task::noop("t")), Err(RuntimeError::NoRuntime));
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let queue = TaskQueue::new(QueueConfig::named("events"));
        let mut rx = queue.subscribe();
        let task = Task::noop("t");
        queue.add(task.clone()).unwrap();
        task.finished().await;

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            assert_eq!(ev.queue.as_deref(), Some("events"));
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![
                EventKind::TaskAdded,
                EventKind::TaskStarting,
                EventKind::TaskFinished
            ]
        );
    }
}
