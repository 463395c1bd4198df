//! # Retry groups.
//!
//! [`RetryTask`] runs one attempt at a time until an attempt finishes without errors,
//! the attempt budget is spent, or the handler declines.
//!
//! ## Rules
//! - Only the last attempt's errors reach the group; errors of attempts that were
//!   followed by a retry are kept as [`RetryTask::historical_errors`].
//! - A successful attempt stops retrying regardless of the generator.
//! - Without a handler, an attempt whose errors are all non-retryable (see
//!   [`TaskError::is_retryable`]) stops retrying. A handler decides for itself.
//! - The first retry waits for the wait strategy's first delay.
//! - The handler sees the suggested payload and may change its delay or configurator,
//!   return a different task, or decline with `None`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use taskflow::{RetryTask, Task, TaskError, TaskQueue, WaitStrategy};
//!
//! # #[tokio::main] async fn main() {
//! let retry = RetryTask::builder("flaky")
//!     .max_count(3)
//!     .wait(WaitStrategy::Fixed(Duration::from_millis(5)))
//!     .build(|| Task::from_fn("attempt", |_| async { Err(TaskError::fail("nope")) }));
//!
//! TaskQueue::default().add(retry.task().clone()).unwrap();
//! let errors = retry.task().finished().await;
//! assert_eq!(errors, vec![TaskError::fail("nope")]);
//! assert_eq!(retry.historical_errors().len(), 2);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use crate::core::TaskQueue;
use crate::error::{RuntimeError, TaskError};
use crate::policies::{JitterPolicy, WaitStrategy};
use crate::repeat::engine::{EngineConfig, Mode, RepeatEngine};
use crate::repeat::payload::{Configure, RepeatPayload, Repeatable};
use crate::tasks::{GroupTask, Task};

/// Decides about the next attempt after a failed one.
pub type RetryHandler =
    Arc<dyn Fn(&RetryFailureInfo, RepeatPayload) -> Option<RepeatPayload> + Send + Sync>;

/// What the retry handler knows about a failed attempt.
pub struct RetryFailureInfo {
    pub(crate) task: Task,
    pub(crate) errors: Vec<TaskError>,
    pub(crate) historical_errors: Vec<TaskError>,
    pub(crate) count: usize,
    pub(crate) log: tracing::Span,
    pub(crate) configure: Option<Configure>,
    pub(crate) queue: TaskQueue,
}

impl RetryFailureInfo {
    /// The attempt that failed.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Its errors.
    pub fn errors(&self) -> &[TaskError] {
        &self.errors
    }

    /// Errors of earlier failed attempts.
    pub fn historical_errors(&self) -> &[TaskError] {
        &self.historical_errors
    }

    /// Attempts made so far, the failed one included.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Span to log under.
    pub fn log(&self) -> &tracing::Span {
        &self.log
    }

    /// Configurator the failed attempt was set up with.
    pub fn configure(&self) -> Option<&Configure> {
        self.configure.as_ref()
    }

    /// Adds extra tasks to the retry group (e.g. a recovery step); their errors count
    /// as group errors.
    pub fn add_tasks<I>(&self, tasks: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = Task>,
    {
        self.queue.add_all(tasks)
    }
}

impl fmt::Debug for RetryFailureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFailureInfo")
            .field("task", &self.task)
            .field("errors", &self.errors)
            .field("historical_errors", &self.historical_errors)
            .field("count", &self.count)
            .finish()
    }
}

/// Group that retries a failing task.
pub struct RetryTask {
    group: GroupTask,
    engine: Arc<RepeatEngine>,
}

impl RetryTask {
    /// Starts a builder; see [`RetryBuilder`].
    pub fn builder(name: impl Into<Arc<str>>) -> RetryBuilder {
        RetryBuilder::new(name)
    }

    /// The group task to add to a queue.
    pub fn task(&self) -> &Task {
        self.group.task()
    }

    /// Consumes the retry group, returning its task.
    pub fn into_task(self) -> Task {
        self.group.into_task()
    }

    /// The underlying group.
    pub fn group(&self) -> &GroupTask {
        &self.group
    }

    /// Attempts started so far.
    pub fn count(&self) -> usize {
        self.engine.count()
    }

    /// Errors of failed attempts that were followed by a retry.
    pub fn historical_errors(&self) -> Vec<TaskError> {
        self.engine.historical_errors()
    }
}

impl From<RetryTask> for Task {
    fn from(retry: RetryTask) -> Self {
        retry.into_task()
    }
}

/// Builder for [`RetryTask`].
///
/// ## Defaults
/// - `max_count = 5` attempts
/// - `wait = WaitStrategy::default()` (fixed 100ms), no jitter
/// - no handler: every failure is retried while the budget lasts
pub struct RetryBuilder {
    name: Arc<str>,
    max_count: Option<usize>,
    wait: WaitStrategy,
    jitter: JitterPolicy,
    repeatable: Option<Arc<dyn Repeatable>>,
    handler: Option<RetryHandler>,
}

impl RetryBuilder {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            max_count: Some(5),
            wait: WaitStrategy::default(),
            jitter: JitterPolicy::None,
            repeatable: None,
            handler: None,
        }
    }

    /// Maximum number of attempts, the first one included.
    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = Some(n);
        self
    }

    /// No attempt budget; retries stop on success, handler veto, or the repeatable.
    pub fn unlimited(mut self) -> Self {
        self.max_count = None;
        self
    }

    pub fn wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Should-retry predicate for attempts whose payload carries none.
    pub fn repeatable(mut self, r: impl Repeatable) -> Self {
        self.repeatable = Some(Arc::new(r));
        self
    }

    pub fn handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&RetryFailureInfo, RepeatPayload) -> Option<RepeatPayload> + Send + Sync + 'static,
    {
        self.handler = Some(Arc::new(f));
        self
    }

    /// Builds attempts from `factory`, delayed by the wait strategy.
    pub fn build<F>(self, mut factory: F) -> RetryTask
    where
        F: FnMut() -> Task + Send + 'static,
    {
        // the first attempt starts at once and does not consume the first delay
        let mut delays = self.wait.delays().with_jitter(self.jitter);
        let mut first = true;
        self.build_with(move || {
            let payload = RepeatPayload::new(factory());
            if std::mem::take(&mut first) {
                return Some(payload);
            }
            Some(payload.with_delay(delays.next().unwrap_or_default()))
        })
    }

    /// Builds attempts from a payload generator; `None` ends the attempts.
    pub fn build_with<G>(self, generator: G) -> RetryTask
    where
        G: FnMut() -> Option<RepeatPayload> + Send + 'static,
    {
        let cfg = EngineConfig {
            name: self.name.clone(),
            mode: Mode::Retry,
            max_count: self.max_count,
            repeatable: self.repeatable,
            handler: self.handler,
        };
        let (engine, initial) = RepeatEngine::start(cfg, Box::new(generator));
        let group = GroupTask::with_hook(self.name, initial, engine.clone());
        RetryTask { group, engine }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::tasks::Delay;

    fn counted_failures(attempts: Arc<AtomicUsize>) -> impl FnMut() -> Task + Send + 'static {
        move || {
            let attempts = attempts.clone();
            Task::from_fn("attempt", move |_| {
                let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(TaskError::fail(format!("attempt {n}"))) }
            })
        }
    }

    fn quick() -> RetryBuilder {
        RetryTask::builder("retry").wait(WaitStrategy::Fixed(Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn always_failing_stops_at_max_count() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = quick().max_count(3).build(counted_failures(attempts.clone()));
        TaskQueue::default().add(retry.task().clone()).unwrap();

        let errors = retry.task().finished().await;
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(retry.count(), 3);
        assert_eq!(errors, vec![TaskError::fail("attempt 3")]);
        assert_eq!(
            retry.historical_errors(),
            vec![TaskError::fail("attempt 1"), TaskError::fail("attempt 2")]
        );
    }

    #[tokio::test]
    async fn success_stops_retrying() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let retry = quick().max_count(10).build(move || {
            let a = a.clone();
            Task::from_fn("attempt", move |_| {
                let n = a.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 2 {
                        Err(TaskError::fail("transient"))
                    } else {
                        Ok(())
                    }
                }
            })
        });
        TaskQueue::default().add(retry.task().clone()).unwrap();

        assert!(retry.task().finished().await.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(retry.historical_errors(), vec![TaskError::fail("transient")]);
    }

    #[tokio::test]
    async fn fatal_attempt_is_not_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let a = attempts.clone();
        let retry = quick().max_count(5).build(move || {
            a.fetch_add(1, Ordering::SeqCst);
            Task::from_fn("attempt", |_| async { Err(TaskError::fatal("config missing")) })
        });
        TaskQueue::default().add(retry.task().clone()).unwrap();

        let errors = retry.task().finished().await;
        assert_eq!(errors, vec![TaskError::fatal("config missing")]);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert!(retry.historical_errors().is_empty());
    }

    #[tokio::test]
    async fn first_retry_uses_the_first_delay() {
        let suggested_delays = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = suggested_delays.clone();
        let retry = RetryTask::builder("retry")
            .max_count(3)
            .wait(WaitStrategy::Exponential {
                period: Duration::from_millis(10),
                max: Duration::from_secs(1),
            })
            .handler(move |_, suggested| {
                seen.lock().push(suggested.delay());
                Some(suggested.without_delay())
            })
            .build(counted_failures(Arc::new(AtomicUsize::new(0))));
        TaskQueue::default().add(retry.task().clone()).unwrap();
        retry.task().finished().await;

        assert_eq!(
            *suggested_delays.lock(),
            vec![
                Some(Delay::By(Duration::from_millis(10))),
                Some(Delay::By(Duration::from_millis(20))),
            ]
        );
    }

    #[tokio::test]
    async fn handler_can_decline() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let retry = quick()
            .handler(move |info, _suggested| {
                s.store(info.count(), Ordering::SeqCst);
                assert_eq!(info.errors(), &[TaskError::fail("attempt 1")]);
                None
            })
            .build(counted_failures(attempts.clone()));
        TaskQueue::default().add(retry.task().clone()).unwrap();

        assert_eq!(retry.task().finished().await, vec![TaskError::fail("attempt 1")]);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(retry.historical_errors().is_empty());
    }

    #[tokio::test]
    async fn handler_can_replace_the_delay() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let retry = RetryTask::builder("retry")
            .max_count(2)
            .wait(WaitStrategy::Fixed(Duration::from_secs(3600)))
            .handler(|_, suggested| Some(suggested.without_delay()))
            .build(counted_failures(attempts.clone()));
        TaskQueue::default().add(retry.task().clone()).unwrap();

        let errors = tokio::time::timeout(Duration::from_secs(5), retry.task().finished())
            .await
            .expect("retry should not wait an hour");
        assert_eq!(errors, vec![TaskError::fail("attempt 2")]);
    }
}
