//! Repeat groups: run a freshly generated task again and again.

use std::sync::Arc;

use crate::policies::{JitterPolicy, WaitStrategy};
use crate::repeat::engine::{EngineConfig, Mode, RepeatEngine};
use crate::repeat::payload::{RepeatPayload, Repeatable};
use crate::tasks::{GroupTask, Task};

/// Group that runs one generated instance after another.
///
/// Each instance starts after the previous one finished and its delay elapsed.
/// Repetition stops when the generator is exhausted, `max_count` instances ran, or the
/// [`Repeatable`] predicate says no. Every instance's errors are reported by the group.
pub struct RepeatedTask {
    group: GroupTask,
    engine: Arc<RepeatEngine>,
}

impl RepeatedTask {
    pub fn builder(name: impl Into<Arc<str>>) -> RepeatBuilder {
        RepeatBuilder::new(name)
    }

    /// The group task to add to a queue.
    pub fn task(&self) -> &Task {
        self.group.task()
    }

    /// Consumes the repeat group, returning its task.
    pub fn into_task(self) -> Task {
        self.group.into_task()
    }

    pub fn group(&self) -> &GroupTask {
        &self.group
    }

    /// Instances started so far.
    pub fn count(&self) -> usize {
        self.engine.count()
    }
}

impl From<RepeatedTask> for Task {
    fn from(repeated: RepeatedTask) -> Self {
        repeated.into_task()
    }
}

/// Builder for [`RepeatedTask`]. Unbounded unless `max_count` or a repeatable is set.
pub struct RepeatBuilder {
    name: Arc<str>,
    max_count: Option<usize>,
    wait: WaitStrategy,
    jitter: JitterPolicy,
    repeatable: Option<Arc<dyn Repeatable>>,
}

impl RepeatBuilder {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            max_count: None,
            wait: WaitStrategy::default(),
            jitter: JitterPolicy::None,
            repeatable: None,
        }
    }

    /// Maximum number of instances.
    pub fn max_count(mut self, n: usize) -> Self {
        self.max_count = Some(n);
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

    /// Should-repeat predicate for instances whose payload carries none.
    pub fn repeatable(mut self, r: impl Repeatable) -> Self {
        self.repeatable = Some(Arc::new(r));
        self
    }

    /// Builds instances from `factory`, delayed by the wait strategy.
    pub fn build<F>(self, mut factory: F) -> RepeatedTask
    where
        F: FnMut() -> Task + Send + 'static,
    {
        // the first instance starts at once and does not consume the first delay
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

    /// Builds instances from a payload generator; `None` ends the repetition.
    pub fn build_with<G>(self, generator: G) -> RepeatedTask
    where
        G: FnMut() -> Option<RepeatPayload> + Send + 'static,
    {
        let cfg = EngineConfig {
            name: self.name.clone(),
            mode: Mode::Repeat,
            max_count: self.max_count,
            repeatable: self.repeatable,
            handler: None,
        };
        let (engine, initial) = RepeatEngine::start(cfg, Box::new(generator));
        let group = GroupTask::with_hook(self.name, initial, engine.clone());
        RepeatedTask { group, engine }
    }
}
