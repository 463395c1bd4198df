//! Shared scheduling engine behind [`RepeatedTask`](crate::RepeatedTask) and
//! [`RetryTask`](crate::RetryTask).
//!
//! ```text
//! generator ─► payload ─► configure(task) ─► count += 1
//!                              │
//!                              ├─► DelayTask (internal) ─► dependency of task
//!                              └─► task added to the group's private queue
//!
//! member finishing (group hook):
//!   repeat: should_repeat(instance, errors, count)? ─► next payload
//!   retry:  no errors ─► stop
//!           nothing retryable and no handler ─► stop
//!           should_repeat(instance, errors, count)? ─► handler(info, suggested)
//!             ─► Some ─► errors become historical
//! ```
//!
//! `should_repeat` asks the finished instance's own [`Repeatable`] first and falls back
//! to the builder's one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::TaskQueue;
use crate::error::{RuntimeError, TaskError};
use crate::events::{Event, EventKind};
use crate::repeat::payload::{Configure, Generator, RepeatPayload, Repeatable};
use crate::repeat::retry::{RetryFailureInfo, RetryHandler};
use crate::tasks::{DelayTask, GroupHook, Task};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    Repeat,
    Retry,
}

pub(crate) struct EngineConfig {
    pub name: Arc<str>,
    pub mode: Mode,
    pub max_count: Option<usize>,
    pub repeatable: Option<Arc<dyn Repeatable>>,
    pub handler: Option<RetryHandler>,
}

#[derive(Default)]
struct EngineState {
    count: usize,
    current: Option<Task>,
    configure: Option<Configure>,
    /// Predicate carried by the current instance's payload.
    repeatable: Option<Arc<dyn Repeatable>>,
    historical: Vec<TaskError>,
}

pub(crate) struct RepeatEngine {
    cfg: EngineConfig,
    generator: Mutex<Option<Generator>>,
    state: Mutex<EngineState>,
}

impl RepeatEngine {
    /// Builds the engine and pulls the first instance, if any.
    pub(crate) fn start(cfg: EngineConfig, generator: Generator) -> (Arc<Self>, Vec<Task>) {
        let engine = Arc::new(Self {
            cfg,
            generator: Mutex::new(Some(generator)),
            state: Mutex::new(EngineState::default()),
        });
        let first = if engine.within_budget(0) {
            engine.next_payload()
        } else {
            None
        };
        let initial = first
            .map(|payload| {
                let task = payload.task.clone();
                engine.begin(payload);
                task
            })
            .into_iter()
            .collect();
        (engine, initial)
    }

    pub(crate) fn count(&self) -> usize {
        self.state.lock().count
    }

    pub(crate) fn historical_errors(&self) -> Vec<TaskError> {
        self.state.lock().historical.clone()
    }

    fn within_budget(&self, count: usize) -> bool {
        self.cfg.max_count.is_none_or(|max| count < max)
    }

    /// Budget check, then the instance's predicate (or the builder's). Called without
    /// holding the state lock.
    fn should_repeat(&self, instance: &Task, errors: &[TaskError], count: usize) -> bool {
        if !self.within_budget(count) {
            return false;
        }
        let predicate = self
            .state
            .lock()
            .repeatable
            .clone()
            .or_else(|| self.cfg.repeatable.clone());
        predicate.is_none_or(|r| r.should_repeat(instance, errors, count))
    }

    /// The generator is taken out of its slot while it runs; no lock is held.
    fn next_payload(&self) -> Option<RepeatPayload> {
        let mut generator = self.generator.lock().take()?;
        let payload = generator();
        *self.generator.lock() = Some(generator);
        payload
    }

    fn begin(&self, payload: RepeatPayload) -> usize {
        let RepeatPayload {
            task,
            configure,
            repeatable,
            ..
        } = payload;
        if let Some(f) = &configure {
            f(&task);
        }
        let mut st = self.state.lock();
        st.count += 1;
        st.current = Some(task);
        st.configure = configure;
        st.repeatable = repeatable;
        st.count
    }

    fn launch(&self, queue: &TaskQueue, payload: RepeatPayload) -> Result<(), RuntimeError> {
        let delay = payload.delay;
        let task = payload.task.clone();
        let count = self.begin(payload);
        if let Some(delay) = delay {
            let wait = DelayTask::internal(delay);
            task.add_dependency(&wait)?;
            queue.add(wait)?;
        }

        let kind = match self.cfg.mode {
            Mode::Repeat => EventKind::RepeatScheduled,
            Mode::Retry => EventKind::RetryScheduled,
        };
        let waiting = delay.map(|d| d.remaining()).unwrap_or_default();
        let ev = Event::new(kind)
            .with_task(task.name())
            .with_task_id(task.id())
            .with_attempt(u32::try_from(count).unwrap_or(u32::MAX))
            .with_delay(waiting);
        tracing::debug!(
            group = %self.cfg.name,
            task = %task.name(),
            attempt = count,
            delay = ?waiting,
            "next instance scheduled"
        );
        queue.add(task)?;
        queue.publish(ev);
        Ok(())
    }

    fn schedule(&self, queue: &TaskQueue, payload: RepeatPayload) -> bool {
        match self.launch(queue, payload) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(group = %self.cfg.name, error = %e, "next instance rejected");
                false
            }
        }
    }

    fn retry(&self, queue: &TaskQueue, member: &Task, errors: &[TaskError], count: usize) -> bool {
        if errors.is_empty() {
            tracing::debug!(group = %self.cfg.name, attempt = count, "attempt succeeded");
            return false;
        }
        if self.cfg.handler.is_none() && !errors.iter().any(TaskError::is_retryable) {
            tracing::debug!(group = %self.cfg.name, attempt = count, "attempt failed with nothing retryable");
            return false;
        }
        if !self.should_repeat(member, errors, count) {
            tracing::debug!(group = %self.cfg.name, attempt = count, "retries exhausted");
            return false;
        }
        let Some(suggested) = self.next_payload() else {
            return false;
        };
        let payload = match &self.cfg.handler {
            None => Some(suggested),
            Some(handler) => {
                let (historical, configure) = {
                    let st = self.state.lock();
                    (st.historical.clone(), st.configure.clone())
                };
                let info = RetryFailureInfo {
                    task: member.clone(),
                    errors: errors.to_vec(),
                    historical_errors: historical,
                    count,
                    log: tracing::debug_span!("retry", group = %self.cfg.name, attempt = count),
                    configure,
                    queue: queue.clone(),
                };
                handler(&info, suggested)
            }
        };
        let Some(payload) = payload else {
            tracing::debug!(group = %self.cfg.name, attempt = count, "retry declined by handler");
            return false;
        };
        if !self.schedule(queue, payload) {
            return false;
        }
        self.state.lock().historical.extend_from_slice(errors);
        true
    }
}

impl GroupHook for RepeatEngine {
    fn member_will_finish(
        &self,
        queue: &TaskQueue,
        member: &Task,
        errors: &[TaskError],
        group_cancelled: bool,
    ) -> bool {
        let (is_current, count) = {
            let st = self.state.lock();
            (st.current.as_ref() == Some(member), st.count)
        };
        if group_cancelled || !is_current {
            return true;
        }
        match self.cfg.mode {
            Mode::Repeat => {
                if self.should_repeat(member, errors, count) {
                    if let Some(payload) = self.next_payload() {
                        self.schedule(queue, payload);
                    }
                }
                true
            }
            // a scheduled retry keeps the failed attempt's errors out of the group's
            Mode::Retry => !self.retry(queue, member, errors, count),
        }
    }
}
