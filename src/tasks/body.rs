//! # Task bodies.
//!
//! A [`Body`] is the work a task performs once dependencies and conditions allow it.
//! It receives a [`TaskContext`] and must eventually call [`TaskContext::finish`]
//! exactly once; the task stays `Executing` until it does.
//!
//! [`TaskFn`] wraps an async closure returning `Result<(), TaskError>` and finishes the
//! task with the closure's outcome, which covers the common case.
//!
//! ## Example
//! ```rust
//! use taskflow::{Task, TaskContext, TaskError};
//!
//! let t = Task::from_fn("fetch", |ctx: TaskContext| async move {
//!     if ctx.is_cancelled() {
//!         return Err(TaskError::Canceled);
//!     }
//!     // do work...
//!     Ok(())
//! });
//! assert_eq!(&*t.name(), "fetch");
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::error::{RuntimeError, TaskError};
use crate::tasks::context::TaskContext;

/// Boxed future returned by [`Body::execute`].
pub type BoxBodyFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Work executed by a task.
pub trait Body: Send + Sync + 'static {
    /// Starts the work. The returned future is spawned on the queue's runtime.
    ///
    /// Implementations finish the task through `ctx.finish(errors)`; the future
    /// completing does not finish the task by itself.
    fn execute(&self, ctx: TaskContext) -> BoxBodyFuture;

    /// Whether the body still runs after its task was cancelled before starting.
    ///
    /// Groups return `true` so their members can observe the cancellation.
    fn runs_when_cancelled(&self) -> bool {
        false
    }
}

/// Closure-backed body that finishes with the closure's result.
///
/// Each execution calls the closure again, producing a fresh future.
#[derive(Debug)]
pub struct TaskFn<F> {
    f: F,
}

impl<F> TaskFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Body for TaskFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn execute(&self, ctx: TaskContext) -> BoxBodyFuture {
        let fut = (self.f)(ctx.clone());
        Box::pin(async move {
            let errors = fut.await.err().into_iter().collect();
            match ctx.finish(errors) {
                // preempted by a deadline while the closure was still running
                Ok(()) | Err(RuntimeError::AlreadyFinished { .. }) => {}
                Err(e) => tracing::warn!(task = %ctx.name(), error = %e, "finish rejected"),
            }
        })
    }
}
