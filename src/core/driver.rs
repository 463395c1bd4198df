//! # Per-task driver.
//!
//! One driver future is spawned per task added to a queue. It walks the task through
//! its lifecycle and owns every state transition after `Pending`:
//!
//! ```text
//! Pending ── deps finished ──► EvaluatingConditions ── evaluator ok ──► Ready
//!    │                                 │                                  │
//!    │ cancelled                       │ failed / cancelled               │ resumed + permit
//!    ▼                                 ▼                                  ▼
//! Finishing ◄──────────────────────────┴──────────── finish(errors) ◄── Executing
//!    │  wait for produced children
//!    │  errors = cancel errors ++ body errors
//!    │  will_finish observers → exclusivity released → did_finish observers
//!    ▼
//! Finished ── untracked from the queue
//! ```
//!
//! ## Rules
//! - Waiting never holds a concurrency permit; the permit is released as soon as the
//!   body reports its outcome, before produced children are awaited.
//! - A body is spawned as its own tokio task. A panic becomes [`TaskError::Panicked`];
//!   a preempted body (deadline) is aborted, except for bodies that run when cancelled
//!   (groups), which are only cancelled and drain their members.
//! - Cancelled tasks skip their body unless it `runs_when_cancelled` (groups).

use tokio_util::sync::CancellationToken;

use crate::core::TaskQueue;
use crate::error::{TaskError, panic_info};
use crate::events::{Event, EventKind};
use crate::tasks::{Task, TaskContext, TaskState};

enum Gate {
    Run,
    Skip(Vec<TaskError>),
}

pub(crate) async fn drive(queue: TaskQueue, task: Task) {
    let body_errors = match prepare(&queue, &task).await {
        Gate::Run => execute(&queue, &task).await,
        Gate::Skip(errors) => errors,
    };
    finalize(&queue, &task, body_errors).await;
}

/// Pending → EvaluatingConditions → Ready.
async fn prepare(queue: &TaskQueue, task: &Task) -> Gate {
    let token = task.cancellation_token();

    if !wait_all(&task.dependencies(), &token).await {
        return on_cancelled(queue, task);
    }

    let gates = task.gates();
    if !gates.is_empty() {
        task.transition(TaskState::EvaluatingConditions);
        if !wait_all(&gates, &token).await {
            return on_cancelled(queue, task);
        }
        let errors = match task.evaluator() {
            Some(evaluator) if evaluator.is_cancelled() => {
                vec![TaskError::ConditionEvaluationCancelled]
            }
            Some(evaluator) => evaluator.errors(),
            None => Vec::new(),
        };
        if let Some(first) = errors.first() {
            tracing::debug!(task = %task.name(), id = %task.id(), error = %first, "conditions not met");
            queue.publish(
                Event::new(EventKind::ConditionFailed)
                    .with_task(task.name())
                    .with_task_id(task.id())
                    .with_reason(first.as_message())
                    .with_errors(errors.len()),
            );
            return Gate::Skip(errors);
        }
    }

    task.transition(TaskState::Ready);
    Gate::Run
}

/// Waits for every task in `tasks`; `false` if cancelled first.
async fn wait_all(tasks: &[Task], token: &CancellationToken) -> bool {
    for dep in tasks {
        tokio::select! {
            biased;
            _ = token.cancelled() => return false,
            _ = dep.finished() => {}
        }
    }
    !token.is_cancelled()
}

fn on_cancelled(queue: &TaskQueue, task: &Task) -> Gate {
    for gate in task.gates() {
        if gate.is_internal() {
            gate.cancel();
        }
    }
    if task.runs_when_cancelled() {
        task.transition(TaskState::Ready);
        return Gate::Run;
    }
    note_cancelled(queue, task);
    Gate::Skip(Vec::new())
}

fn note_cancelled(queue: &TaskQueue, task: &Task) {
    tracing::debug!(task = %task.name(), id = %task.id(), "cancelled before start");
    queue.publish(
        Event::new(EventKind::TaskCancelled)
            .with_task(task.name())
            .with_task_id(task.id())
            .with_errors(task.errors().len()),
    );
}

/// Ready → Executing → (finish requested).
async fn execute(queue: &TaskQueue, task: &Task) -> Vec<TaskError> {
    let token = task.cancellation_token();
    let runs_cancelled = task.runs_when_cancelled();

    let permit = if runs_cancelled {
        queue.admit().await
    } else {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                note_cancelled(queue, task);
                return Vec::new();
            }
            permit = queue.admit() => permit,
        }
    };
    if task.is_cancelled() && !runs_cancelled {
        note_cancelled(queue, task);
        return Vec::new();
    }

    let panics = task.observers().will_execute(task);
    task.record_observer_errors(panics);
    task.transition(TaskState::Executing);
    queue.publish(
        Event::new(EventKind::TaskStarting)
            .with_task(task.name())
            .with_task_id(task.id()),
    );
    tracing::debug!(queue = %queue.name(), task = %task.name(), id = %task.id(), "executing");

    let Some(body) = task.body() else {
        return Vec::new();
    };
    let ctx = TaskContext::new(task.clone(), queue.clone());
    let mut join = tokio::spawn(async move { body.execute(ctx).await });

    let mut body_done = false;
    loop {
        tokio::select! {
            _ = task.finish_signal().notified() => break,
            res = &mut join, if !body_done => {
                body_done = true;
                if let Err(err) = res {
                    if err.is_panic() {
                        let info = panic_info(err.into_panic().as_ref());
                        tracing::error!(task = %task.name(), id = %task.id(), "body panicked: {info}");
                        let _ = task.finish(vec![TaskError::Panicked { info }]);
                    }
                }
            }
        }
    }

    let request = task.take_finish_request();
    if request.preempted {
        if !body_done {
            join.abort();
        }
        tracing::warn!(task = %task.name(), id = %task.id(), "body preempted");
        queue.publish(
            Event::new(EventKind::TimeoutHit)
                .with_task(task.name())
                .with_task_id(task.id()),
        );
    }
    drop(permit);
    request.errors
}

/// Finishing → Finished.
async fn finalize(queue: &TaskQueue, task: &Task, body_errors: Vec<TaskError>) {
    task.transition(TaskState::Finishing);
    for child in task.produced() {
        child.finished().await;
    }

    let mut errors = task.take_pre_finish_errors();
    errors.extend(body_errors);

    let observers = task.observers();
    let panics = observers.will_finish(task, &mut errors);
    errors.extend(panics);

    queue.release_exclusivity(task);
    task.store_errors(errors.clone());
    observers.did_finish(task, &errors);
    task.complete();

    let mut ev = Event::new(EventKind::TaskFinished)
        .with_task(task.name())
        .with_task_id(task.id())
        .with_errors(errors.len());
    if let Some(first) = errors.first() {
        ev = ev.with_reason(first.as_message());
    }
    queue.publish(ev);
    tracing::debug!(
        queue = %queue.name(),
        task = %task.name(),
        id = %task.id(),
        errors = errors.len(),
        "finished"
    );
    queue.untrack(task);
}
