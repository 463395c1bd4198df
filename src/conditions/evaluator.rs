//! # Condition evaluator.
//!
//! When a task with conditions is added to a queue, its conditions are compiled into
//! ordinary tasks so the queue's dependency machinery does the gating:
//!
//! ```text
//!   explicit deps ─┬────────────────────────────────┐
//!                  ▼                                ▼
//!   exclusive   ─► indirect deps (from conditions) ─► evaluator ─► task
//!   predecessors                                   ▲              ▲
//!                  └───────────────────────────────┴──────────────┘
//! ```
//!
//! - each condition's [`dependency`](crate::Condition::dependency) becomes an indirect
//!   dependency, ordered after the explicit deps and the previous exclusive holders;
//! - one internal evaluator task depends on the explicit and indirect deps, then runs
//!   every condition in attachment order, stopping at the first failure;
//! - the gated task waits for the evaluator and indirect deps before `Ready`, and reads
//!   the evaluator's errors to decide whether its body runs.
//!
//! A panicking condition fails evaluation with [`TaskError::ConditionFailed`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::conditions::{Condition, ConditionResult};
use crate::error::{RuntimeError, TaskError, panic_info};
use crate::tasks::{Body, BoxBodyFuture, Task, TaskContext, WeakTask};

/// Tasks built for one gated task.
pub(crate) struct Wiring {
    pub evaluator: Task,
    pub indirect: Vec<Task>,
}

/// Builds the evaluator and indirect dependencies for `task`.
///
/// `predecessors` are the previous holders of `task`'s exclusivity categories.
pub(crate) fn wire(task: &Task, predecessors: &[Task]) -> Wiring {
    let conditions = task.conditions();
    let explicit = task.dependencies();

    let mut indirect: Vec<Task> = Vec::new();
    for dep in conditions.iter().filter_map(|c| c.dependency(task)) {
        if dep.id() == task.id() || indirect.contains(&dep) || explicit.contains(&dep) {
            continue;
        }
        for before in predecessors.iter().chain(explicit.iter()) {
            order_after(&dep, before);
        }
        indirect.push(dep);
    }

    let evaluator = Task::internal(
        format!("Evaluate<{}>", task.name()),
        Evaluate {
            target: task.downgrade(),
            conditions,
        },
    );
    for before in explicit.iter().chain(indirect.iter()) {
        order_after(&evaluator, before);
    }
    Wiring {
        evaluator,
        indirect,
    }
}

fn order_after(task: &Task, before: &Task) {
    match task.add_dependency(before) {
        Ok(()) | Err(RuntimeError::SelfDependency { .. }) => {}
        // shared dependency already scheduled elsewhere: it keeps its own ordering
        Err(e) => tracing::trace!(task = %task.name(), error = %e, "ordering edge skipped"),
    }
}

/// Body of the evaluator task.
struct Evaluate {
    target: WeakTask,
    conditions: Vec<Arc<dyn Condition>>,
}

impl Body for Evaluate {
    fn execute(&self, ctx: TaskContext) -> BoxBodyFuture {
        let target = self.target.clone();
        let conditions = self.conditions.clone();
        Box::pin(async move {
            let errors = match target.upgrade() {
                Some(task) => evaluate_all(&task, &conditions).await,
                None => vec![TaskError::ConditionEvaluationCancelled],
            };
            let _ = ctx.finish(errors);
        })
    }
}

async fn evaluate_all(task: &Task, conditions: &[Arc<dyn Condition>]) -> Vec<TaskError> {
    for condition in conditions {
        let outcome = AssertUnwindSafe(condition.evaluate(task))
            .catch_unwind()
            .await;
        match outcome {
            Ok(ConditionResult::Satisfied) => {}
            Ok(ConditionResult::Failed(error)) => {
                tracing::debug!(
                    task = %task.name(),
                    condition = condition.name(),
                    error = %error,
                    "condition failed"
                );
                return vec![error];
            }
            Err(payload) => {
                let info = panic_info(payload.as_ref());
                tracing::error!(
                    task = %task.name(),
                    condition = condition.name(),
                    "condition panicked: {info}"
                );
                return vec![TaskError::ConditionFailed {
                    condition: condition.name().to_string(),
                    reason: format!("panicked: {info}"),
                }];
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{BlockCondition, TrueCondition};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Provides {
        dep: Task,
    }

    #[async_trait]
    impl Condition for Provides {
        fn name(&self) -> &str {
            "Provides"
        }

        fn dependency(&self, _task: &Task) -> Option<Task> {
            Some(self.dep.clone())
        }

        async fn evaluate(&self, _task: &Task) -> ConditionResult {
            ConditionResult::Satisfied
        }
    }

    struct Exploding;

    #[async_trait]
    impl Condition for Exploding {
        fn name(&self) -> &str {
            "Exploding"
        }

        async fn evaluate(&self, _task: &Task) -> ConditionResult {
            panic!("condition blew up")
        }
    }

    #[test]
    fn wiring_orders_indirect_after_explicit_and_predecessors() {
        let explicit = Task::noop("explicit");
        let predecessor = Task::noop("previous holder");
        let provided = Task::noop("provided");

        let task = Task::noop("gated");
        task.add_dependency(&explicit).unwrap();
        task.add_condition(Provides {
            dep: provided.clone(),
        })
        .unwrap();

        let wiring = wire(&task, &[predecessor.clone()]);
        assert_eq!(wiring.indirect, vec![provided.clone()]);
        assert_eq!(provided.dependencies(), vec![predecessor, explicit.clone()]);
        assert_eq!(wiring.evaluator.dependencies(), vec![explicit, provided]);
        assert!(wiring.evaluator.is_internal());
        assert_eq!(&*wiring.evaluator.name(), "Evaluate<gated>");
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let record = |name: &'static str, ok: bool| {
            let calls = calls.clone();
            Arc::new(BlockCondition::new(name, move || {
                calls.lock().push(name);
                Ok(ok)
            })) as Arc<dyn Condition>
        };
        let conditions = vec![record("a", true), record("b", false), record("c", true)];

        let errors = evaluate_all(&Task::noop("gated"), &conditions).await;
        assert_eq!(*calls.lock(), vec!["a", "b"]);
        assert_eq!(
            errors,
            vec![TaskError::ConditionFailed {
                condition: "b".into(),
                reason: "block returned false".into()
            }]
        );
    }

    #[tokio::test]
    async fn panicking_condition_becomes_condition_failed() {
        let conditions: Vec<Arc<dyn Condition>> = vec![Arc::new(TrueCondition), Arc::new(Exploding)];
        let errors = evaluate_all(&Task::noop("gated"), &conditions).await;
        assert!(matches!(
            &errors[..],
            [TaskError::ConditionFailed { condition, reason }]
                if condition == "Exploding" && reason.contains("condition blew up")
        ));
    }
}
