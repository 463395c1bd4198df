use async_trait::async_trait;

use crate::conditions::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::tasks::Task;

/// Fails when any explicit dependency was cancelled or finished with errors.
///
/// Cancelled dependencies are reported first ([`TaskError::DependenciesCancelled`]),
/// then failed ones ([`TaskError::DependenciesFailed`]). With
/// [`ignoring_cancellations`](Self::ignoring_cancellations), cancelled dependencies
/// count neither as cancelled nor as failed.
#[derive(Debug, Default)]
pub struct NoFailedDependenciesCondition {
    ignore_cancellations: bool,
}

impl NoFailedDependenciesCondition {
    /// Strict variant.
    pub fn new() -> Self {
        Self::default()
    }

    /// Variant that tolerates cancelled dependencies.
    pub fn ignoring_cancellations() -> Self {
        Self {
            ignore_cancellations: true,
        }
    }
}

#[async_trait]
impl Condition for NoFailedDependenciesCondition {
    fn name(&self) -> &str {
        "No Failed Dependencies"
    }

    async fn evaluate(&self, task: &Task) -> ConditionResult {
        let dependencies = task.dependencies();
        let (cancelled, finished): (Vec<&Task>, Vec<&Task>) =
            dependencies.iter().partition(|d| d.is_cancelled());

        if !self.ignore_cancellations && !cancelled.is_empty() {
            return ConditionResult::Failed(TaskError::DependenciesCancelled {
                count: cancelled.len(),
            });
        }
        let failed = finished.iter().filter(|d| !d.errors().is_empty()).count();
        if failed > 0 {
            return ConditionResult::Failed(TaskError::DependenciesFailed { count: failed });
        }
        ConditionResult::Satisfied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_dependencies_fail_unless_ignored() {
        let dep = Task::noop("dep");
        dep.cancel();
        let task = Task::noop("gated");
        task.add_dependency(&dep).unwrap();

        assert_eq!(
            NoFailedDependenciesCondition::new().evaluate(&task).await,
            ConditionResult::Failed(TaskError::DependenciesCancelled { count: 1 })
        );
        assert!(
            NoFailedDependenciesCondition::ignoring_cancellations()
                .evaluate(&task)
                .await
                .is_satisfied()
        );
    }

    #[tokio::test]
    async fn no_dependencies_is_satisfied() {
        let task = Task::noop("gated");
        assert!(
            NoFailedDependenciesCondition::new()
                .evaluate(&task)
                .await
                .is_satisfied()
        );
    }
}
