use std::borrow::Cow;

use async_trait::async_trait;

use crate::conditions::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::tasks::Task;

/// Inverts a condition: satisfied when the inner one fails, failed with
/// [`TaskError::ConditionSatisfied`] when it is satisfied.
///
/// Exclusivity, category and dependency are those of the inner condition.
pub struct NegatedCondition<C> {
    name: String,
    inner: C,
}

impl<C: Condition> NegatedCondition<C> {
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        Self {
            name: format!("Not<{}>", inner.name()),
            inner,
        }
    }
}

#[async_trait]
impl<C: Condition> Condition for NegatedCondition<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.inner.is_mutually_exclusive()
    }

    fn category(&self) -> Cow<'_, str> {
        self.inner.category()
    }

    fn dependency(&self, task: &Task) -> Option<Task> {
        self.inner.dependency(task)
    }

    async fn evaluate(&self, task: &Task) -> ConditionResult {
        match self.inner.evaluate(task).await {
            ConditionResult::Satisfied => ConditionResult::Failed(TaskError::ConditionSatisfied {
                condition: self.inner.name().to_string(),
            }),
            ConditionResult::Failed(_) => ConditionResult::Satisfied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{FalseCondition, MutuallyExclusive, NoFailedDependenciesCondition, TrueCondition};

    #[tokio::test]
    async fn inverts_outcomes() {
        let task = Task::noop("gated");
        assert_eq!(
            NegatedCondition::new(TrueCondition).evaluate(&task).await,
            ConditionResult::Failed(TaskError::ConditionSatisfied {
                condition: "True".into()
            })
        );
        assert!(
            NegatedCondition::new(FalseCondition)
                .evaluate(&task)
                .await
                .is_satisfied()
        );
    }

    #[test]
    fn name_wraps_inner_name() {
        let c = NegatedCondition::new(NoFailedDependenciesCondition::new());
        assert_eq!(c.name(), "Not<No Failed Dependencies>");
        assert!(!c.is_mutually_exclusive());
    }

    #[test]
    fn inherits_exclusivity() {
        let c = NegatedCondition::new(MutuallyExclusive::new("alerts"));
        assert!(c.is_mutually_exclusive());
        assert_eq!(c.category(), "alerts");
    }
}
