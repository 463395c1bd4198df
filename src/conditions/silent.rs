use std::borrow::Cow;

use async_trait::async_trait;

use crate::conditions::{Condition, ConditionResult};
use crate::tasks::Task;

/// Evaluates the inner condition without scheduling its dependency task.
///
/// Useful when the dependency would prompt for something (a permission, a login) and
/// the caller only wants to know the current answer.
pub struct SilentCondition<C> {
    name: String,
    inner: C,
}

impl<C: Condition> SilentCondition<C> {
    /// Wraps `inner`.
    pub fn new(inner: C) -> Self {
        Self {
            name: format!("Silent<{}>", inner.name()),
            inner,
        }
    }
}

#[async_trait]
impl<C: Condition> Condition for SilentCondition<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.inner.is_mutually_exclusive()
    }

    fn category(&self) -> Cow<'_, str> {
        self.inner.category()
    }

    async fn evaluate(&self, task: &Task) -> ConditionResult {
        self.inner.evaluate(task).await
    }
}
