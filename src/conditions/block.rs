use std::sync::Arc;

use async_trait::async_trait;

use crate::conditions::{Condition, ConditionResult};
use crate::error::TaskError;
use crate::tasks::Task;

type Predicate = Arc<dyn Fn() -> Result<bool, TaskError> + Send + Sync>;

/// Condition backed by a synchronous closure.
///
/// `Ok(true)` satisfies it, `Ok(false)` fails it with [`TaskError::ConditionFailed`],
/// and `Err(e)` fails it with `e`.
pub struct BlockCondition {
    name: String,
    predicate: Predicate,
    exclusive: bool,
}

impl BlockCondition {
    /// Wraps `predicate`.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn() -> Result<bool, TaskError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            exclusive: false,
        }
    }

    /// Serializes tasks carrying this condition under its name.
    pub fn mutually_exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

#[async_trait]
impl Condition for BlockCondition {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        self.exclusive
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        match (self.predicate)() {
            Ok(true) => ConditionResult::Satisfied,
            Ok(false) => ConditionResult::failed(&self.name, "block returned false"),
            Err(e) => ConditionResult::Failed(e),
        }
    }
}

/// Always satisfied.
pub struct TrueCondition;

#[async_trait]
impl Condition for TrueCondition {
    fn name(&self) -> &str {
        "True"
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        ConditionResult::Satisfied
    }
}

/// Always fails.
pub struct FalseCondition;

#[async_trait]
impl Condition for FalseCondition {
    fn name(&self) -> &str {
        "False"
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        ConditionResult::failed("False", "always fails")
    }
}
