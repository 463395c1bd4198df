use std::borrow::Cow;

use async_trait::async_trait;

use crate::conditions::{Condition, ConditionResult};
use crate::tasks::Task;

/// Always-satisfied condition that only serializes tasks of one category.
///
/// ```rust
/// use taskflow::{MutuallyExclusive, Task};
///
/// let alert = Task::noop("show alert");
/// alert.add_condition(MutuallyExclusive::new("alerts")).unwrap();
/// ```
pub struct MutuallyExclusive {
    name: String,
    category: String,
}

impl MutuallyExclusive {
    /// Condition for `category`.
    pub fn new(category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            name: format!("MutuallyExclusive<{category}>"),
            category,
        }
    }
}

#[async_trait]
impl Condition for MutuallyExclusive {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_mutually_exclusive(&self) -> bool {
        true
    }

    fn category(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.category)
    }

    async fn evaluate(&self, _task: &Task) -> ConditionResult {
        ConditionResult::Satisfied
    }
}
