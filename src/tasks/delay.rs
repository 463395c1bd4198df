//! Pure delay tasks.

use std::time::{Duration, Instant};

use crate::tasks::body::{Body, BoxBodyFuture};
use crate::tasks::context::TaskContext;
use crate::tasks::Task;

/// How long a [`DelayTask`] waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    /// Relative to when the delay task starts executing.
    By(Duration),
    /// Until an absolute instant.
    Until(Instant),
}

impl Delay {
    /// Time left to wait if the delay started now.
    pub fn remaining(&self) -> Duration {
        match self {
            Delay::By(d) => *d,
            Delay::Until(at) => at.saturating_duration_since(Instant::now()),
        }
    }
}

impl From<Duration> for Delay {
    fn from(d: Duration) -> Self {
        Delay::By(d)
    }
}

/// Task that waits and then finishes without errors. Cancellation ends the wait early.
pub struct DelayTask;

impl DelayTask {
    /// Builds the delay task.
    pub fn new(delay: impl Into<Delay>) -> Task {
        let delay = delay.into();
        Task::new(format!("Delay({delay:?})"), DelayBody { delay })
    }

    /// Delay task that groups do not report as a member.
    pub(crate) fn internal(delay: Delay) -> Task {
        Task::internal(format!("Delay({delay:?})"), DelayBody { delay })
    }
}

struct DelayBody {
    delay: Delay,
}

impl Body for DelayBody {
    fn execute(&self, ctx: TaskContext) -> BoxBodyFuture {
        let wait = self.delay.remaining();
        Box::pin(async move {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = ctx.cancelled() => {}
            }
            let _ = ctx.finish(Vec::new());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn until_in_the_past_is_immediate() {
        let past = Instant::now() - Duration::from_secs(1);
        assert_eq!(Delay::Until(past).remaining(), Duration::ZERO);
        assert_eq!(Delay::from(Duration::from_millis(5)).remaining(), Duration::from_millis(5));
    }

    #[test]
    fn delay_tasks_are_named_after_their_delay() {
        let t = DelayTask::new(Duration::from_millis(10));
        assert_eq!(&*t.name(), "Delay(By(10ms))");
        assert!(!t.is_internal());
        assert!(DelayTask::internal(Delay::By(Duration::ZERO)).is_internal());
    }
}
