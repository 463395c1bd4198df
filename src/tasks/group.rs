//! # Group task.
//!
//! A [`GroupTask`] is a task whose body runs a set of member tasks on a private
//! [`TaskQueue`] and finishes once that queue is drained.
//!
//! ```text
//! GroupTask::new(name, members)
//!   private queue (built suspended) ◄── members held back until the body runs
//!
//! body:
//!   adopt the parent queue's exclusivity registry
//!   add held-back members ─► resume
//!   loop: wait_until_idle ─► no add_child in flight? ─► finishing
//!   finish(errors of every member, in member-finish order)
//! ```
//!
//! ## Rules
//! - Produced descendants land in the private queue and are members too.
//! - Cancelling the group cancels every unfinished member with
//!   [`TaskError::ParentCancelledWithErrors`] (plain cancel when the group carried no
//!   errors), and every member added later is cancelled on arrival.
//! - The body runs even when the group was cancelled before it started, so members
//!   are still driven to `Finished`.
//! - Internal tasks (condition evaluators, retry delays) are not members; their errors
//!   are never aggregated.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::core::{QueueConfig, QueueDelegate, TaskQueue};
use crate::error::{RuntimeError, TaskError};
use crate::observers::Observe;
use crate::tasks::body::{Body, BoxBodyFuture};
use crate::tasks::context::TaskContext;
use crate::tasks::state::UserIntent;
use crate::tasks::task::Task;

type ChildHook = Arc<dyn Fn(&Task) + Send + Sync>;

/// Member bookkeeping customization used by repeat and retry groups.
pub(crate) trait GroupHook: Send + Sync + 'static {
    /// A member is finishing with `errors`. Returns whether those errors are added to
    /// the group's errors.
    fn member_will_finish(
        &self,
        queue: &TaskQueue,
        member: &Task,
        errors: &[TaskError],
        group_cancelled: bool,
    ) -> bool;
}

#[derive(Default)]
struct GroupState {
    /// Members added before the body started.
    held: Vec<Task>,
    members: Vec<Task>,
    started: bool,
    finishing: bool,
    /// `add_child` calls between the finishing check and the queue insertion.
    in_flight: usize,
    /// Errors the group was cancelled with, once cancelled.
    cancelled: Option<Vec<TaskError>>,
    errors: Vec<TaskError>,
    child_hooks: Vec<ChildHook>,
}

struct GroupShared {
    state: Mutex<GroupState>,
    /// Signalled when an in-flight `add_child` completes.
    settled: Notify,
    hook: Option<Arc<dyn GroupHook>>,
}

impl GroupShared {
    fn cancel_errors(&self) -> Option<Vec<TaskError>> {
        self.state.lock().cancelled.clone()
    }
}

fn cancel_member(member: &Task, errors: &[TaskError]) {
    if errors.is_empty() {
        member.cancel();
    } else {
        member.cancel_with(vec![TaskError::ParentCancelledWithErrors {
            errors: errors.to_vec(),
        }]);
    }
}

/// Composite task running its members on a private queue.
///
/// ```rust
/// use taskflow::{GroupTask, Task, TaskQueue};
///
/// # #[tokio::main] async fn main() {
/// let group = GroupTask::new("both", vec![Task::noop("a"), Task::noop("b")]);
/// let queue = TaskQueue::default();
/// queue.add(group.task().clone()).unwrap();
/// assert!(group.task().finished().await.is_empty());
/// # }
/// ```
pub struct GroupTask {
    task: Task,
    shared: Arc<GroupShared>,
    queue: TaskQueue,
}

impl GroupTask {
    /// Creates a group over `members`.
    ///
    /// The group's user intent starts as the strongest intent among the members.
    pub fn new(name: impl Into<Arc<str>>, members: impl IntoIterator<Item = Task>) -> Self {
        Self::build(name.into(), members.into_iter().collect(), None)
    }

    pub(crate) fn with_hook(
        name: impl Into<Arc<str>>,
        members: Vec<Task>,
        hook: Arc<dyn GroupHook>,
    ) -> Self {
        Self::build(name.into(), members, Some(hook))
    }

    fn build(name: Arc<str>, members: Vec<Task>, hook: Option<Arc<dyn GroupHook>>) -> Self {
        let intent = members
            .iter()
            .map(Task::user_intent)
            .max()
            .unwrap_or_default();
        let shared = Arc::new(GroupShared {
            state: Mutex::new(GroupState {
                held: members.clone(),
                members,
                ..GroupState::default()
            }),
            settled: Notify::new(),
            hook,
        });
        let queue = TaskQueue::builder(QueueConfig::named(format!("{name}.members")))
            .with_delegate(Arc::new(GroupDelegate {
                shared: shared.clone(),
            }))
            .suspended()
            .build();

        let task = Task::new(
            name,
            GroupBody {
                shared: shared.clone(),
                queue: queue.clone(),
            },
        );
        task.set_user_intent(intent);
        // a fresh task is Initialized, attaching cannot fail
        let _ = task.add_observer(GroupCancel {
            shared: shared.clone(),
        });

        Self {
            task,
            shared,
            queue,
        }
    }

    /// The group's own task; add it to a queue to run the group.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Consumes the group, returning its task.
    pub fn into_task(self) -> Task {
        self.task
    }

    /// Private queue the members run on.
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Members so far, produced descendants included.
    pub fn members(&self) -> Vec<Task> {
        self.shared.state.lock().members.clone()
    }

    /// Adds a member.
    ///
    /// Before the group's body runs the child is held back like the initial members.
    /// Fails with [`RuntimeError::GroupFinishing`] once the group stopped accepting
    /// members.
    pub fn add_child(&self, child: impl Into<Task>) -> Result<(), RuntimeError> {
        let child = child.into();
        {
            let mut st = self.shared.state.lock();
            if st.finishing {
                return Err(RuntimeError::GroupFinishing {
                    group: self.task.name().to_string(),
                });
            }
            if !st.started {
                if !st.members.contains(&child) {
                    st.members.push(child.clone());
                }
                st.held.push(child);
                return Ok(());
            }
            st.in_flight += 1;
        }
        let res = self.queue.add(child);
        self.shared.state.lock().in_flight -= 1;
        self.shared.settled.notify_one();
        res
    }

    /// Adds several members, stopping at the first rejected one.
    pub fn add_children<I, T>(&self, children: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        children.into_iter().try_for_each(|c| self.add_child(c))
    }

    /// Sets the intent on the group and every current member.
    pub fn set_user_intent(&self, intent: UserIntent) {
        self.task.set_user_intent(intent);
        for member in self.members() {
            member.set_user_intent(intent);
        }
    }

    /// Calls `f` for every member right before it is added to the private queue.
    pub fn on_will_add_child(&self, f: impl Fn(&Task) + Send + Sync + 'static) {
        self.shared.state.lock().child_hooks.push(Arc::new(f));
    }
}

impl From<GroupTask> for Task {
    fn from(group: GroupTask) -> Self {
        group.task
    }
}

struct GroupBody {
    shared: Arc<GroupShared>,
    queue: TaskQueue,
}

impl Body for GroupBody {
    fn execute(&self, ctx: TaskContext) -> BoxBodyFuture {
        let shared = self.shared.clone();
        let queue = self.queue.clone();
        Box::pin(async move {
            queue.adopt_exclusivity(ctx.queue().exclusivity());
            let held = {
                let mut st = shared.state.lock();
                st.started = true;
                std::mem::take(&mut st.held)
            };
            for member in held {
                if let Err(e) = queue.add(member) {
                    tracing::warn!(group = %ctx.name(), error = %e, "member rejected");
                }
            }
            queue.resume();

            loop {
                queue.wait_until_idle().await;
                let adding = {
                    let mut st = shared.state.lock();
                    if st.in_flight == 0 && queue.is_empty() {
                        st.finishing = true;
                        break;
                    }
                    st.in_flight > 0
                };
                if adding {
                    shared.settled.notified().await;
                }
            }
            queue.suspend();

            let errors = std::mem::take(&mut shared.state.lock().errors);
            tracing::debug!(group = %ctx.name(), errors = errors.len(), "group drained");
            if let Err(e) = ctx.finish(errors) {
                tracing::debug!(group = %ctx.name(), error = %e, "group finish rejected");
            }
        })
    }

    fn runs_when_cancelled(&self) -> bool {
        true
    }
}

/// Private queue delegate: member tracking, late cancellation, error aggregation.
struct GroupDelegate {
    shared: Arc<GroupShared>,
}

impl QueueDelegate for GroupDelegate {
    fn will_add(&self, _queue: &TaskQueue, task: &Task) {
        if task.is_internal() {
            if self.shared.cancel_errors().is_some() {
                task.cancel();
            }
            return;
        }
        let (hooks, cancelled) = {
            let mut st = self.shared.state.lock();
            if !st.members.contains(task) {
                st.members.push(task.clone());
            }
            (st.child_hooks.clone(), st.cancelled.clone())
        };
        for hook in hooks {
            hook(task);
        }
        if let Some(errors) = cancelled {
            cancel_member(task, &errors);
        }
    }

    fn will_finish(&self, queue: &TaskQueue, task: &Task, errors: &[TaskError]) {
        if task.is_internal() {
            return;
        }
        let aggregate = match &self.shared.hook {
            Some(hook) => {
                let cancelled = self.shared.cancel_errors().is_some();
                hook.member_will_finish(queue, task, errors, cancelled)
            }
            None => true,
        };
        if aggregate && !errors.is_empty() {
            self.shared.state.lock().errors.extend_from_slice(errors);
        }
    }
}

/// Propagates the group's cancellation to its members.
struct GroupCancel {
    shared: Arc<GroupShared>,
}

impl Observe for GroupCancel {
    fn did_cancel(&self, group: &Task) {
        let errors = group.errors();
        let members = {
            let mut st = self.shared.state.lock();
            st.cancelled = Some(errors.clone());
            st.members.clone()
        };
        tracing::debug!(group = %group.name(), members = members.len(), "cancelling members");
        for member in &members {
            cancel_member(member, &errors);
        }
    }

    fn name(&self) -> &'static str {
        "group"
    }
}
