//! Conditions gating task execution.
//!
//! ## Contents
//! - [`Condition`], [`ConditionResult`] the authoring surface
//! - [`BlockCondition`], [`TrueCondition`], [`FalseCondition`] closure/constant conditions
//! - [`NegatedCondition`] inverts another condition
//! - [`SilentCondition`] evaluates another condition without its dependency
//! - [`MutuallyExclusive`] category-only serialization
//! - [`NoFailedDependenciesCondition`] gates on the outcome of explicit dependencies
//!
//! The queue compiles a task's conditions into an internal evaluator task; see
//! `conditions::evaluator`.

mod block;
mod condition;
pub(crate) mod evaluator;
mod exclusive;
mod negated;
mod no_failed;
mod silent;

pub use block::{BlockCondition, FalseCondition, TrueCondition};
pub use condition::{Condition, ConditionResult};
pub use exclusive::MutuallyExclusive;
pub use negated::NegatedCondition;
pub use no_failed::NoFailedDependenciesCondition;
pub use silent::SilentCondition;
