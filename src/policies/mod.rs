//! Wait strategies for repeated and retried tasks.
//!
//! This module holds the knobs that control **how long** a repeat or retry group waits
//! before scheduling its next instance.
//!
//! ## Contents
//! - [`WaitStrategy`] how delays evolve (fixed / random / incrementing / exponential /
//!   fibonacci / custom)
//! - [`Delays`] the infinite delay iterator a strategy produces
//! - [`JitterPolicy`] randomization on top of the strategy
//!
//! ## Quick wiring
//! ```text
//! RetryTask::builder(name).wait(WaitStrategy::..)
//!      └─► strategy.delays() zipped with the task factory
//!           └─► RepeatPayload { delay, task, configure } per attempt
//! ```
//!
//! ## Defaults
//! - `WaitStrategy::default()` is `Fixed(100ms)`.
//! - `JitterPolicy::None`.

mod jitter;
mod wait;

pub use jitter::JitterPolicy;
pub use wait::{Delays, WaitStrategy};
