//! # Repeat and retry groups.
//!
//! Both are [`GroupTask`](crate::GroupTask)s fed by a generator of [`RepeatPayload`]s:
//! - [`RepeatedTask`]: runs instances back to back, reporting every instance's errors;
//! - [`RetryTask`]: runs attempts until one succeeds, keeping earlier failures as
//!   historical errors.
//!
//! Delays between instances come from a [`WaitStrategy`](crate::WaitStrategy) and are
//! realised as internal [`DelayTask`](crate::DelayTask) dependencies, so a waiting
//! instance holds no concurrency slot.

mod engine;
mod payload;
mod repeated;
mod retry;

pub use payload::{Configure, Generator, RepeatPayload, Repeatable};
pub use repeated::{RepeatBuilder, RepeatedTask};
pub use retry::{RetryBuilder, RetryFailureInfo, RetryHandler, RetryTask};
