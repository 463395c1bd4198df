//! # Queue configuration.
//!
//! Provides [`QueueConfig`], the settings a [`TaskQueue`](crate::TaskQueue) is built with.
//!
//! ## Sentinel values
//! - `max_concurrent = 0` → unlimited (no semaphore created)
//! - `timeout = 0s` → no default deadline

use std::time::Duration;

/// Settings for one task queue.
///
/// ## Field semantics
/// - `name`: used in logs and event metadata
/// - `max_concurrent`: bodies running at once (`0` = unlimited, `1` = serial)
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `timeout`: default deadline attached to every non-internal task without one
///   (`0s` = none)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Queue name.
    pub name: String,

    /// Maximum number of task bodies executing at once.
    ///
    /// Tasks waiting on dependencies or conditions do not hold a slot.
    pub max_concurrent: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Default per-task deadline.
    pub timeout: Duration,
}

impl QueueConfig {
    /// Default config with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns the concurrency limit as an `Option`.
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_concurrent == 0 {
            None
        } else {
            Some(self.max_concurrent)
        }
    }

    /// Returns the default per-task deadline as an `Option`.
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout == Duration::ZERO {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for QueueConfig {
    /// - `name = "taskflow"`
    /// - `max_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `timeout = 0s` (no default deadline)
    fn default() -> Self {
        Self {
            name: "taskflow".to_string(),
            max_concurrent: 0,
            bus_capacity: 1024,
            timeout: Duration::ZERO,
        }
    }
}
