//! # Jitter for wait strategies.
//!
//! [`JitterPolicy`] randomizes the delays produced by a [`WaitStrategy`] so that many
//! retrying groups do not wake up in lockstep.
//!
//! - [`JitterPolicy::None`]: the strategy's delay, unchanged
//! - [`JitterPolicy::Full`]: uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + uniform[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: uniform in `[floor, prev * 3]`, capped
//!
//! [`WaitStrategy`]: crate::WaitStrategy

use std::time::Duration;

use rand::Rng;

/// Randomization applied on top of a wait strategy's delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Keeps at least half of each delay.
    Equal,
    /// Grows from the previous jittered delay instead of the strategy's base.
    ///
    /// Needs context, see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to a single delay.
    ///
    /// `Decorrelated` returns the input unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => Duration::from_millis(uniform(0, ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + uniform(0, half))
            }
        }
    }

    /// Applies decorrelated jitter: uniform in `[floor, min(prev * 3, cap)]`.
    ///
    /// Other policies fall back to `apply(prev)`.
    pub fn apply_decorrelated(&self, floor: Duration, prev: Duration, cap: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(prev);
        }
        let lo = millis(floor);
        let hi = millis(prev).saturating_mul(3).min(millis(cap)).max(lo);
        Duration::from_millis(uniform(lo, hi))
    }
}

#[inline]
fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

fn uniform(lo: u64, hi: u64) -> u64 {
    if lo >= hi {
        return lo;
    }
    rand::rng().random_range(lo..=hi)
}
