//! # Wait strategies for repeated tasks.
//!
//! [`WaitStrategy`] maps an attempt number (0-indexed) to a delay. [`WaitStrategy::delays`]
//! turns it into an infinite [`Delays`] iterator, optionally jittered.
//!
//! Every strategy except `Random` and `Custom` is a pure function of the attempt number;
//! jitter output never feeds back into the base delay (decorrelated jitter only looks
//! at its own previous output).
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskflow::WaitStrategy;
//!
//! let wait = WaitStrategy::Exponential {
//!     period: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//! };
//!
//! let delays: Vec<Duration> = wait.delays().take(6).collect();
//! assert_eq!(delays[0], Duration::from_millis(100));
//! assert_eq!(delays[3], Duration::from_millis(800));
//! assert_eq!(delays[5], Duration::from_secs(1)); // capped
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use super::jitter::JitterPolicy;

/// How the delay before the next instance evolves.
#[derive(Clone)]
pub enum WaitStrategy {
    /// Always the same delay.
    Fixed(Duration),
    /// Uniformly random in `[min, max]` (millisecond resolution).
    Random {
        /// Lower bound.
        min: Duration,
        /// Upper bound.
        max: Duration,
    },
    /// `initial + increment × attempt`.
    Incrementing {
        /// Delay for attempt 0.
        initial: Duration,
        /// Added per attempt.
        increment: Duration,
    },
    /// `period × 2^attempt`, clamped to `max`.
    Exponential {
        /// Delay for attempt 0.
        period: Duration,
        /// Cap.
        max: Duration,
    },
    /// `period × fib(attempt + 1)` (1, 1, 2, 3, 5, ...), clamped to `max`.
    Fibonacci {
        /// Unit delay.
        period: Duration,
        /// Cap.
        max: Duration,
    },
    /// Caller-supplied function of the attempt number.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Default for WaitStrategy {
    /// `Fixed(100ms)`.
    fn default() -> Self {
        WaitStrategy::Fixed(Duration::from_millis(100))
    }
}

impl fmt::Debug for WaitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStrategy::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            WaitStrategy::Random { min, max } => f
                .debug_struct("Random")
                .field("min", min)
                .field("max", max)
                .finish(),
            WaitStrategy::Incrementing { initial, increment } => f
                .debug_struct("Incrementing")
                .field("initial", initial)
                .field("increment", increment)
                .finish(),
            WaitStrategy::Exponential { period, max } => f
                .debug_struct("Exponential")
                .field("period", period)
                .field("max", max)
                .finish(),
            WaitStrategy::Fibonacci { period, max } => f
                .debug_struct("Fibonacci")
                .field("period", period)
                .field("max", max)
                .finish(),
            WaitStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl WaitStrategy {
    /// Wraps a closure as [`WaitStrategy::Custom`].
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        WaitStrategy::Custom(Arc::new(f))
    }

    /// Computes the (unjittered) delay for the given attempt number.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            WaitStrategy::Fixed(d) => *d,
            WaitStrategy::Random { min, max } => {
                let lo = min.as_millis() as u64;
                let hi = max.as_millis() as u64;
                if lo >= hi {
                    *min
                } else {
                    Duration::from_millis(rand::rng().random_range(lo..=hi))
                }
            }
            WaitStrategy::Incrementing { initial, increment } => increment
                .checked_mul(attempt)
                .and_then(|step| initial.checked_add(step))
                .unwrap_or(Duration::MAX),
            WaitStrategy::Exponential { period, max } => {
                let exp = attempt.min(i32::MAX as u32) as i32;
                let secs = period.as_secs_f64() * 2f64.powi(exp);
                if !secs.is_finite() || secs > max.as_secs_f64() {
                    *max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
            WaitStrategy::Fibonacci { period, max } => match fibonacci(attempt) {
                Some(n) if n <= u64::from(u32::MAX) => period
                    .checked_mul(n as u32)
                    .map_or(*max, |d| d.min(*max)),
                _ => *max,
            },
            WaitStrategy::Custom(f) => f(attempt),
        }
    }

    /// Upper bound of the strategy, when it has one.
    pub fn cap(&self) -> Option<Duration> {
        match self {
            WaitStrategy::Fixed(d) => Some(*d),
            WaitStrategy::Random { max, .. }
            | WaitStrategy::Exponential { max, .. }
            | WaitStrategy::Fibonacci { max, .. } => Some(*max),
            WaitStrategy::Incrementing { .. } | WaitStrategy::Custom(_) => None,
        }
    }

    /// Infinite iterator of delays for attempts 0, 1, 2, ...
    pub fn delays(&self) -> Delays {
        Delays {
            strategy: self.clone(),
            jitter: JitterPolicy::None,
            attempt: 0,
            prev: None,
        }
    }
}

/// `fib(attempt + 1)`, or `None` on overflow.
fn fibonacci(attempt: u32) -> Option<u64> {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..attempt {
        let next = a.checked_add(b)?;
        a = b;
        b = next;
    }
    Some(b)
}

/// Infinite delay sequence produced by [`WaitStrategy::delays`].
#[derive(Clone, Debug)]
pub struct Delays {
    strategy: WaitStrategy,
    jitter: JitterPolicy,
    attempt: u32,
    prev: Option<Duration>,
}

impl Delays {
    /// Applies `jitter` to every produced delay.
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let base = self.strategy.delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        let delay = match self.jitter {
            JitterPolicy::Decorrelated => {
                let floor = self.strategy.delay(0).min(base);
                let cap = self.strategy.cap().unwrap_or(Duration::MAX);
                self.jitter
                    .apply_decorrelated(floor, self.prev.unwrap_or(base), cap)
            }
            _ => self.jitter.apply(base),
        };
        self.prev = Some(delay);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn fixed_yields_the_same_delay() {
        let wait = WaitStrategy::Fixed(ms(250));
        assert!(wait.delays().take(20).all(|d| d == ms(250)));
    }

    #[test]
    fn exponential_increases_until_cap() {
        let wait = WaitStrategy::Exponential {
            period: ms(10),
            max: ms(1000),
        };
        let delays: Vec<Duration> = wait.delays().take(12).collect();
        let capped_at = delays.iter().position(|d| *d == ms(1000)).unwrap();
        for pair in delays[..capped_at].windows(2) {
            assert!(pair[0] < pair[1], "{pair:?}");
        }
        assert!(delays[capped_at..].iter().all(|d| *d == ms(1000)));
        assert_eq!(&delays[..4], &[ms(10), ms(20), ms(40), ms(80)]);
    }

    #[test]
    fn exponential_survives_huge_attempts() {
        let wait = WaitStrategy::Exponential {
            period: ms(100),
            max: Duration::from_secs(10),
        };
        assert_eq!(wait.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn incrementing_adds_per_attempt() {
        let wait = WaitStrategy::Incrementing {
            initial: ms(100),
            increment: ms(50),
        };
        assert_eq!(wait.delay(0), ms(100));
        assert_eq!(wait.delay(3), ms(250));
        assert_eq!(wait.cap(), None);
    }

    #[test]
    fn fibonacci_sequence_and_cap() {
        let wait = WaitStrategy::Fibonacci {
            period: ms(10),
            max: ms(75),
        };
        let delays: Vec<Duration> = wait.delays().take(7).collect();
        assert_eq!(
            delays,
            vec![ms(10), ms(10), ms(20), ms(30), ms(50), ms(75), ms(75)]
        );
        assert_eq!(wait.delay(500), ms(75));
    }

    #[test]
    fn random_stays_within_bounds() {
        let wait = WaitStrategy::Random {
            min: ms(20),
            max: ms(40),
        };
        for d in wait.delays().take(200) {
            assert!(d >= ms(20) && d <= ms(40), "{d:?}");
        }
        let degenerate = WaitStrategy::Random {
            min: ms(30),
            max: ms(10),
        };
        assert_eq!(degenerate.delay(0), ms(30));
    }

    #[test]
    fn custom_receives_attempt_numbers() {
        let wait = WaitStrategy::custom(|n| ms(u64::from(n) * 7));
        let delays: Vec<Duration> = wait.delays().take(3).collect();
        assert_eq!(delays, vec![ms(0), ms(7), ms(14)]);
        assert_eq!(format!("{wait:?}"), "Custom(..)");
    }

    #[test]
    fn jitter_is_applied_per_delay() {
        let delays = WaitStrategy::Fixed(ms(400))
            .delays()
            .with_jitter(JitterPolicy::Equal);
        for d in delays.take(100) {
            assert!(d >= ms(200) && d <= ms(400));
        }
    }

    #[test]
    fn decorrelated_jitter_is_capped() {
        let wait = WaitStrategy::Exponential {
            period: ms(100),
            max: Duration::from_secs(2),
        };
        for d in wait
            .delays()
            .with_jitter(JitterPolicy::Decorrelated)
            .take(50)
        {
            assert!(d >= ms(100) && d <= Duration::from_secs(2), "{d:?}");
        }
    }
}
