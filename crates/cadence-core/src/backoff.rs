//! Retry delay schedule.
//!
//! Delays grow along a short Fibonacci-like sequence of multipliers and then
//! plateau, so the worst-case wait is bounded even for long retry chains.
//!
//! ```text
//! attempt:     0  1  2  3  4   5   6   7   8+
//! multiplier:  1  2  3  5  8  13  21  34  34
//! ```

use std::time::Duration;

use rand::Rng;

/// Multipliers applied to the base delay, indexed by zero-based attempt.
pub const FIBONACCI_MULTIPLIERS: [u32; 8] = [1, 2, 3, 5, 8, 13, 21, 34];

/// Upper bound of the random extra added by [`BackoffPolicy::jittered`],
/// as a fraction of the delay.
pub const JITTER_FRACTION: f64 = 0.25;

/// Configuration for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay unit multiplied by the sequence.
    pub base: Duration,

    /// Hard cap for any computed delay (before jitter).
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max_delay: Duration) -> Self {
        Self { base, max_delay }
    }

    /// Delay before retrying after the given zero-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let index = (attempt as usize).min(FIBONACCI_MULTIPLIERS.len() - 1);
        self.cap(self.base.saturating_mul(FIBONACCI_MULTIPLIERS[index]))
    }

    /// Clamp an arbitrary delay to `max_delay`.
    pub fn cap(&self, delay: Duration) -> Duration {
        delay.min(self.max_delay)
    }

    /// Add a uniformly random extra of up to 25% of `delay`.
    pub fn jittered(&self, delay: Duration) -> Duration {
        delay + jitter(delay)
    }
}

impl Default for BackoffPolicy {
    /// 1 second base, 60 second cap.
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Random extra in `[0, delay * JITTER_FRACTION]`.
pub fn jitter(delay: Duration) -> Duration {
    let max_extra_ms = (delay.as_millis() as f64 * JITTER_FRACTION) as u64;
    if max_extra_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_extra_ms))
}
