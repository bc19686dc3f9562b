//! Exponential backoff with symmetric jitter
//!
//! This module computes the wait between two attempts of a retried operation.
//! The calculator is stateless: every call takes the current delay and returns
//! both the jittered sleep and the delay to use after the next failure.

use rand::Rng;
use std::time::Duration;

/// Result of a single backoff computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffStep {
    /// How long to wait before the next attempt
    pub sleep: Duration,
    /// Delay to feed into the following computation
    pub next_delay: Duration,
}

/// Exponential backoff strategy with configurable jitter
///
/// Each step scales the current delay by a random factor drawn uniformly from
/// `[1 - max_jitter, 1 + max_jitter]`, then multiplies the result by
/// `multiplier` to obtain the next delay, capped at `max_delay`.
///
/// # Example
///
/// ```rust
/// use coord_retry::ExponentialBackoff;
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::new()
///     .initial_delay(Duration::from_millis(100))
///     .multiplier(2.0)
///     .max_delay(Duration::from_secs(10))
///     .max_jitter(0.0);
///
/// let step = backoff.step(backoff.initial_delay);
/// assert_eq!(step.sleep, Duration::from_millis(100));
/// assert_eq!(step.next_delay, Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor applied after every failure (never below 1.0)
    pub multiplier: f64,
    /// Jitter fraction in `[0.0, 1.0]`
    pub max_jitter: f64,
    /// Upper bound for the computed delay
    pub max_delay: Duration,
}

impl ExponentialBackoff {
    /// Create a new exponential backoff builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the delay used before the first retry
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the exponential multiplier
    ///
    /// Values below 1.0 (and NaN) are clamped to 1.0.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = normalize_multiplier(multiplier);
        self
    }

    /// Set the jitter fraction (0.0 = no jitter, 1.0 = up to ±100%)
    ///
    /// Out of range values are clamped into `[0.0, 1.0]`; NaN disables jitter.
    pub fn max_jitter(mut self, fraction: f64) -> Self {
        self.max_jitter = normalize_jitter(fraction);
        self
    }

    /// Set the maximum delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Compute the next step using the thread-local random source.
    pub fn step(&self, current: Duration) -> BackoffStep {
        self.step_with_rng(current, &mut rand::rng())
    }

    /// Compute the next step with a provided RNG
    ///
    /// Useful for deterministic tests with a seeded generator.
    pub fn step_with_rng<R: Rng>(&self, current: Duration, rng: &mut R) -> BackoffStep {
        let jitter = normalize_jitter(self.max_jitter);
        let multiplier = normalize_multiplier(self.multiplier);

        let jitter_scalar = if jitter > 0.0 {
            rng.random_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };

        let sleep_secs = current.as_secs_f64() * jitter_scalar;
        let next_secs = (sleep_secs * multiplier).min(self.max_delay.as_secs_f64());

        BackoffStep {
            sleep: saturating_secs(sleep_secs),
            next_delay: saturating_secs(next_secs).min(self.max_delay),
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_jitter: 0.4,
            max_delay: Duration::from_secs(60),
        }
    }
}

pub(crate) fn normalize_jitter(fraction: f64) -> f64 {
    if fraction.is_nan() {
        0.0
    } else {
        fraction.clamp(0.0, 1.0)
    }
}

pub(crate) fn normalize_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_nan() || multiplier < 1.0 {
        1.0
    } else {
        multiplier
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_exponential_backoff_builder() {
        let backoff = ExponentialBackoff::new()
            .initial_delay(Duration::from_millis(200))
            .multiplier(3.0)
            .max_delay(Duration::from_secs(5))
            .max_jitter(0.5);

        assert_eq!(backoff.initial_delay, Duration::from_millis(200));
        assert_eq!(backoff.multiplier, 3.0);
        assert_eq!(backoff.max_delay, Duration::from_secs(5));
        assert_eq!(backoff.max_jitter, 0.5);
    }

    #[test]
    fn test_builder_clamps_inputs() {
        let backoff = ExponentialBackoff::new().max_jitter(7.5).multiplier(0.25);
        assert_eq!(backoff.max_jitter, 1.0);
        assert_eq!(backoff.multiplier, 1.0);

        let backoff = ExponentialBackoff::new()
            .max_jitter(-3.0)
            .multiplier(f64::NAN);
        assert_eq!(backoff.max_jitter, 0.0);
        assert_eq!(backoff.multiplier, 1.0);

        assert_eq!(ExponentialBackoff::new().max_jitter(f64::NAN).max_jitter, 0.0);
    }

    #[test]
    fn test_exponential_steps_without_jitter() {
        let backoff = ExponentialBackoff::new()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_jitter(0.0);

        let mut rng = SmallRng::seed_from_u64(42);

        let first = backoff.step_with_rng(backoff.initial_delay, &mut rng);
        assert_eq!(first.sleep, Duration::from_millis(100));
        assert_eq!(first.next_delay, Duration::from_millis(200));

        let second = backoff.step_with_rng(first.next_delay, &mut rng);
        assert_eq!(second.sleep, Duration::from_millis(200));
        assert_eq!(second.next_delay, Duration::from_millis(400));
    }

    #[test]
    fn test_jitter_bounds() {
        let backoff = ExponentialBackoff::new().max_jitter(0.25);
        let current = Duration::from_millis(1000);
        let mut rng = SmallRng::seed_from_u64(7);

        for _ in 0..1000 {
            let step = backoff.step_with_rng(current, &mut rng);
            let ms = step.sleep.as_secs_f64() * 1000.0;
            assert!(
                (749.999..=1250.001).contains(&ms),
                "sleep {}ms outside jitter bounds",
                ms
            );
        }
    }

    #[test]
    fn test_thread_rng_jitter_bounds() {
        let backoff = ExponentialBackoff::new()
            .max_jitter(0.4)
            .multiplier(2.0)
            .max_delay(Duration::from_secs(60));
        let current = Duration::from_millis(500);

        for _ in 0..1000 {
            let step = backoff.step(current);
            let ms = step.sleep.as_secs_f64() * 1000.0;
            assert!(
                (299.999..=700.001).contains(&ms),
                "sleep {}ms outside jitter bounds",
                ms
            );
            assert!(step.next_delay <= Duration::from_millis(1401));
            assert!(step.next_delay >= Duration::from_millis(599));
        }
    }

    #[test]
    fn test_jitter_varies() {
        let backoff = ExponentialBackoff::new().max_jitter(1.0);
        let mut rng = SmallRng::seed_from_u64(42);

        let sleeps: Vec<Duration> = (0..10)
            .map(|_| backoff.step_with_rng(Duration::from_secs(1), &mut rng).sleep)
            .collect();

        assert!(sleeps.windows(2).any(|w| w[0] != w[1]));
        assert!(sleeps.iter().all(|s| *s <= Duration::from_secs(2)));
    }

    #[test]
    fn test_max_delay_cap() {
        let backoff = ExponentialBackoff::new()
            .initial_delay(Duration::from_millis(100))
            .multiplier(1_000_000.0)
            .max_jitter(1.0)
            .max_delay(Duration::from_millis(500));

        let mut rng = SmallRng::seed_from_u64(42);
        let mut delay = backoff.initial_delay;

        for _ in 0..50 {
            let step = backoff.step_with_rng(delay, &mut rng);
            assert!(step.next_delay <= Duration::from_millis(500));
            delay = step.next_delay;
        }
    }

    #[test]
    fn test_huge_delay_saturates() {
        let backoff = ExponentialBackoff::new()
            .max_jitter(1.0)
            .max_delay(Duration::MAX);

        let mut rng = SmallRng::seed_from_u64(1);
        let step = backoff.step_with_rng(Duration::MAX, &mut rng);
        assert!(step.next_delay <= Duration::MAX);
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        let backoff = ExponentialBackoff::new().initial_delay(Duration::ZERO);
        let step = backoff.step(Duration::ZERO);
        assert_eq!(step.sleep, Duration::ZERO);
        assert_eq!(step.next_delay, Duration::ZERO);
    }
}
