//! Sleep abstraction for the blocking and async retry loops
//!
//! This module provides the blocking [`Sleeper`] trait, its std and closure
//! implementations, the async counterpart [`AsyncSleeper`] (feature `async`),
//! and the sliced waits that poll an interrupt predicate.

use crate::Interrupt;
use std::time::Duration;

/// Longest uninterrupted slice of a wait when an interrupt predicate is set.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Trait for blocking sleep implementations
///
/// - Standard library blocking sleep ([`StdSleeper`])
/// - Closures, for tests or custom clocks ([`FnSleeper`])
pub trait Sleeper {
    /// Block the current thread for `duration`
    fn sleep(&self, duration: Duration);
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Standard library sleeper using `std::thread::sleep`
///
/// # Example
///
/// ```rust
/// use coord_retry::sleep::{Sleeper, StdSleeper};
/// use std::time::Duration;
///
/// StdSleeper.sleep(Duration::from_millis(1));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StdSleeper;

impl Sleeper for StdSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Closure sleeper for custom sleep implementations
///
/// # Example
///
/// ```rust
/// use coord_retry::sleep::{FnSleeper, Sleeper};
/// use std::cell::RefCell;
/// use std::time::Duration;
///
/// let slept = RefCell::new(Vec::new());
/// let sleeper = FnSleeper(|d| slept.borrow_mut().push(d));
/// sleeper.sleep(Duration::from_millis(100));
///
/// assert_eq!(slept.borrow().as_slice(), &[Duration::from_millis(100)]);
/// ```
#[derive(Clone, Copy)]
pub struct FnSleeper<F: Fn(Duration)>(pub F);

impl<F: Fn(Duration)> Sleeper for FnSleeper<F> {
    fn sleep(&self, duration: Duration) {
        (self.0)(duration);
    }
}

/// Split `total` into consecutive slices no longer than [`POLL_INTERVAL`].
///
/// A zero wait yields no slices.
pub fn poll_slices(total: Duration) -> impl Iterator<Item = Duration> {
    let mut remaining = total;
    std::iter::from_fn(move || {
        if remaining.is_zero() {
            return None;
        }
        let slice = remaining.min(POLL_INTERVAL);
        remaining -= slice;
        Some(slice)
    })
}

/// Wait for `total`, polling `interrupt` after every slice when it is set.
///
/// Returns `false` as soon as the predicate reports an interruption; the
/// remaining slices are skipped.
pub fn sleep_interruptibly<S: Sleeper + ?Sized>(
    sleeper: &S,
    total: Duration,
    interrupt: Option<&Interrupt>,
) -> bool {
    match interrupt {
        None => {
            sleeper.sleep(total);
            true
        }
        Some(interrupted) => {
            for slice in poll_slices(total) {
                sleeper.sleep(slice);
                if interrupted() {
                    return false;
                }
            }
            true
        }
    }
}

/// Trait for async sleep implementations
#[cfg(feature = "async")]
#[async_trait::async_trait]
pub trait AsyncSleeper: Send + Sync {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

#[cfg(feature = "async")]
#[async_trait::async_trait]
impl<S: AsyncSleeper + ?Sized> AsyncSleeper for &S {
    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await;
    }
}

/// Async sleeper backed by `tokio::time::sleep`
#[cfg(feature = "tokio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[cfg(feature = "tokio")]
#[async_trait::async_trait]
impl AsyncSleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Async version of [`sleep_interruptibly`].
#[cfg(feature = "async")]
pub async fn sleep_interruptibly_async<S: AsyncSleeper + ?Sized>(
    sleeper: &S,
    total: Duration,
    interrupt: Option<&Interrupt>,
) -> bool {
    match interrupt {
        None => {
            sleeper.sleep(total).await;
            true
        }
        Some(interrupted) => {
            for slice in poll_slices(total) {
                sleeper.sleep(slice).await;
                if interrupted() {
                    return false;
                }
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;

    #[test]
    fn test_std_sleeper() {
        let start = std::time::Instant::now();
        StdSleeper.sleep(Duration::from_millis(10));
        let elapsed = start.elapsed();

        // Allow some margin for timing precision
        assert!(elapsed >= Duration::from_millis(9));
    }

    #[test]
    fn test_fn_sleeper() {
        let total = Cell::new(Duration::ZERO);
        let sleeper = FnSleeper(|d| total.set(total.get() + d));
        sleeper.sleep(Duration::from_millis(40));
        sleeper.sleep(Duration::from_millis(2));
        assert_eq!(total.get(), Duration::from_millis(42));
    }

    #[test]
    fn test_poll_slices() {
        let slices: Vec<Duration> = poll_slices(Duration::from_millis(250)).collect();
        assert_eq!(
            slices,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(100),
                Duration::from_millis(50),
            ]
        );
        assert_eq!(poll_slices(Duration::ZERO).count(), 0);
        assert_eq!(poll_slices(Duration::from_millis(100)).count(), 1);
    }

    #[test]
    fn test_uninterruptible_wait_is_one_sleep() {
        let slept = RefCell::new(Vec::new());
        let sleeper = FnSleeper(|d| slept.borrow_mut().push(d));

        assert!(sleep_interruptibly(&sleeper, Duration::from_millis(350), None));
        assert_eq!(slept.borrow().as_slice(), &[Duration::from_millis(350)]);
    }

    #[test]
    fn test_interrupt_stops_wait_early() {
        let slept = RefCell::new(Vec::new());
        let sleeper = FnSleeper(|d| slept.borrow_mut().push(d));

        let polls = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = polls.clone();
        let interrupt: Interrupt = Arc::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) >= 1
        });

        let completed = sleep_interruptibly(&sleeper, Duration::from_secs(1), Some(&interrupt));

        assert!(!completed);
        assert_eq!(polls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(
            slept.borrow().as_slice(),
            &[Duration::from_millis(100), Duration::from_millis(100)]
        );
    }

    #[test]
    fn test_quiet_interrupt_completes_wait() {
        let slept = RefCell::new(Vec::new());
        let sleeper = FnSleeper(|d| slept.borrow_mut().push(d));
        let interrupt: Interrupt = Arc::new(|| false);

        assert!(sleep_interruptibly(&sleeper, Duration::from_millis(230), Some(&interrupt)));
        let total: Duration = slept.borrow().iter().sum();
        assert_eq!(total, Duration::from_millis(230));
        assert!(slept.borrow().iter().all(|d| *d <= POLL_INTERVAL));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_async_interrupt_stops_wait_early() {
        let interrupt: Interrupt = Arc::new(|| true);
        let start = std::time::Instant::now();

        let completed =
            sleep_interruptibly_async(&TokioSleeper, Duration::from_secs(5), Some(&interrupt))
                .await;

        assert!(!completed);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
