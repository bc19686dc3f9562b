//! Scheduling substrate for the callback-chained retry mode.
//!
//! A [`Scheduler`] runs a unit of work after a delay without blocking the
//! caller. Each step of an asynchronous retry chain is one such unit.

use std::time::Duration;

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs units of work, possibly after a delay, without blocking the caller.
pub trait Scheduler: Send + Sync {
    /// Run `task` once `delay` has elapsed (immediately for a zero delay).
    fn schedule(&self, delay: Duration, task: Task);
}

impl<S: Scheduler + ?Sized> Scheduler for std::sync::Arc<S> {
    fn schedule(&self, delay: Duration, task: Task) {
        (**self).schedule(delay, task);
    }
}

/// Scheduler that runs every unit on a fresh detached thread.
///
/// Suitable when no async runtime is available; each pending wait occupies
/// one sleeping thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        std::thread::spawn(move || {
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            task();
        });
    }
}

/// Scheduler backed by a tokio runtime.
///
/// Waits use `tokio::time::sleep`, so pending retries do not hold a thread.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioScheduler {
    /// Schedule onto the runtime behind `handle`.
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Schedule onto the runtime of the current context, if there is one.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

#[cfg(feature = "tokio")]
impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_thread_scheduler_runs_after_delay() {
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();

        ThreadScheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || tx.send(Instant::now()).unwrap()),
        );

        let ran_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(ran_at.duration_since(start) >= Duration::from_millis(19));
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_tokio_scheduler_runs_task() {
        let scheduler = TokioScheduler::try_current().expect("inside a runtime");
        let (tx, rx) = tokio::sync::oneshot::channel();

        scheduler.schedule(
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(7);
            }),
        );

        assert_eq!(rx.await.unwrap(), 7);
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn test_tokio_scheduler_absent_outside_runtime() {
        assert!(TokioScheduler::try_current().is_none());
    }
}
