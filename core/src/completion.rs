//! One-shot completion handles.
//!
//! [`completion`] creates a connected [`Promise`] / [`Completion`] pair on top
//! of a `futures` oneshot channel. The promise side settles the value exactly
//! once; the completion side observes it by registering a continuation, by
//! blocking, or by `.await`ing.
//!
//! Continuations run on whichever thread settles the promise, or immediately
//! on the registering thread when the value is already there.

use futures::channel::oneshot;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

pub use futures::channel::oneshot::Canceled;

type Hook = Box<dyn FnOnce() + Send + 'static>;

/// Slot for the continuation registered by [`Completion::on_complete`].
///
/// The promise fires it after the channel is settled, so the hook only has to
/// drain the receiver it captured.
#[derive(Default)]
struct HookSlot(Mutex<Option<Hook>>);

impl HookSlot {
    fn lock(&self) -> MutexGuard<'_, Option<Hook>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self) {
        let hook = self.lock().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Create a connected promise and completion.
///
/// ```rust
/// use coord_retry::completion;
///
/// let (promise, pending) = completion();
/// std::thread::spawn(move || promise.resolve(7));
/// assert_eq!(pending.wait(), Ok(7));
/// ```
pub fn completion<T>() -> (Promise<T>, Completion<T>) {
    let (sender, receiver) = oneshot::channel();
    let hook = Arc::new(HookSlot::default());

    (
        Promise {
            sender: Some(sender),
            hook: hook.clone(),
        },
        Completion {
            receiver,
            hook,
            settled: None,
        },
    )
}

/// Producer side of a completion. Settles it exactly once.
///
/// Dropping an unresolved promise settles the completion with [`Canceled`].
pub struct Promise<T> {
    sender: Option<oneshot::Sender<T>>,
    hook: Arc<HookSlot>,
}

impl<T> Promise<T> {
    /// Settle the completion with `value`.
    pub fn resolve(mut self, value: T) {
        if let Some(sender) = self.sender.take() {
            // a dropped completion has nobody left to tell
            let _ = sender.send(value);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        drop(self.sender.take());
        self.hook.fire();
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

/// Consumer side of a completion.
pub struct Completion<T> {
    receiver: oneshot::Receiver<T>,
    hook: Arc<HookSlot>,
    settled: Option<Result<T, Canceled>>,
}

// `T` is only ever moved, never pinned in place.
impl<T> Unpin for Completion<T> {}

fn drain<T>(receiver: &mut oneshot::Receiver<T>) -> Option<Result<T, Canceled>> {
    match receiver.try_recv() {
        Ok(Some(value)) => Some(Ok(value)),
        Ok(None) => None,
        Err(canceled) => Some(Err(canceled)),
    }
}

impl<T> Completion<T> {
    /// A completion that is already settled with `value`.
    pub fn ready(value: T) -> Self {
        let (promise, completion) = completion();
        promise.resolve(value);
        completion
    }

    /// Whether the value (or cancellation) is available.
    pub fn is_settled(&mut self) -> bool {
        if self.settled.is_none() {
            self.settled = drain(&mut self.receiver);
        }
        self.settled.is_some()
    }

    /// Register the continuation that receives the outcome.
    ///
    /// Runs immediately on this thread if the completion is already settled,
    /// otherwise on the thread that settles it.
    pub fn on_complete<F>(self, continuation: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, Canceled>) + Send + 'static,
    {
        let Completion {
            mut receiver,
            hook,
            settled,
        } = self;

        if let Some(outcome) = settled {
            return continuation(outcome);
        }

        let mut slot = hook.lock();
        match drain(&mut receiver) {
            Some(outcome) => {
                drop(slot);
                continuation(outcome);
            }
            None => {
                *slot = Some(Box::new(move || {
                    let outcome = drain(&mut receiver).unwrap_or(Err(Canceled));
                    continuation(outcome);
                }));
            }
        }
    }

    /// Block the current thread until the completion settles.
    pub fn wait(self) -> Result<T, Canceled> {
        match self.settled {
            Some(outcome) => outcome,
            None => futures::executor::block_on(self.receiver),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, Canceled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.settled.take() {
            return Poll::Ready(outcome);
        }
        Pin::new(&mut self.receiver).poll(cx)
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("settled", &self.settled.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_ready_completion() {
        let mut done = Completion::ready("ok");
        assert!(done.is_settled());
        assert_eq!(done.wait(), Ok("ok"));
    }

    #[test]
    fn test_pending_is_not_settled() {
        let (promise, mut pending) = completion::<u32>();
        assert!(!pending.is_settled());

        promise.resolve(3);
        assert!(pending.is_settled());
        assert_eq!(pending.wait(), Ok(3));
    }

    #[test]
    fn test_continuation_runs_on_resolve() {
        let (promise, pending) = completion::<u32>();
        let (tx, rx) = mpsc::channel();

        pending.on_complete(move |outcome| tx.send(outcome).unwrap());
        assert!(rx.try_recv().is_err());

        promise.resolve(5);
        assert_eq!(rx.try_recv().unwrap(), Ok(5));
    }

    #[test]
    fn test_continuation_runs_immediately_when_settled() {
        let (tx, rx) = mpsc::channel();
        Completion::ready(9).on_complete(move |outcome| tx.send(outcome).unwrap());
        assert_eq!(rx.try_recv().unwrap(), Ok(9));
    }

    #[test]
    fn test_continuation_after_is_settled() {
        let mut done = Completion::ready(4);
        assert!(done.is_settled());

        let (tx, rx) = mpsc::channel();
        done.on_complete(move |outcome| tx.send(outcome).unwrap());
        assert_eq!(rx.try_recv().unwrap(), Ok(4));
    }

    #[test]
    fn test_dropped_promise_cancels() {
        let (promise, pending) = completion::<u32>();
        drop(promise);
        assert_eq!(pending.wait(), Err(Canceled));

        let (promise, pending) = completion::<u32>();
        let (tx, rx) = mpsc::channel();
        pending.on_complete(move |outcome| tx.send(outcome).unwrap());
        drop(promise);
        assert_eq!(rx.try_recv().unwrap(), Err(Canceled));
    }

    #[test]
    fn test_resolve_races_registration() {
        for _ in 0..200 {
            let (promise, pending) = completion::<u32>();
            let (tx, rx) = mpsc::channel();

            let resolver = std::thread::spawn(move || promise.resolve(1));
            pending.on_complete(move |outcome| tx.send(outcome).unwrap());
            resolver.join().unwrap();

            assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), Ok(1));
        }
    }

    #[test]
    fn test_wait_across_threads() {
        let (promise, pending) = completion();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            promise.resolve(String::from("leader"));
        });
        assert_eq!(pending.wait().unwrap(), "leader");
    }

    #[tokio::test]
    async fn test_await_completion() {
        let (promise, pending) = completion();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            promise.resolve(42);
        });
        assert_eq!(pending.await, Ok(42));
    }
}
