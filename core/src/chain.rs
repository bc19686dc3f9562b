//! Callback-chained retries.
//!
//! The chain owns its [`RetrySession`] and moves itself into every unit of
//! work it hands to the [`Scheduler`]. Exactly one unit is alive at a time,
//! so the session is never shared and needs no lock.
//!
//! Flow of one attempt:
//!
//! 1. a scheduled unit increments the attempt counter and calls the operation;
//! 2. a continuation is registered on the returned [`Completion`];
//! 3. when it fires, success settles the outer handle and a failure is
//!    re-submitted as a new unit that runs [`RetrySession::advance`];
//! 4. the wait is a timed unit (sliced at [`POLL_INTERVAL`] when an interrupt
//!    predicate is set) and the last slice starts the next attempt.
//!
//! The continuation never calls the next attempt directly, so a long chain
//! does not grow the stack.

use crate::completion::{Canceled, Completion, Promise, completion};
use crate::error::{Classify, RetryError};
use crate::retry::RetryBuilder;
use crate::schedule::Scheduler;
use crate::session::{RetrySession, Step};
use crate::sleep::POLL_INTERVAL;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Handle to a retry sequence running on a [`Scheduler`].
///
/// Settled exactly once with the operation's value or the terminal
/// [`RetryError`]. Can be blocked on, observed with a continuation, or
/// `.await`ed.
pub struct RetryHandle<T, E> {
    inner: Completion<Result<T, RetryError<E>>>,
}

impl<T, E> RetryHandle<T, E> {
    /// Whether the sequence has finished.
    pub fn is_settled(&mut self) -> bool {
        self.inner.is_settled()
    }

    /// Block the current thread until the sequence finishes.
    pub fn wait(self) -> Result<T, RetryError<E>> {
        flatten(self.inner.wait())
    }

    /// Register a continuation for the final outcome.
    pub fn on_complete<F>(self, continuation: F)
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(Result<T, RetryError<E>>) + Send + 'static,
    {
        self.inner
            .on_complete(move |outcome| continuation(flatten(outcome)));
    }
}

impl<T, E> Future for RetryHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(flatten)
    }
}

impl<T, E> fmt::Debug for RetryHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("inner", &self.inner)
            .finish()
    }
}

fn flatten<T, E>(outcome: Result<Result<T, RetryError<E>>, Canceled>) -> Result<T, RetryError<E>> {
    outcome.unwrap_or(Err(RetryError::Abandoned))
}

impl<F, T, E> RetryBuilder<F, T, E>
where
    F: FnMut() -> Completion<Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classify + fmt::Debug + Send + 'static,
{
    /// Start the retry sequence on `scheduler` and return its handle.
    ///
    /// Nothing runs on the calling thread: even the first attempt is a
    /// scheduled unit of work.
    pub fn spawn<S>(self, scheduler: Arc<S>) -> RetryHandle<T, E>
    where
        S: Scheduler + ?Sized + 'static,
    {
        let (promise, outer) = completion();
        let chain = Box::new(Chain {
            session: RetrySession::start(&self.policy),
            builder: self,
            scheduler,
            promise,
        });

        chain.submit(Duration::ZERO, Chain::attempt);
        RetryHandle { inner: outer }
    }
}

struct Chain<F, T, E, S: ?Sized> {
    builder: RetryBuilder<F, T, E>,
    session: RetrySession,
    scheduler: Arc<S>,
    promise: Promise<Result<T, RetryError<E>>>,
}

impl<F, T, E, S> Chain<F, T, E, S>
where
    F: FnMut() -> Completion<Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Classify + fmt::Debug + Send + 'static,
    S: Scheduler + ?Sized + 'static,
{
    fn submit<N>(self: Box<Self>, delay: Duration, next: N)
    where
        N: FnOnce(Box<Self>) + Send + 'static,
    {
        let scheduler = Arc::clone(&self.scheduler);
        scheduler.schedule(delay, Box::new(move || next(self)));
    }

    fn attempt(mut self: Box<Self>) {
        self.session.begin_attempt();
        let pending = (self.builder.operation)();
        pending.on_complete(move |outcome| self.evaluate(outcome));
    }

    fn evaluate(self: Box<Self>, outcome: Result<Result<T, E>, Canceled>) {
        match outcome {
            Ok(Ok(value)) => self.finish(Ok(value)),
            Ok(Err(error)) => self.submit(Duration::ZERO, move |chain| chain.back_off(error)),
            Err(Canceled) => self.finish(Err(RetryError::Abandoned)),
        }
    }

    fn back_off(mut self: Box<Self>, error: E) {
        match self.session.advance(&self.builder.policy, error) {
            Step::Retry { sleep, error } => {
                self.builder.notify_retry(&error, sleep);
                self.wait(sleep);
            }
            Step::Stop(terminal) => self.finish(Err(terminal)),
        }
    }

    fn wait(self: Box<Self>, remaining: Duration) {
        if remaining.is_zero() || self.builder.policy.interrupt().is_none() {
            return self.submit(remaining, Chain::attempt);
        }

        let slice = remaining.min(POLL_INTERVAL);
        self.submit(slice, move |chain| {
            let interrupted = chain
                .builder
                .policy
                .interrupt()
                .is_some_and(|interrupt| interrupt());

            if interrupted {
                let attempts = chain.session.attempts();
                tracing::warn!(attempts, "retry interrupted");
                chain.finish(Err(RetryError::Interrupted { attempts }));
            } else if remaining > slice {
                chain.wait(remaining - slice);
            } else {
                chain.attempt();
            }
        });
    }

    fn finish(self: Box<Self>, outcome: Result<T, RetryError<E>>) {
        let Chain { promise, .. } = *self;
        promise.resolve(outcome);
    }
}
