//! Retry mechanism with fluent builder API
//!
//! This module provides the [`Retryable`] extension trait and the
//! [`RetryBuilder`] that drives a [`RetrySession`] to completion, either by
//! blocking the calling thread or, with the `async` feature, by awaiting.
//! The callback-chained mode lives in [`crate::chain`].

use crate::error::{Classify, RetryError};
use crate::session::{RetrySession, Step};
use crate::sleep::{Sleeper, StdSleeper, sleep_interruptibly};
use crate::RetryPolicy;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub(crate) type Notify<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Extension trait that adds `.retry()` to functions and closures
///
/// This trait is automatically implemented for all `FnMut` types that
/// return `Result`.
///
/// # Example
///
/// ```rust
/// use coord_retry::{RetryPolicy, Retryable, ServiceError};
///
/// fn read_config() -> Result<String, ServiceError> {
///     // ... operation that might fail
/// #   Ok("data".to_string())
/// }
///
/// let policy = RetryPolicy::default();
/// let result = read_config.retry(&policy).call();
/// assert!(result.is_ok());
/// ```
pub trait Retryable<T, E> {
    /// Begin building a retry operation under `policy`
    fn retry(self, policy: &RetryPolicy) -> RetryBuilder<Self, T, E>
    where
        Self: Sized;
}

impl<F, T, E> Retryable<T, E> for F
where
    F: FnMut() -> Result<T, E>,
{
    fn retry(self, policy: &RetryPolicy) -> RetryBuilder<Self, T, E> {
        RetryBuilder::new(self, policy)
    }
}

/// Builder for configuring and executing retry operations
///
/// Created by calling `.retry()` on a function or closure, or by
/// [`RetryBuilder::new`] for operations returning futures or completions.
///
/// # Type Parameters
///
/// * `F` - The operation function type
/// * `T` - The success return type
/// * `E` - The error type
pub struct RetryBuilder<F, T, E> {
    pub(crate) operation: F,
    pub(crate) policy: RetryPolicy,
    pub(crate) notify: Option<Notify<E>>,
    _phantom: PhantomData<fn() -> T>,
}

impl<F, T, E> RetryBuilder<F, T, E> {
    /// Wrap `operation` with a copy of `policy`.
    pub fn new(operation: F, policy: &RetryPolicy) -> Self {
        Self {
            operation,
            policy: policy.clone(),
            notify: None,
            _phantom: PhantomData,
        }
    }

    /// Add a notification callback that's invoked before each retry
    ///
    /// The callback receives the error that triggered the retry and the
    /// wait before the next attempt.
    ///
    /// # Example
    ///
    /// ```rust
    /// use coord_retry::{RetryPolicy, Retryable, ServiceError};
    ///
    /// fn fetch_children() -> Result<Vec<String>, ServiceError> {
    ///     // ...
    /// #   Ok(vec![])
    /// }
    ///
    /// let policy = RetryPolicy::default();
    /// let result = fetch_children
    ///     .retry(&policy)
    ///     .notify(|err, delay| {
    ///         println!("Retrying after {:?}: {}", delay, err);
    ///     })
    ///     .call();
    /// ```
    pub fn notify<N>(mut self, callback: N) -> Self
    where
        N: Fn(&E, Duration) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(callback));
        self
    }

    /// The policy this builder runs under.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub(crate) fn notify_retry(&self, error: &E, sleep: Duration) {
        if let Some(notify) = &self.notify {
            notify(error, sleep);
        }
    }
}

impl<F, T, E> RetryBuilder<F, T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Classify + fmt::Debug,
{
    /// Execute the retry operation with blocking sleep
    ///
    /// Runs the operation on the calling thread, sleeping with
    /// [`StdSleeper`] between attempts.
    pub fn call(self) -> Result<T, RetryError<E>> {
        self.call_with_sleeper(StdSleeper)
    }

    /// Execute the retry operation with a custom sleeper
    ///
    /// # Example
    ///
    /// ```rust
    /// use coord_retry::{RetryPolicy, Retryable, ServiceError, FnSleeper};
    ///
    /// let policy = RetryPolicy::builder().max_attempts(2).build();
    /// let mut calls = 0;
    /// let result = (|| {
    ///     calls += 1;
    ///     if calls == 1 { Err(ServiceError::OperationTimeout) } else { Ok(calls) }
    /// })
    /// .retry(&policy)
    /// .call_with_sleeper(FnSleeper(|_| {}));
    ///
    /// assert_eq!(result.unwrap(), 2);
    /// ```
    pub fn call_with_sleeper<S: Sleeper>(mut self, sleeper: S) -> Result<T, RetryError<E>> {
        let mut session = RetrySession::start(&self.policy);

        loop {
            session.begin_attempt();
            let error = match (self.operation)() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let sleep = match session.advance(&self.policy, error) {
                Step::Retry { sleep, error } => {
                    self.notify_retry(&error, sleep);
                    sleep
                }
                Step::Stop(terminal) => return Err(terminal),
            };

            if !sleep_interruptibly(&sleeper, sleep, self.policy.interrupt()) {
                tracing::warn!(attempts = session.attempts(), "retry interrupted");
                return Err(RetryError::Interrupted {
                    attempts: session.attempts(),
                });
            }
        }
    }
}

#[cfg(feature = "async")]
impl<F, Fut, T, E> RetryBuilder<F, T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Classify + fmt::Debug,
{
    /// Execute the retry operation as a future, awaiting `sleeper` between
    /// attempts.
    pub async fn call_async<S>(mut self, sleeper: S) -> Result<T, RetryError<E>>
    where
        S: crate::sleep::AsyncSleeper,
    {
        let mut session = RetrySession::start(&self.policy);

        loop {
            session.begin_attempt();
            let error = match (self.operation)().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let sleep = match session.advance(&self.policy, error) {
                Step::Retry { sleep, error } => {
                    self.notify_retry(&error, sleep);
                    sleep
                }
                Step::Stop(terminal) => return Err(terminal),
            };

            let completed = crate::sleep::sleep_interruptibly_async(
                &sleeper,
                sleep,
                self.policy.interrupt(),
            )
            .await;
            if !completed {
                tracing::warn!(attempts = session.attempts(), "retry interrupted");
                return Err(RetryError::Interrupted {
                    attempts: session.attempts(),
                });
            }
        }
    }
}
