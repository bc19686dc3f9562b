//! coord-retry - retry orchestration for coordination-service clients
//!
//! This crate drives a caller-supplied operation until it succeeds, runs out
//! of attempts, hits a deadline shared by the whole retry sequence, or is
//! interrupted by a polled predicate.
//!
//! # Features
//!
//! - **Exponential backoff with jitter**: symmetric jitter around the current delay
//! - **Deadlines**: one wall-clock budget for the entire sequence
//! - **Cooperative interruption**: a predicate polled at most every 100ms during waits
//! - **Blocking and callback-chained modes**: the same state machine drives both
//! - **async/await** (feature `async`) and **tokio** integration (feature `tokio`)
//!
//! # Example
//!
//! ```rust
//! use coord_retry::{RetryPolicy, ServiceError};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(5)
//!     .initial_delay(Duration::from_millis(1))
//!     .build();
//!
//! let mut calls = 0;
//! let value = policy.invoke(|| {
//!     calls += 1;
//!     if calls < 3 {
//!         Err(ServiceError::ConnectionLoss)
//!     } else {
//!         Ok("leader")
//!     }
//! });
//!
//! assert_eq!(value.unwrap(), "leader");
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub mod backoff;
pub mod chain;
pub mod completion;
#[cfg(feature = "serde")]
pub mod config;
pub mod error;
pub mod policy;
pub mod retry;
pub mod schedule;
pub mod session;
pub mod sleep;

pub use backoff::{BackoffStep, ExponentialBackoff};
pub use chain::RetryHandle;
pub use completion::{Canceled, Completion, Promise, completion};
#[cfg(feature = "serde")]
pub use config::{RegistryConfig, RetryConfig};
pub use error::{Classification, Classify, ErrorKind, RetryError, ServiceError};
pub use policy::PolicyRegistry;
pub use retry::{RetryBuilder, Retryable};
#[cfg(feature = "tokio")]
pub use schedule::TokioScheduler;
pub use schedule::{Scheduler, Task, ThreadScheduler};
pub use session::{RetrySession, Step};
#[cfg(feature = "tokio")]
pub use sleep::TokioSleeper;
#[cfg(feature = "async")]
pub use sleep::AsyncSleeper;
pub use sleep::{FnSleeper, POLL_INTERVAL, Sleeper, StdSleeper};

/// Predicate polled during waits; returning `true` stops the retry sequence.
pub type Interrupt = Arc<dyn Fn() -> bool + Send + Sync>;

const BASE_RETRYABLE: &[ErrorKind] = &[
    ErrorKind::ConnectionLoss,
    ErrorKind::OperationTimeout,
    ErrorKind::ForceRetry,
];

const EXPIRY_RETRYABLE: &[ErrorKind] = &[
    ErrorKind::ConnectionLoss,
    ErrorKind::OperationTimeout,
    ErrorKind::ForceRetry,
    ErrorKind::SessionExpired,
];

/// Total number of attempts a policy allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAttempts {
    /// At most this many invocations (always at least one).
    Limited(u32),
    /// Retry until success, deadline or interruption.
    Unlimited,
}

impl MaxAttempts {
    /// Whether `attempts` invocations already use up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        match self {
            MaxAttempts::Limited(max) => attempts >= *max,
            MaxAttempts::Unlimited => false,
        }
    }
}

/// Retry policy configuration
///
/// Immutable once built and cheap to clone; share one policy between any
/// number of concurrent calls. Use [`RetryPolicy::derive`] to specialise it
/// for a single call site.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: MaxAttempts,
    backoff: ExponentialBackoff,
    deadline: Option<Duration>,
    interrupt: Option<Interrupt>,
    session_expiry_retryable: bool,
    retryable_kinds: &'static [ErrorKind],
}

impl RetryPolicy {
    /// Create a new policy builder with default values
    ///
    /// # Default values
    ///
    /// - `max_attempts`: 3
    /// - `initial_delay`: 100ms
    /// - `multiplier`: 2.0
    /// - `max_jitter`: 0.4
    /// - `max_delay`: 60s
    /// - no deadline, no interrupt predicate
    /// - session expiry is retryable
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Start a builder pre-filled with every field of this policy.
    ///
    /// The original policy is never modified.
    ///
    /// ```rust
    /// use coord_retry::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let shared = RetryPolicy::default();
    /// let lock_policy = shared.derive().deadline(Duration::from_secs(5)).build();
    ///
    /// assert_eq!(shared.deadline(), None);
    /// assert_eq!(lock_policy.deadline(), Some(Duration::from_secs(5)));
    /// ```
    pub fn derive(&self) -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            deadline: self.deadline,
            interrupt: self.interrupt.clone(),
            session_expiry_retryable: self.session_expiry_retryable,
        }
    }

    /// Total attempts allowed.
    pub fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }

    /// Backoff parameters.
    pub fn backoff(&self) -> &ExponentialBackoff {
        &self.backoff
    }

    /// Time budget for a whole retry sequence.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Interrupt predicate, if configured.
    pub fn interrupt(&self) -> Option<&Interrupt> {
        self.interrupt.as_ref()
    }

    /// Whether session expiry counts as retryable.
    pub fn session_expiry_retryable(&self) -> bool {
        self.session_expiry_retryable
    }

    /// Error kinds that lead to another attempt.
    pub fn retryable_kinds(&self) -> &'static [ErrorKind] {
        self.retryable_kinds
    }

    /// Decide how this policy treats `error`.
    ///
    /// Connection-closed errors are never retried, whatever else is
    /// configured. Errors outside the taxonomy are logged as unexpected.
    pub fn classify<E: Classify + fmt::Debug>(&self, error: &E) -> Classification {
        match error.kind() {
            Some(ErrorKind::ConnectionClosed) => Classification::ConnectionClosed,
            Some(kind) if self.retryable_kinds.contains(&kind) => Classification::Retryable,
            Some(ErrorKind::SessionExpired) => Classification::Expired,
            Some(_) => Classification::Fatal,
            None => {
                tracing::error!(error = ?error, "unexpected error in retried operation");
                Classification::Unexpected
            }
        }
    }

    /// Run `operation` on the calling thread until it succeeds or the policy
    /// gives up, sleeping with [`StdSleeper`] between attempts.
    pub fn invoke<F, T, E>(&self, operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify + fmt::Debug,
    {
        operation.retry(self).call()
    }

    /// Like [`invoke`](Self::invoke) with a custom sleeper.
    pub fn invoke_with_sleeper<F, T, E, S>(
        &self,
        operation: F,
        sleeper: S,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify + fmt::Debug,
        S: Sleeper,
    {
        operation.retry(self).call_with_sleeper(sleeper)
    }

    /// Start a callback-chained retry sequence on `scheduler` and return its
    /// handle immediately.
    pub fn invoke_async<F, T, E, S>(&self, operation: F, scheduler: Arc<S>) -> RetryHandle<T, E>
    where
        F: FnMut() -> Completion<Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Classify + fmt::Debug + Send + 'static,
        S: Scheduler + ?Sized + 'static,
    {
        RetryBuilder::new(operation, self).spawn(scheduler)
    }

    /// Drive an async operation to completion, awaiting `sleeper` between
    /// attempts.
    #[cfg(feature = "async")]
    pub async fn invoke_future<F, Fut, T, E, S>(
        &self,
        operation: F,
        sleeper: S,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: Classify + fmt::Debug,
        S: AsyncSleeper,
    {
        RetryBuilder::new(operation, self).call_async(sleeper).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicyBuilder::default().build()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("deadline", &self.deadline)
            .field("interrupt", &self.interrupt.is_some())
            .field("session_expiry_retryable", &self.session_expiry_retryable)
            .finish()
    }
}

/// Builder for [`RetryPolicy`].
///
/// Inputs are clamped rather than rejected, so building never fails.
#[derive(Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: MaxAttempts,
    backoff: ExponentialBackoff,
    deadline: Option<Duration>,
    interrupt: Option<Interrupt>,
    session_expiry_retryable: bool,
}

impl RetryPolicyBuilder {
    /// Allow at most `attempts` invocations (0 is treated as 1).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = MaxAttempts::Limited(attempts.max(1));
        self
    }

    /// Retry until success, deadline or interruption.
    pub fn unlimited_attempts(mut self) -> Self {
        self.max_attempts = MaxAttempts::Unlimited;
        self
    }

    /// Set the delay before the first retry
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.backoff = self.backoff.initial_delay(delay);
        self
    }

    /// Set the backoff multiplier (clamped to at least 1.0)
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.backoff = self.backoff.multiplier(multiplier);
        self
    }

    /// Set the jitter fraction (clamped into `[0.0, 1.0]`)
    pub fn max_jitter(mut self, fraction: f64) -> Self {
        self.backoff = self.backoff.max_jitter(fraction);
        self
    }

    /// Set the maximum delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.backoff = self.backoff.max_delay(delay);
        self
    }

    /// Replace all backoff parameters at once.
    pub fn backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff
            .multiplier(backoff.multiplier)
            .max_jitter(backoff.max_jitter);
        self
    }

    /// Bound the whole retry sequence by `deadline`, measured from its start.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Remove any deadline.
    pub fn no_deadline(mut self) -> Self {
        self.deadline = None;
        self
    }

    /// Poll `interrupt` during waits; `true` stops the sequence.
    ///
    /// The predicate is cooperative: it is checked at most every
    /// [`POLL_INTERVAL`] while waiting and never while an operation runs.
    pub fn interrupt<P>(mut self, interrupt: P) -> Self
    where
        P: Fn() -> bool + Send + Sync + 'static,
    {
        self.interrupt = Some(Arc::new(interrupt));
        self
    }

    /// Remove any interrupt predicate.
    pub fn no_interrupt(mut self) -> Self {
        self.interrupt = None;
        self
    }

    /// Whether session expiry should be retried.
    pub fn session_expiry_retryable(mut self, retryable: bool) -> Self {
        self.session_expiry_retryable = retryable;
        self
    }

    /// Build the immutable policy.
    pub fn build(self) -> RetryPolicy {
        let retryable_kinds = if self.session_expiry_retryable {
            EXPIRY_RETRYABLE
        } else {
            BASE_RETRYABLE
        };

        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            deadline: self.deadline,
            interrupt: self.interrupt,
            session_expiry_retryable: self.session_expiry_retryable,
            retryable_kinds,
        }
    }
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::Limited(3),
            backoff: ExponentialBackoff::default(),
            deadline: None,
            interrupt: None,
            session_expiry_retryable: true,
        }
    }
}
