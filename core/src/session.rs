//! Per-call retry state and its transition function.
//!
//! A [`RetrySession`] is created for every retried call and owned by whatever
//! drives that call: the blocking loop, the async loop, or the callback chain.
//! [`RetrySession::advance`] is the single transition shared by all three.

use crate::error::{Classification, Classify, RetryError};
use crate::RetryPolicy;
use rand::Rng;
use std::fmt;
use std::time::{Duration, Instant};

/// What to do after a failed attempt.
#[derive(Debug)]
pub enum Step<E> {
    /// Wait `sleep`, then make another attempt. The error is handed back for
    /// notification.
    Retry {
        /// Jittered wait before the next attempt.
        sleep: Duration,
        /// The retryable error that caused this step.
        error: E,
    },
    /// The sequence is over.
    Stop(RetryError<E>),
}

/// Mutable state of one retried call.
#[derive(Debug, Clone)]
pub struct RetrySession {
    attempts: u32,
    delay: Duration,
    deadline: Option<Instant>,
}

impl RetrySession {
    /// Start a session now.
    pub fn start(policy: &RetryPolicy) -> Self {
        Self::start_at(policy, Instant::now())
    }

    /// Start a session at `now`.
    pub fn start_at(policy: &RetryPolicy, now: Instant) -> Self {
        Self {
            attempts: 0,
            delay: policy.backoff().initial_delay,
            deadline: policy.deadline().and_then(|budget| now.checked_add(budget)),
        }
    }

    /// Invocations started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay the next backoff step starts from.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Absolute deadline of the sequence.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Record that an invocation is about to start and return its number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Transition after a failed attempt, using the current time and the
    /// thread-local random source.
    pub fn advance<E>(&mut self, policy: &RetryPolicy, error: E) -> Step<E>
    where
        E: Classify + fmt::Debug,
    {
        self.advance_at(policy, error, Instant::now(), &mut rand::rng())
    }

    /// Transition after a failed attempt observed at `now`.
    ///
    /// Non-retryable errors stop the sequence with the error unchanged. For
    /// retryable errors the attempt budget is checked first, then a backoff
    /// step is computed and rejected if its sleep would reach the deadline.
    pub fn advance_at<E, R>(
        &mut self,
        policy: &RetryPolicy,
        error: E,
        now: Instant,
        rng: &mut R,
    ) -> Step<E>
    where
        E: Classify + fmt::Debug,
        R: Rng,
    {
        match policy.classify(&error) {
            Classification::Retryable => {}
            Classification::ConnectionClosed => {
                tracing::debug!(attempt = self.attempts, "connection closed, not retrying");
                return Step::Stop(RetryError::Operation(error));
            }
            Classification::Expired | Classification::Fatal | Classification::Unexpected => {
                return Step::Stop(RetryError::Operation(error));
            }
        }

        if policy.max_attempts().is_exhausted(self.attempts) {
            tracing::warn!(attempts = self.attempts, error = ?error, "too many retry attempts");
            return Step::Stop(RetryError::TooManyAttempts {
                attempts: self.attempts,
            });
        }

        let step = policy.backoff().step_with_rng(self.delay, rng);

        if let Some(deadline) = self.deadline {
            let wakes_at = now.checked_add(step.sleep);
            if wakes_at.is_none_or(|at| at >= deadline) {
                tracing::warn!(
                    attempts = self.attempts,
                    sleep = ?step.sleep,
                    "retry deadline exceeded"
                );
                return Step::Stop(RetryError::DeadlineExceeded {
                    attempts: self.attempts,
                });
            }
        }

        self.delay = step.next_delay;
        tracing::debug!(
            attempt = self.attempts,
            sleep = ?step.sleep,
            error = ?error,
            "retrying after backoff"
        );
        Step::Retry {
            sleep: step.sleep,
            error,
        }
    }
}
