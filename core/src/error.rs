//! Error taxonomy for retried coordination-service operations.
//!
//! - [`ErrorKind`]: the kinds of failure the orchestrator knows how to treat.
//! - [`Classify`]: how an operation's error reports its kind.
//! - [`ServiceError`]: a ready-made error type covering the taxonomy.
//! - [`RetryError`]: the terminal error returned to callers.

use std::fmt;
use thiserror::Error;

/// Kinds of coordination-service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection dropped; the request may or may not have been applied.
    ConnectionLoss,
    /// The request did not complete in time.
    OperationTimeout,
    /// Recipe logic asked for another attempt.
    ForceRetry,
    /// The server expired the client session.
    SessionExpired,
    /// The client connection was closed on purpose and can never be used again.
    ConnectionClosed,
    /// Any other error reported by the coordination service.
    Service,
}

impl ErrorKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionLoss => "connection_loss",
            ErrorKind::OperationTimeout => "operation_timeout",
            ErrorKind::ForceRetry => "force_retry",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::ConnectionClosed => "connection_closed",
            ErrorKind::Service => "service",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Implemented by error types that a retry policy can classify.
///
/// Operations translate protocol-level failures into an [`ErrorKind`]
/// themselves; the orchestrator never inspects error codes.
pub trait Classify {
    /// The kind of this error, or `None` when it lies outside the
    /// coordination-service taxonomy (for example a bug in the caller).
    fn kind(&self) -> Option<ErrorKind>;
}

impl<E: Classify + ?Sized> Classify for &E {
    fn kind(&self) -> Option<ErrorKind> {
        (**self).kind()
    }
}

impl<E: Classify + ?Sized> Classify for Box<E> {
    fn kind(&self) -> Option<ErrorKind> {
        (**self).kind()
    }
}

/// How a retry policy treats a particular error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Another attempt may succeed.
    Retryable,
    /// The connection is closed for good; propagate immediately.
    ConnectionClosed,
    /// The session expired and the policy does not retry expiry.
    Expired,
    /// Any other coordination-service failure.
    Fatal,
    /// The error is not part of the taxonomy at all.
    Unexpected,
}

impl Classification {
    /// Whether this classification leads to another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Classification::Retryable)
    }
}

/// # Errors raised by coordination-service operations.
///
/// Every variant except [`ServiceError::Foreign`] belongs to the taxonomy.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Connection to the server was lost.
    #[error("connection lost")]
    ConnectionLoss,

    /// The request timed out.
    #[error("operation timed out")]
    OperationTimeout,

    /// The client session expired.
    #[error("session expired")]
    SessionExpired,

    /// The connection was closed by the client.
    #[error("connection has been closed")]
    ConnectionClosed,

    /// Retry requested explicitly by recipe code.
    #[error("retry forced: {reason}")]
    ForceRetry {
        /// Why another attempt is wanted.
        reason: String,
    },

    /// The addressed node does not exist.
    #[error("node does not exist: {path}")]
    NoNode {
        /// Path of the missing node.
        path: String,
    },

    /// The node already exists.
    #[error("node already exists: {path}")]
    NodeExists {
        /// Path of the existing node.
        path: String,
    },

    /// Any other server-reported failure.
    #[error("service error {code}: {message}")]
    Api {
        /// Server error code.
        code: i32,
        /// Server-provided message.
        message: String,
    },

    /// An error from outside the coordination-service taxonomy.
    #[error("unexpected error: {0}")]
    Foreign(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ServiceError {
    /// Convenience constructor for [`ServiceError::ForceRetry`].
    pub fn force_retry(reason: impl Into<String>) -> Self {
        ServiceError::ForceRetry {
            reason: reason.into(),
        }
    }
}

impl Classify for ServiceError {
    fn kind(&self) -> Option<ErrorKind> {
        match self {
            ServiceError::ConnectionLoss => Some(ErrorKind::ConnectionLoss),
            ServiceError::OperationTimeout => Some(ErrorKind::OperationTimeout),
            ServiceError::SessionExpired => Some(ErrorKind::SessionExpired),
            ServiceError::ConnectionClosed => Some(ErrorKind::ConnectionClosed),
            ServiceError::ForceRetry { .. } => Some(ErrorKind::ForceRetry),
            ServiceError::NoNode { .. }
            | ServiceError::NodeExists { .. }
            | ServiceError::Api { .. } => Some(ErrorKind::Service),
            ServiceError::Foreign(_) => None,
        }
    }
}

/// # Terminal error of a retried call.
///
/// Either the orchestrator gave up ([`TooManyAttempts`](RetryError::TooManyAttempts),
/// [`DeadlineExceeded`](RetryError::DeadlineExceeded)), was told to stop
/// ([`Interrupted`](RetryError::Interrupted)), or the operation failed in a way
/// that is never retried ([`Operation`](RetryError::Operation)).
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// The attempt budget was used up.
    #[error("too many retry attempts ({attempts})")]
    TooManyAttempts {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The next wait would have ended past the deadline.
    #[error("retry deadline exceeded after {attempts} attempts")]
    DeadlineExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },

    /// The interrupt predicate asked the sequence to stop.
    #[error("retry interrupted after {attempts} attempts")]
    Interrupted {
        /// Attempts made before the interruption.
        attempts: u32,
    },

    /// The operation dropped its completion handle without settling it.
    #[error("operation abandoned its completion handle")]
    Abandoned,

    /// A non-retryable failure from the operation, unchanged.
    #[error("{0}")]
    Operation(E),
}

impl<E> RetryError<E> {
    /// True when the orchestrator gave up or was interrupted, as opposed to
    /// passing through an operation error.
    pub fn is_retry_failed(&self) -> bool {
        matches!(
            self,
            RetryError::TooManyAttempts { .. }
                | RetryError::DeadlineExceeded { .. }
                | RetryError::Interrupted { .. }
        )
    }

    /// True when the interrupt predicate stopped the sequence.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RetryError::Interrupted { .. })
    }

    /// The wrapped operation error, if any.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            RetryError::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Unwrap the operation error, if any.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            RetryError::Operation(error) => Some(error),
            _ => None,
        }
    }

    /// Attempts made before the orchestrator stopped, when it stopped by itself.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::TooManyAttempts { attempts }
            | RetryError::DeadlineExceeded { attempts }
            | RetryError::Interrupted { attempts } => Some(*attempts),
            _ => None,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RetryError::TooManyAttempts { .. } => "retry_too_many_attempts",
            RetryError::DeadlineExceeded { .. } => "retry_deadline_exceeded",
            RetryError::Interrupted { .. } => "retry_interrupted",
            RetryError::Abandoned => "retry_abandoned",
            RetryError::Operation(_) => "retry_operation_failed",
        }
    }
}
