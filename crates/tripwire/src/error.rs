// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use thiserror::Error;

/// The circuit breaker rejected a call without executing the operation.
///
/// This is returned while the circuit is open and the reset timeout has not elapsed yet, or
/// while another caller holds the single probe slot of a half-open circuit. The condition is
/// always transient: the caller can retry later or take a fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("circuit breaker is open, the call was rejected without being executed")]
pub struct CircuitOpenError {
    retry_after: Option<Duration>,
}

impl CircuitOpenError {
    pub(crate) fn new(retry_after: Option<Duration>) -> Self {
        Self { retry_after }
    }

    /// Returns how long the circuit stays open before a probe call is admitted.
    ///
    /// Returns `None` when the rejection was caused by a probe that is still in flight, in
    /// which case the remaining time depends on the probe's outcome.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// The error returned by [`CircuitBreaker::execute`][crate::CircuitBreaker::execute].
///
/// The two variants carry different operational meaning: [`Error::Open`] means the breaker
/// refused to attempt the call, while [`Error::Operation`] is the operation's own error,
/// passed through unchanged.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// The call was rejected by the circuit breaker and the operation was never invoked.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation was invoked and failed.
    #[error(transparent)]
    Operation(E),
}

impl<E> Error<E> {
    /// Returns `true` if the call was rejected without executing the operation.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Returns the operation's error, if the operation was executed.
    #[must_use]
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Open(_) => None,
            Self::Operation(error) => Some(error),
        }
    }

    /// Consumes the error and returns the operation's error, if the operation was executed.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Open(_) => None,
            Self::Operation(error) => Some(error),
        }
    }
}

/// Invalid circuit breaker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The failure threshold must be at least 1.
    #[error("failure threshold must be at least 1")]
    ZeroFailureThreshold,

    /// The reset timeout must be greater than zero.
    #[error("reset timeout must be greater than zero")]
    ZeroResetTimeout,
}
