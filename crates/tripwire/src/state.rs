// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

/// The operating mode of a [`CircuitBreaker`][crate::CircuitBreaker].
///
/// ```text
/// Closed   --(failure count reaches threshold)------> Open
/// Open     --(reset timeout elapsed, call arrives)--> HalfOpen
/// HalfOpen --(probe succeeds)-----------------------> Closed
/// HalfOpen --(probe fails)--------------------------> Open
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CircuitState {
    /// Normal operation. Calls pass through and consecutive failures are counted.
    Closed,

    /// The circuit is tripped. Calls are rejected without being attempted.
    Open,

    /// The reset timeout has elapsed and a single probe call decides the next state.
    HalfOpen,
}

impl CircuitState {
    /// Returns the `snake_case` name of the state as used in telemetry.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_str_ok() {
        assert_eq!(CircuitState::Closed.as_str(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
