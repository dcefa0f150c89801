// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Arguments for the [`on_opened`][crate::CircuitBreakerBuilder::on_opened] callback.
///
/// Provides context when the circuit trips from closed to open.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnOpenedArgs<'a> {
    pub(crate) name: &'a str,
    pub(crate) failure_count: u32,
}

impl OnOpenedArgs<'_> {
    /// Returns the name of the circuit breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the number of consecutive failures that tripped the circuit.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }
}

/// Arguments for the [`on_closed`][crate::CircuitBreakerBuilder::on_closed] callback.
///
/// Provides context when a successful probe closes the circuit again.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnClosedArgs<'a> {
    pub(crate) name: &'a str,
    pub(crate) open_duration: Duration,
}

impl OnClosedArgs<'_> {
    /// Returns the name of the circuit breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns how long the circuit was not closed, measured from when it first opened.
    #[must_use]
    pub fn open_duration(&self) -> Duration {
        self.open_duration
    }
}

/// Arguments for the [`on_probing`][crate::CircuitBreakerBuilder::on_probing] callback.
#[derive(Debug)]
#[non_exhaustive]
pub struct OnProbingArgs<'a> {
    pub(crate) name: &'a str,
}

impl OnProbingArgs<'_> {
    /// Returns the name of the circuit breaker.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name
    }
}
