// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::time::Duration;

use crate::{CircuitState, ProbeFailurePolicy};

/// Result of attempting to enter the circuit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EnterCircuitResult {
    /// The operation is allowed to proceed.
    ///
    /// The `mode` tells whether this is the single probe call of a half-open circuit. The
    /// `generation` identifies the closed period the call was admitted in and is handed back
    /// to [`CircuitEngine::exit`].
    Accepted { mode: ExecutionMode, generation: u64 },

    /// The operation is rejected because the circuit is open or a probe is in flight.
    Rejected { retry_after: Option<Duration> },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ExitCircuitResult {
    /// The state remains unchanged.
    Unchanged,

    /// Circuit transitioned from Closed to Open.
    Opened { failure_count: u32 },

    /// Circuit went back to Open because the probe failed.
    Reopened { failure_count: u32 },

    /// Circuit transitioned back to Closed after a successful probe.
    Closed { open_duration: Duration, stats: Stats },
}

/// Determines the mode of execution for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    /// Regular operation.
    Normal,

    /// The single trial call that decides whether the circuit closes again.
    Probe,
}

/// From the perspective of the circuit, an execution either succeeds or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
}

impl ExecutionResult {
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(_) => Self::Failure,
        }
    }

    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// Configuration options for the circuit engine.
#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub probe_failure_policy: ProbeFailurePolicy,
}

/// Point-in-time view of the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Snapshot {
    pub state: CircuitState,
    pub failure_count: u32,
}

/// The default engine with telemetry.
pub(crate) type Engine = EngineTelemetry<EngineCore>;

/// Trait defining the behavior of a circuit engine.
///
/// Every accepted `enter` is followed by exactly one `exit` or one `abandon` for the same mode.
/// A normal result whose `generation` is older than the current one is ignored.
pub(crate) trait CircuitEngine: Debug + Send + Sync + 'static {
    fn enter(&self) -> EnterCircuitResult;

    fn exit(&self, result: ExecutionResult, mode: ExecutionMode, generation: u64) -> ExitCircuitResult;

    /// Releases an accepted execution whose outcome will never be known.
    ///
    /// Returns `true` if a probe claim was released.
    fn abandon(&self, mode: ExecutionMode) -> bool;

    fn snapshot(&self) -> Snapshot;
}

mod engine_core;
pub(crate) use engine_core::*;

#[cfg(test)]
mod engine_fake;
#[cfg(test)]
pub(crate) use engine_fake::*;

mod engine_telemetry;
pub(crate) use engine_telemetry::*;
