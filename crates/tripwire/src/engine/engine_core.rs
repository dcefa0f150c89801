// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tick::Clock;

use super::{CircuitEngine, EngineOptions, EnterCircuitResult, ExecutionMode, ExecutionResult, ExitCircuitResult, Snapshot};
use crate::constants::ERR_POISONED_LOCK;
use crate::{CircuitState, ProbeFailurePolicy};

/// Engine that owns the state of the circuit breaker.
#[derive(Debug)]
pub(crate) struct EngineCore {
    state: Mutex<State>,
    options: EngineOptions,
    clock: Clock,
}

impl EngineCore {
    pub fn new(options: EngineOptions, clock: Clock) -> Self {
        Self {
            state: Mutex::new(State {
                circuit: Circuit::Closed,
                failures: 0,
                generation: 0,
            }),
            options,
            clock,
        }
    }
}

impl CircuitEngine for EngineCore {
    fn enter(&self) -> EnterCircuitResult {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        self.state.lock().expect(ERR_POISONED_LOCK).enter(now, &self.options)
    }

    fn exit(&self, result: ExecutionResult, mode: ExecutionMode, generation: u64) -> ExitCircuitResult {
        let now = self.clock.instant();

        // NOTE: Remember to execute all expensive operations (like time checks) outside the lock.
        self.state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .exit(result, mode, generation, now, &self.options)
    }

    fn abandon(&self, mode: ExecutionMode) -> bool {
        self.state.lock().expect(ERR_POISONED_LOCK).abandon(mode)
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        Snapshot {
            state: state.circuit.as_circuit_state(),
            failure_count: state.failures,
        }
    }
}

#[derive(Debug)]
struct State {
    circuit: Circuit,
    failures: u32,
    /// Incremented every time the circuit leaves `Closed`.
    generation: u64,
}

#[derive(Debug)]
enum Circuit {
    Closed,
    Open {
        opened_at: Instant,
        stats: Stats,
    },
    HalfOpen {
        opened_at: Instant,
        probe_in_flight: bool,
        stats: Stats,
    },
}

impl Circuit {
    fn as_circuit_state(&self) -> CircuitState {
        match self {
            Self::Closed => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl State {
    fn enter(&mut self, now: Instant, options: &EngineOptions) -> EnterCircuitResult {
        match &mut self.circuit {
            Circuit::Closed => EnterCircuitResult::Accepted {
                mode: ExecutionMode::Normal,
                generation: self.generation,
            },
            Circuit::Open { opened_at, stats } => {
                let elapsed = now.saturating_duration_since(*opened_at);

                if elapsed < options.reset_timeout {
                    stats.rejected = stats.rejected.saturating_add(1);
                    return EnterCircuitResult::Rejected {
                        retry_after: Some(options.reset_timeout.saturating_sub(elapsed)),
                    };
                }

                // This call becomes the probe, so the slot is claimed before the lock is released.
                stats.probes = stats.probes.saturating_add(1);
                self.circuit = Circuit::HalfOpen {
                    opened_at: *opened_at,
                    probe_in_flight: true,
                    stats: stats.clone(),
                };

                EnterCircuitResult::Accepted {
                    mode: ExecutionMode::Probe,
                    generation: self.generation,
                }
            }
            Circuit::HalfOpen {
                probe_in_flight: true,
                stats,
                ..
            } => {
                stats.rejected = stats.rejected.saturating_add(1);
                EnterCircuitResult::Rejected { retry_after: None }
            }
            Circuit::HalfOpen {
                probe_in_flight,
                stats,
                ..
            } => {
                *probe_in_flight = true;
                stats.probes = stats.probes.saturating_add(1);
                EnterCircuitResult::Accepted {
                    mode: ExecutionMode::Probe,
                    generation: self.generation,
                }
            }
        }
    }

    fn exit(
        &mut self,
        result: ExecutionResult,
        mode: ExecutionMode,
        generation: u64,
        now: Instant,
        options: &EngineOptions,
    ) -> ExitCircuitResult {
        match (&mut self.circuit, mode) {
            // Admitted before the circuit last opened, so the result belongs to an earlier closed period.
            (Circuit::Closed, ExecutionMode::Normal) if generation != self.generation => ExitCircuitResult::Unchanged,
            (Circuit::Closed, ExecutionMode::Normal) => match result {
                ExecutionResult::Success => {
                    self.failures = 0;
                    ExitCircuitResult::Unchanged
                }
                ExecutionResult::Failure => {
                    self.failures = self.failures.saturating_add(1);

                    if self.failures < options.failure_threshold {
                        return ExitCircuitResult::Unchanged;
                    }

                    self.circuit = Circuit::Open {
                        opened_at: now,
                        stats: Stats::new(now),
                    };
                    self.generation = self.generation.wrapping_add(1);

                    ExitCircuitResult::Opened {
                        failure_count: self.failures,
                    }
                }
            },
            (Circuit::HalfOpen { opened_at, stats, .. }, ExecutionMode::Probe) => match result {
                ExecutionResult::Success => {
                    let stats = stats.clone();

                    self.circuit = Circuit::Closed;
                    self.failures = 0;

                    ExitCircuitResult::Closed {
                        open_duration: stats.opened_duration(now),
                        stats,
                    }
                }
                ExecutionResult::Failure => {
                    stats.re_opened = stats.re_opened.saturating_add(1);
                    self.failures = self.failures.saturating_add(1);

                    let opened_at = match options.probe_failure_policy {
                        ProbeFailurePolicy::RestartBreak => now,
                        ProbeFailurePolicy::PreserveOpenedAt => *opened_at,
                    };

                    self.circuit = Circuit::Open {
                        opened_at,
                        stats: stats.clone(),
                    };

                    ExitCircuitResult::Reopened {
                        failure_count: self.failures,
                    }
                }
            },
            (Circuit::Open { stats, .. } | Circuit::HalfOpen { stats, .. }, _) => {
                // The circuit left the state the execution was admitted in. This happens when
                // another caller opened it between our enter and exit calls. Ignore the result.
                stats.stale_results = stats.stale_results.saturating_add(1);
                ExitCircuitResult::Unchanged
            }
            (Circuit::Closed, ExecutionMode::Probe) => ExitCircuitResult::Unchanged,
        }
    }

    fn abandon(&mut self, mode: ExecutionMode) -> bool {
        if mode != ExecutionMode::Probe {
            return false;
        }

        match &mut self.circuit {
            Circuit::HalfOpen {
                probe_in_flight, stats, ..
            } if *probe_in_flight => {
                *probe_in_flight = false;
                stats.probes_abandoned = stats.probes_abandoned.saturating_add(1);
                true
            }
            _ => false,
        }
    }
}

/// Statistics collected while the circuit is not closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Stats {
    pub first_opened_at: Instant,
    pub rejected: usize,
    pub probes: usize,
    pub re_opened: usize,
    pub probes_abandoned: usize,
    pub stale_results: usize,
}

impl Stats {
    pub fn new(first_opened_at: Instant) -> Self {
        Self {
            first_opened_at,
            rejected: 0,
            probes: 0,
            re_opened: 0,
            probes_abandoned: 0,
            stale_results: 0,
        }
    }

    pub fn opened_duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.first_opened_at)
    }
}
