// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[cfg(any(feature = "metrics", feature = "logs", test))]
use std::time::Duration;

#[cfg(any(feature = "metrics", feature = "logs", test))]
use super::Stats;
use super::{CircuitEngine, EnterCircuitResult, ExecutionMode, ExecutionResult, ExitCircuitResult, Snapshot};
#[cfg(any(feature = "metrics", feature = "logs", test))]
use crate::CircuitState;
use crate::telemetry::TelemetryHelper;
#[cfg(any(feature = "metrics", test))]
use crate::telemetry::{
    CIRCUIT_CLOSED_EVENT_NAME, CIRCUIT_OPENED_EVENT_NAME, CIRCUIT_PROBE_EVENT_NAME, CIRCUIT_PROBE_RESULT, CIRCUIT_REJECTED_EVENT_NAME,
    CIRCUIT_STATE, EVENT_NAME, STRATEGY_NAME,
};

/// Wrapper around a circuit engine to add telemetry capabilities.
#[derive(Debug)]
pub(crate) struct EngineTelemetry<T> {
    inner: T,
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    telemetry: TelemetryHelper,
}

impl<T> EngineTelemetry<T> {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub fn new(inner: T, telemetry: TelemetryHelper) -> Self {
        Self { inner, telemetry }
    }

    #[cfg(not(any(feature = "metrics", feature = "logs", test)))]
    pub fn new(inner: T, _telemetry: TelemetryHelper) -> Self {
        Self { inner }
    }
}

impl<T: CircuitEngine> CircuitEngine for EngineTelemetry<T> {
    fn enter(&self) -> EnterCircuitResult {
        let enter_result = self.inner.enter();

        #[cfg(any(feature = "metrics", feature = "logs", test))]
        if let EnterCircuitResult::Rejected { retry_after } = enter_result {
            self.report_rejected(retry_after);
        }

        enter_result
    }

    fn exit(&self, result: ExecutionResult, mode: ExecutionMode, generation: u64) -> ExitCircuitResult {
        #[cfg(any(feature = "metrics", feature = "logs", test))]
        if mode == ExecutionMode::Probe {
            self.report_probe(result);
        }

        let exit_result = self.inner.exit(result, mode, generation);

        #[cfg(any(feature = "metrics", feature = "logs", test))]
        self.report_exit(&exit_result);

        exit_result
    }

    fn abandon(&self, mode: ExecutionMode) -> bool {
        let released = self.inner.abandon(mode);

        #[cfg(any(feature = "metrics", feature = "logs", test))]
        if released {
            self.report_probe_abandoned();
        }

        released
    }

    fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }
}

#[cfg(any(feature = "metrics", feature = "logs", test))]
impl<T> EngineTelemetry<T> {
    fn report_rejected(&self, retry_after: Option<Duration>) {
        // Without a retry hint the rejection came from a probe that is still in flight.
        let state = if retry_after.is_some() {
            CircuitState::Open
        } else {
            CircuitState::HalfOpen
        };

        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            self.telemetry.report_metrics(&[
                opentelemetry::KeyValue::new(STRATEGY_NAME, self.telemetry.name.clone()),
                opentelemetry::KeyValue::new(EVENT_NAME, CIRCUIT_REJECTED_EVENT_NAME),
                opentelemetry::KeyValue::new(CIRCUIT_STATE, state.as_str()),
            ]);
        }

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.rejected",
                tracing::Level::WARN,
                circuit_breaker.name = %self.telemetry.name,
                circuit_breaker.state = state.as_str(),
                circuit_breaker.retry_after = ?retry_after,
            );
        }

        _ = (state, retry_after);
    }

    fn report_probe(&self, result: ExecutionResult) {
        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            self.telemetry.report_metrics(&[
                opentelemetry::KeyValue::new(STRATEGY_NAME, self.telemetry.name.clone()),
                opentelemetry::KeyValue::new(EVENT_NAME, CIRCUIT_PROBE_EVENT_NAME),
                opentelemetry::KeyValue::new(CIRCUIT_STATE, CircuitState::HalfOpen.as_str()),
                opentelemetry::KeyValue::new(CIRCUIT_PROBE_RESULT, result.as_str()),
            ]);
        }

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.probe",
                tracing::Level::INFO,
                circuit_breaker.name = %self.telemetry.name,
                circuit_breaker.state = CircuitState::HalfOpen.as_str(),
                circuit_breaker.probe.result = result.as_str(),
            );
        }

        _ = result;
    }

    fn report_exit(&self, exit_result: &ExitCircuitResult) {
        match exit_result {
            ExitCircuitResult::Opened { failure_count } => self.report_opened(*failure_count),
            ExitCircuitResult::Closed { open_duration, stats } => self.report_closed(*open_duration, stats),
            ExitCircuitResult::Reopened { .. } | ExitCircuitResult::Unchanged => {
                // A failed probe is already reported by the probe event, so reopening
                // the circuit does not emit its own event.
            }
        }
    }

    fn report_opened(&self, failure_count: u32) {
        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            self.telemetry.report_metrics(&[
                opentelemetry::KeyValue::new(STRATEGY_NAME, self.telemetry.name.clone()),
                opentelemetry::KeyValue::new(EVENT_NAME, CIRCUIT_OPENED_EVENT_NAME),
                opentelemetry::KeyValue::new(CIRCUIT_STATE, CircuitState::Open.as_str()),
            ]);
        }

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.opened",
                tracing::Level::WARN,
                circuit_breaker.name = %self.telemetry.name,
                circuit_breaker.state = CircuitState::Open.as_str(),
                circuit_breaker.failure_count = failure_count,
            );
        }

        _ = failure_count;
    }

    fn report_closed(&self, open_duration: Duration, stats: &Stats) {
        #[cfg(any(feature = "metrics", test))]
        if self.telemetry.metrics_enabled() {
            self.telemetry.report_metrics(&[
                opentelemetry::KeyValue::new(STRATEGY_NAME, self.telemetry.name.clone()),
                opentelemetry::KeyValue::new(EVENT_NAME, CIRCUIT_CLOSED_EVENT_NAME),
                opentelemetry::KeyValue::new(CIRCUIT_STATE, CircuitState::Closed.as_str()),
            ]);
        }

        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.closed",
                tracing::Level::INFO,
                circuit_breaker.name = %self.telemetry.name,
                circuit_breaker.state = CircuitState::Closed.as_str(),
                circuit_breaker.open.duration = open_duration.as_secs(),
                circuit_breaker.probes.total = stats.probes,
                circuit_breaker.probes.abandoned = stats.probes_abandoned,
                circuit_breaker.rejections = stats.rejected,
                circuit_breaker.re_opened = stats.re_opened,
                circuit_breaker.stale_results = stats.stale_results,
            );
        }

        _ = (open_duration, stats);
    }

    fn report_probe_abandoned(&self) {
        #[cfg(any(feature = "logs", test))]
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit_breaker.probe_abandoned",
                tracing::Level::WARN,
                circuit_breaker.name = %self.telemetry.name,
                circuit_breaker.state = CircuitState::HalfOpen.as_str(),
            );
        }
    }
}
