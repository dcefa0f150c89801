// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Telemetry plumbing shared by the circuit engine.
//!
//! Attribute keys follow the [OpenTelemetry naming guidelines](https://opentelemetry.io/docs/specs/semconv/general/naming/#general-naming-considerations):
//! dot-separated keys with short `snake_case` values.

#[cfg(any(feature = "metrics", test))]
use opentelemetry::InstrumentationScope;
#[cfg(any(feature = "metrics", test))]
use opentelemetry::KeyValue;
#[cfg(any(feature = "metrics", test))]
use opentelemetry::metrics::{Counter, Meter, MeterProvider};

/// Key used to annotate the name of the circuit breaker reporting the event.
#[cfg(any(feature = "metrics", test))]
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_STATE: &str = "resilience.circuit_breaker.state";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_PROBE_RESULT: &str = "resilience.circuit_breaker.probe.result";

#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_OPENED_EVENT_NAME: &str = "circuit_opened";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_CLOSED_EVENT_NAME: &str = "circuit_closed";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_REJECTED_EVENT_NAME: &str = "circuit_rejected";
#[cfg(any(feature = "metrics", test))]
pub(crate) const CIRCUIT_PROBE_EVENT_NAME: &str = "circuit_probe";

#[cfg(any(feature = "metrics", test))]
const METER_NAME: &str = "tripwire";
#[cfg(any(feature = "metrics", test))]
const VERSION: &str = "v0.1.0";
#[cfg(any(feature = "metrics", test))]
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";

#[cfg(any(feature = "metrics", test))]
pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

#[cfg(any(feature = "metrics", test))]
pub(crate) fn create_resilience_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("resilience.event")
        .with_description("Emitted upon the occurrence of a resilience event.")
        .with_unit("u64")
        .build()
}

/// Telemetry configuration carried by the engine decorator.
#[derive(Debug, Clone, Default)]
pub(crate) struct TelemetryHelper {
    #[cfg(any(feature = "metrics", feature = "logs", test))]
    pub(crate) name: std::borrow::Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<Counter<u64>>,
    #[cfg(any(feature = "logs", test))]
    pub(crate) logs_enabled: bool,
}

#[cfg(any(feature = "metrics", test))]
impl TelemetryHelper {
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    pub(crate) fn report_metrics(&self, attributes: &[KeyValue]) {
        if let Some(reporter) = &self.event_reporter {
            reporter.add(1, attributes);
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};

    use super::*;

    #[test]
    fn assert_definitions() {
        let exporter = InMemoryMetricExporter::default();
        let meter_provider = SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build();

        let meter = create_meter(&meter_provider);
        let resilience_events = create_resilience_event_counter(&meter);
        resilience_events.add(1, &[]);

        meter_provider.force_flush().unwrap();

        let metrics = exporter.get_finished_metrics().unwrap();
        let str = format!("{metrics:?}");

        assert!(str.contains("resilience.event"));
        assert!(str.contains("tripwire"));
        assert!(str.contains("v0.1.0"));
        assert!(str.contains("https://opentelemetry.io/schemas/1.47"));
    }

    #[test]
    fn metrics_disabled_without_reporter() {
        let telemetry = TelemetryHelper::default();

        assert!(!telemetry.metrics_enabled());
        telemetry.report_metrics(&[KeyValue::new(EVENT_NAME, CIRCUIT_OPENED_EVENT_NAME)]);
    }

    #[test]
    fn attribute_keys_are_expected() {
        assert_eq!(STRATEGY_NAME, "resilience.strategy.name");
        assert_eq!(EVENT_NAME, "resilience.event.name");
        assert_eq!(CIRCUIT_STATE, "resilience.circuit_breaker.state");
        assert_eq!(CIRCUIT_PROBE_RESULT, "resilience.circuit_breaker.probe.result");
    }
}
