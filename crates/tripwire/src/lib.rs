// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A consecutive-failure circuit breaker for guarding calls to unreliable dependencies.
//!
//! A [`CircuitBreaker`] sits in front of one logical dependency, such as a downstream
//! service or a database. It counts consecutive failed calls, and once the count reaches a
//! threshold it stops sending calls for a while. This keeps a failing dependency from
//! dragging its callers down with it.
//!
//! # States
//!
//! - [`Closed`][CircuitState::Closed]: calls pass through. Each failure increments the
//!   failure count and each success resets it to zero.
//! - [`Open`][CircuitState::Open]: calls are rejected with [`Error::Open`] without running
//!   the operation, until the reset timeout has elapsed.
//! - [`HalfOpen`][CircuitState::HalfOpen]: the first call after the reset timeout runs as a
//!   probe. Success closes the circuit; failure opens it again. Other callers are rejected
//!   while the probe is in flight.
//!
//! Time is read from a [`tick::Clock`] whenever a call arrives. There is no background
//! timer, so tests can drive the breaker deterministically with `tick::ClockControl`.
//!
//! # Examples
//!
//! ```
//! # use std::time::Duration;
//! # use tick::Clock;
//! use tripwire::{CircuitBreaker, Error};
//!
//! # fn example(clock: &Clock) -> Result<(), tripwire::ConfigError> {
//! let breaker = CircuitBreaker::builder(clock)
//!     .name("inventory")
//!     .failure_threshold(3)
//!     .reset_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let result = breaker.execute(|| check_inventory("sku-42"));
//!
//! match result {
//!     Ok(count) => println!("{count} items in stock"),
//!     Err(Error::Open(_)) => println!("inventory is unavailable, using cached value"),
//!     Err(Error::Operation(error)) => println!("inventory call failed: {error}"),
//! }
//! # Ok(())
//! # }
//! # fn check_inventory(_sku: &str) -> Result<u32, std::io::Error> { Ok(1) }
//! ```
//!
//! Async operations go through [`CircuitBreaker::execute_async`]. The breaker never imposes
//! a timeout of its own; wrap the operation in one and map the timeout into the operation's
//! error type so it counts as a failure.
//!
//! # Features
//!
//! - `logs`: structured logging of circuit events through `tracing`.
//! - `metrics`: OpenTelemetry metrics through the `resilience.event` counter.
//! - `serde`: `Serialize`/`Deserialize` for [`BreakerOptions`].
//! - `tower-service`: [`CircuitBreakerLayer`] and [`CircuitBreakerService`] for `tower` stacks.

mod args;
mod breaker;
mod builder;
mod callbacks;
mod constants;
mod engine;
mod error;
mod options;
mod state;
mod telemetry;

#[cfg(any(feature = "tower-service", test))]
mod service;

#[cfg(test)]
mod testing;

pub use args::{OnClosedArgs, OnOpenedArgs, OnProbingArgs};
pub use breaker::CircuitBreaker;
pub use builder::CircuitBreakerBuilder;
pub use error::{CircuitOpenError, ConfigError, Error};
pub use options::{BreakerOptions, ProbeFailurePolicy};
#[cfg(any(feature = "tower-service", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "tower-service")))]
pub use service::{CircuitBreakerLayer, CircuitBreakerService, ResponseFuture};
pub use state::CircuitState;
