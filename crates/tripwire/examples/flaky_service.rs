// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Guards a flaky dependency with a circuit breaker.
//!
//! The simulated service fails most calls during an outage and recovers after a while.
//! Watch the circuit open after three consecutive failures, reject calls for two seconds,
//! and let a single probe through to check whether the service is back.

use std::time::Duration;

use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tripwire::{CircuitBreaker, Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let clock = Clock::new_tokio();

    let breaker = CircuitBreaker::builder(&clock)
        .name("flaky_service")
        .failure_threshold(3)
        .reset_timeout(Duration::from_secs(2))
        .on_opened(|args| println!("circuit opened after {} consecutive failures", args.failure_count()))
        .on_probing(|_| println!("probing to see if the service has recovered"))
        .on_closed(|args| println!("circuit closed, was open for {}ms", args.open_duration().as_millis()))
        .enable_logs()
        .build()?;

    // Increase the number of attempts to see the circuit close once the outage is over.
    for attempt in 0..60 {
        clock.delay(Duration::from_millis(100)).await;

        match breaker.execute_async(|| call_service(attempt)).await {
            Ok(output) => println!("{attempt}: {output}"),
            Err(Error::Open(rejected)) => println!("{attempt}: {rejected}"),
            Err(Error::Operation(error)) => println!("{attempt}: {error}"),
        }
    }

    Ok(())
}

// During the outage roughly 70% of calls fail.
async fn call_service(attempt: u32) -> Result<String, String> {
    if attempt > 40 || fastrand::u8(0..10) > 6 {
        Ok(format!("response-{attempt}"))
    } else {
        Err(format!("service unavailable for request {attempt}"))
    }
}
