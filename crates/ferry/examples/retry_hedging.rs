// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retry over hedging: a slow first attempt is hedged by a fast one that fails with
//! `503 Service Unavailable`, after which the retry decorator sends the request again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ferry::hedging::Hedging;
use ferry::policy::{BackoffPolicy, RetryPolicy};
use ferry::retry::Retry;
use ferry::{Body, Layer, Request, RequestContext, Response, Service, TransportContext, TransportResult, transport_fn};
use http::StatusCode;
use tick::Clock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry().with(tracing_subscriber::fmt::layer()).init();

    let clock = Clock::new_tokio();
    let context = TransportContext::new(&clock).name("example").enable_logs();

    let transport = Retry::layer("retry", &context)
        .backoff(BackoffPolicy::exponential(Duration::from_millis(100)))
        .retry_policy(RetryPolicy::limited(
            3,
            [RetryPolicy::status_codes([StatusCode::SERVICE_UNAVAILABLE])],
        ))
        .layer(
            Hedging::layer("hedge", &context)
                .backoff(BackoffPolicy::fixed(Duration::from_millis(200)))
                .layer(transport_fn(flaky_backend)),
        );

    let mut request = Request::new(Body::from("hello"));
    RequestContext::with_timeout(&clock, Duration::from_secs(5)).attach(&mut request);

    println!("[main] sending request...");
    let start = std::time::Instant::now();

    match transport.execute(request).await {
        Ok(response) => println!("[main] status {} (took {:?})", response.status(), start.elapsed()),
        Err(error) => println!("[main] failed: {error} (took {:?})", start.elapsed()),
    }
}

/// The first call hangs for a second, the second answers 503 quickly and every later call
/// succeeds after 50ms.
async fn flaky_backend(_request: Request) -> TransportResult {
    let call = CALL_COUNT.fetch_add(1, Ordering::Relaxed);

    let (delay, status) = match call {
        0 => (Duration::from_secs(1), StatusCode::OK),
        1 => (Duration::from_millis(50), StatusCode::SERVICE_UNAVAILABLE),
        _ => (Duration::from_millis(50), StatusCode::OK),
    };

    println!("[backend] call {call}: {status} after {delay:?}");
    tokio::time::sleep(delay).await;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    Ok(response)
}
