// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests of decorator stacks using only the public API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ferry::chain::{Chain, Decorator};
use ferry::header::Header;
use ferry::hedging::Hedging;
use ferry::policy::{BackoffPolicy, RetryPolicy};
use ferry::retry::Retry;
use ferry::retry_after::{RetryAfter, RetryAfterUnit};
use ferry::{Body, Request, RequestContext, Response, Service, TransportContext, TransportError, boxed, transport_fn};
use http::header::RETRY_AFTER;
use http::{HeaderName, HeaderValue, StatusCode};
use tick::{Clock, ClockControl};

fn request() -> Request {
    http::Request::put("https://example.com/orders/17")
        .body(Body::from("{\"quantity\":3}"))
        .unwrap()
}

fn status(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

#[tokio::test]
async fn throttling_and_errors_are_handled_by_their_decorators() {
    let clock = ClockControl::new().auto_advance_timers(true).to_clock();
    let context = TransportContext::new(&clock).name("orders");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let base = transport_fn(move |request: Request| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            assert_eq!(request.headers()["x-client"], "ferry-tests");
            assert_eq!(request.into_body().into_bytes().await.unwrap(), "{\"quantity\":3}");
            match call {
                0 => {
                    let mut response = status(StatusCode::TOO_MANY_REQUESTS);
                    response.headers_mut().insert(RETRY_AFTER, HeaderValue::from_static("250"));
                    Ok(response)
                }
                1 => Ok(status(StatusCode::SERVICE_UNAVAILABLE)),
                _ => Ok(status(StatusCode::OK)),
            }
        }
    });

    let chain = Chain::new()
        .push(Decorator::from_layer(
            Retry::layer("retry", &context)
                .backoff(BackoffPolicy::fixed(Duration::from_millis(100)))
                .retry_policy(RetryPolicy::limited(
                    2,
                    [RetryPolicy::status_codes([StatusCode::SERVICE_UNAVAILABLE])],
                )),
        ))
        .push(Decorator::from_layer(
            RetryAfter::layer("throttling", &context).header_unit(RetryAfterUnit::Milliseconds),
        ))
        .push(Decorator::from_layer(Header::layer(|_: &Request| {
            (HeaderName::from_static("x-client"), HeaderValue::from_static("ferry-tests"))
        })));
    let transport = chain.apply(boxed(base));
    let stopwatch = clock.stopwatch();

    let response = transport.execute(request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(stopwatch.elapsed(), Duration::from_millis(350));
}

#[tokio::test]
async fn hedging_under_retry_shares_one_deadline() {
    let control = ClockControl::new();
    let clock = control.to_clock();
    let context = TransportContext::new(&clock);
    let hanging_clock = clock.clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let base = transport_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        let clock = hanging_clock.clone();
        async move {
            clock.delay(Duration::from_secs(3600)).await;
            Ok(status(StatusCode::OK))
        }
    });
    let transport = Chain::new()
        .push(Decorator::from_layer(
            Retry::layer("retry", &context)
                .backoff(BackoffPolicy::fixed(Duration::ZERO))
                .retry_policy(RetryPolicy::limited(5, [RetryPolicy::timeout(&clock, Duration::from_secs(10))])),
        ))
        .push(Decorator::from_layer(
            Hedging::layer("hedging", &context).backoff(BackoffPolicy::fixed(Duration::from_secs(4))),
        ))
        .apply(boxed(base));
    let mut request = request();
    RequestContext::with_timeout(&clock, Duration::from_secs(6)).attach(&mut request);

    let mut call = Box::pin(transport.execute(request));
    assert!(futures::poll!(call.as_mut()).is_pending());
    control.advance(Duration::from_secs(4));
    assert!(futures::poll!(call.as_mut()).is_pending());
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    control.advance(Duration::from_secs(2));

    let error = call.await.unwrap_err();
    assert_eq!(error.kind(), ferry::ErrorKind::DeadlineExceeded);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_callers_share_a_stack() {
    let clock = Clock::new_frozen();
    let context = TransportContext::new(&clock);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let base = transport_fn(move |_| {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if call % 2 == 0 {
                Err(TransportError::transport("connection reset"))
            } else {
                Ok(status(StatusCode::OK))
            }
        }
    });
    let transport = Chain::new()
        .push(Decorator::from_layer(
            Retry::layer("retry", &context)
                .backoff(BackoffPolicy::fixed(Duration::ZERO))
                .retry_policy(RetryPolicy::new(|| Box::new(RetryTransportErrors))),
        ))
        .apply(boxed(base));

    let results = futures::future::join_all((0..16).map(|_| transport.execute(request()))).await;

    assert!(results.iter().all(|result| matches!(result, Ok(response) if response.status() == StatusCode::OK)));
    assert_eq!(calls.load(Ordering::SeqCst), 32);
}

struct RetryTransportErrors;

impl ferry::policy::Retrier for RetryTransportErrors {
    fn retry(&mut self, args: ferry::policy::RetryArgs<'_>) -> bool {
        args.outcome().is_err()
    }
}
