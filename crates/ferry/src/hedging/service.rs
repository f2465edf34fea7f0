// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::pin::pin;
use std::sync::Arc;

use futures_util::future::{Either, select};
use futures_util::stream::{FuturesUnordered, StreamExt};
use layered::Service;
use tick::Clock;

use super::HedgingLayer;
use super::constants::MIN_HEDGE_INTERVAL;
use crate::policy::{BackoffArgs, BackoffPolicy};
use crate::telemetry::{HEDGE_EVENT, TelemetryHelper};
use crate::transport::send_attempt;
use crate::{
    NotSet, Request, RequestContext, RequestReplayer, Transport, TransportContext, TransportError, TransportResult,
};

/// Races paced copies of a request and returns the first outcome.
///
/// Configure it with [`Hedging::layer`]. See the [module documentation](crate::hedging) for the
/// algorithm.
#[derive(Debug)]
pub struct Hedging<S> {
    pub(super) shared: Arc<HedgingShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct HedgingShared {
    pub(crate) clock: Clock,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) telemetry: TelemetryHelper,
}

impl<S: Clone> Clone for Hedging<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Hedging<()> {
    /// Starts configuring a hedging decorator named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &TransportContext) -> HedgingLayer<NotSet> {
        HedgingLayer::new(name.into(), context)
    }
}

/// What ended one round of waiting.
enum Race {
    Completed(usize, TransportResult),
    Outer(TransportError),
    Interval,
}

impl<S> Service<Request> for Hedging<S>
where
    S: Transport,
{
    type Out = TransportResult;

    #[cfg_attr(test, mutants::skip)] // mutating the loop exit never terminates
    async fn execute(&self, request: Request) -> Self::Out {
        let replayer = RequestReplayer::new(request).await?;
        let outer = replayer.context();
        let clock = &self.shared.clock;
        let mut backoffer = self.shared.backoff.create();
        let mut contexts: Vec<RequestContext> = Vec::new();
        let mut in_flight = FuturesUnordered::new();
        let mut hedges = 0_u32;

        let (index, request) = self.attempt_request(&replayer, &outer, &mut contexts);
        in_flight.push(self.run_attempt(index, request));

        loop {
            let interval = backoffer
                .backoff(BackoffArgs::new(replayer.parts(), None, hedges))
                .max(MIN_HEDGE_INTERVAL);

            let race = {
                let next = pin!(in_flight.next());
                let done = pin!(outer.done(clock));
                let tick = pin!(clock.delay(interval));

                match select(next, select(done, tick)).await {
                    Either::Left((Some((index, out)), _)) => Race::Completed(index, out),
                    Either::Left((None, _)) | Either::Right((Either::Right(((), _)), _)) => Race::Interval,
                    Either::Right((Either::Left((error, _)), _)) => Race::Outer(error),
                }
            };

            match race {
                Race::Completed(winner, out) => {
                    contexts
                        .iter()
                        .enumerate()
                        .filter(|(index, _)| *index != winner)
                        .for_each(|(_, context)| context.cancel());
                    return out;
                }
                Race::Outer(error) => {
                    contexts.iter().for_each(RequestContext::cancel);
                    return Err(error);
                }
                Race::Interval => {
                    self.shared.emit_telemetry(hedges);
                    hedges = hedges.saturating_add(1);
                    let (index, request) = self.attempt_request(&replayer, &outer, &mut contexts);
                    in_flight.push(self.run_attempt(index, request));
                }
            }
        }
    }
}

impl<S> Hedging<S>
where
    S: Transport,
{
    /// Copies the buffered request under a new child context and records that context.
    fn attempt_request(
        &self,
        replayer: &RequestReplayer,
        outer: &RequestContext,
        contexts: &mut Vec<RequestContext>,
    ) -> (usize, Request) {
        let index = contexts.len();
        let context = outer.child();
        contexts.push(context.clone());
        (index, replayer.copy_with_context(context))
    }

    async fn run_attempt(&self, index: usize, request: Request) -> (usize, TransportResult) {
        (index, send_attempt(&self.inner, request, &self.shared.clock).await)
    }
}

impl HedgingShared {
    fn emit_telemetry(&self, hedge: u32) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "ferry.hedge",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = hedge,
            );
        }

        self.telemetry.report_event(HEDGE_EVENT, Some(hedge));
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use http::StatusCode;
    use layered::Layer;
    use opentelemetry::KeyValue;
    use parking_lot::Mutex;
    use tick::ClockControl;

    use super::*;
    use crate::testing::{LogCapture, MetricTester, request, response};
    use crate::{BoxTransport, ErrorKind, boxed, transport_fn};

    /// A transport whose first `slow` calls hang for an hour; it records every attempt context.
    fn slow_then_fast(clock: &Clock, slow: usize) -> (BoxTransport, Arc<Mutex<Vec<RequestContext>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let clock = clock.clone();
        let transport = transport_fn(move |request: Request| {
            let call = {
                let mut seen = recorder.lock();
                seen.push(RequestContext::of(&request));
                seen.len()
            };
            let clock = clock.clone();
            async move {
                if call <= slow {
                    clock.delay(Duration::from_secs(3600)).await;
                }
                let mut response = response(StatusCode::OK);
                response.headers_mut().insert("x-attempt", call.into());
                Ok(response)
            }
        });

        (boxed(transport), seen)
    }

    fn hedging(clock: &Clock, interval: Duration, base: BoxTransport) -> Hedging<BoxTransport> {
        Hedging::layer("hedging", &TransportContext::new(clock))
            .backoff(BackoffPolicy::fixed(interval))
            .layer(base)
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(Hedging<BoxTransport>: Send, Sync, Clone);
    }

    #[tokio::test]
    async fn fast_attempt_needs_no_hedge() {
        let clock = Clock::new_frozen();
        let (base, calls) = crate::testing::status_sequence([StatusCode::OK]);

        let response = hedging(&clock, Duration::from_millis(100), base).execute(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hedge_returns_first_completed_attempt() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let (base, seen) = slow_then_fast(&clock, 1);
        let transport = hedging(&clock, Duration::from_millis(100), base);
        let stopwatch = clock.stopwatch();

        let mut call = Box::pin(transport.execute(request()));
        assert!(futures::poll!(call.as_mut()).is_pending());
        assert_eq!(seen.lock().len(), 1);

        control.advance(Duration::from_millis(100));
        let response = call.await.unwrap();

        assert_eq!(response.headers()["x-attempt"], "2");
        assert_eq!(stopwatch.elapsed(), Duration::from_millis(100));
        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_cancelled(), "losing attempt is canceled");
        assert!(!seen[1].is_cancelled(), "winning attempt stays live");
    }

    #[tokio::test]
    async fn keeps_hedging_at_every_interval() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let (base, seen) = slow_then_fast(&clock, 3);
        let transport = hedging(&clock, Duration::from_millis(50), base);

        let mut call = Box::pin(transport.execute(request()));
        assert!(futures::poll!(call.as_mut()).is_pending());
        for _ in 0..2 {
            control.advance(Duration::from_millis(50));
            assert!(futures::poll!(call.as_mut()).is_pending());
        }
        assert_eq!(seen.lock().len(), 3);

        control.advance(Duration::from_millis(50));
        let response = call.await.unwrap();

        assert_eq!(response.headers()["x-attempt"], "4");
        assert_eq!(seen.lock().iter().filter(|context| context.is_cancelled()).count(), 3);
    }

    #[tokio::test]
    async fn first_error_wins() {
        let clock = Clock::new_frozen();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let base = transport_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TransportError::transport("refused")) }
        });

        let error = hedging(&clock, Duration::from_millis(10), boxed(base))
            .execute(request())
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Transport);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn outer_deadline_ends_the_race() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let (base, seen) = slow_then_fast(&clock, usize::MAX);
        let transport = hedging(&clock, Duration::from_millis(100), base);
        let mut request = request();
        RequestContext::with_timeout(&clock, Duration::from_millis(250)).attach(&mut request);

        let mut call = Box::pin(transport.execute(request));
        assert!(futures::poll!(call.as_mut()).is_pending());
        for _ in 0..2 {
            control.advance(Duration::from_millis(100));
            assert!(futures::poll!(call.as_mut()).is_pending());
        }

        control.advance(Duration::from_millis(50));

        assert_eq!(call.await.unwrap_err().kind(), ErrorKind::DeadlineExceeded);
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn outer_cancel_ends_the_race() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let (base, seen) = slow_then_fast(&clock, usize::MAX);
        let transport = hedging(&clock, Duration::from_secs(1), base);
        let outer = RequestContext::new();
        let mut request = request();
        outer.clone().attach(&mut request);

        let mut call = Box::pin(transport.execute(request));
        assert!(futures::poll!(call.as_mut()).is_pending());
        outer.cancel();

        assert_eq!(call.await.unwrap_err().kind(), ErrorKind::Canceled);
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn zero_interval_is_paced() {
        let control = ClockControl::new();
        let clock = control.to_clock();
        let (base, seen) = slow_then_fast(&clock, 1);
        let transport = hedging(&clock, Duration::ZERO, base);

        let mut call = Box::pin(transport.execute(request()));
        assert!(futures::poll!(call.as_mut()).is_pending());
        assert_eq!(seen.lock().len(), 1);

        control.advance(MIN_HEDGE_INTERVAL);

        assert_eq!(call.await.unwrap().headers()["x-attempt"], "2");
    }

    #[tokio::test]
    async fn body_failure_aborts_before_any_attempt() {
        let clock = Clock::new_frozen();
        let (base, calls) = crate::testing::status_sequence([StatusCode::OK]);
        let frames = futures::stream::iter(vec![Err::<http_body::Frame<bytes::Bytes>, _>(crate::BoxError::from("broken"))]);
        let request = Request::new(crate::Body::from_body(http_body_util::StreamBody::new(frames)));

        let error = hedging(&clock, Duration::from_millis(10), base).execute(request).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Body);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn emits_logs_and_metrics() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let tester = MetricTester::new();
        let control = ClockControl::new();
        let clock = control.to_clock();
        let context = TransportContext::new(&clock)
            .name("client")
            .enable_logs()
            .enable_metrics(tester.meter_provider());
        let (base, _seen) = slow_then_fast(&clock, 1);
        let transport = Hedging::layer("my_hedging", &context)
            .backoff(BackoffPolicy::fixed(Duration::from_millis(20)))
            .layer(base);

        let mut call = Box::pin(transport.execute(request()));
        assert!(futures::poll!(call.as_mut()).is_pending());
        control.advance(Duration::from_millis(20));
        call.await.unwrap();

        capture.assert_contains("ferry::hedging");
        capture.assert_contains("strategy.name=my_hedging");
        tester.assert_attributes(
            &[
                KeyValue::new("resilience.strategy.name", "my_hedging"),
                KeyValue::new("resilience.event.name", "hedge"),
            ],
            1,
        );
    }
}
