// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use http::header::RETRY_AFTER;
use http::request::Parts;
use http::{HeaderValue, StatusCode};
use layered::Service;
use tick::Clock;

use super::{RetryAfterLayer, RetryAfterUnit};
use crate::policy::{BackoffArgs, BackoffPolicy, Backoffer};
use crate::telemetry::{RETRY_AFTER_EVENT, TelemetryHelper};
use crate::transport::send_attempt;
use crate::{Request, RequestReplayer, Transport, TransportContext, TransportResult};

/// Resends throttled requests after the wait the server asked for.
///
/// Configure it with [`RetryAfter::layer`]. See the [module documentation](crate::retry_after)
/// for the algorithm.
#[derive(Debug)]
pub struct RetryAfter<S> {
    pub(super) shared: Arc<RetryAfterShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryAfterShared {
    pub(crate) clock: Clock,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) header_unit: RetryAfterUnit,
    pub(crate) telemetry: TelemetryHelper,
}

impl<S: Clone> Clone for RetryAfter<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl RetryAfter<()> {
    /// Starts configuring a Retry-After decorator named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &TransportContext) -> RetryAfterLayer {
        RetryAfterLayer::new(name.into(), context)
    }
}

impl<S> Service<Request> for RetryAfter<S>
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
        let mut attempt = 0_u32;

        loop {
            let attempt_context = outer.child();
            let out = send_attempt(&self.inner, replayer.copy_with_context(attempt_context.clone()), clock).await;

            let Some(delay) = self.shared.throttle_delay(replayer.parts(), &out, backoffer.as_mut(), attempt) else {
                return out;
            };

            drop(out);
            attempt_context.cancel();

            if let Some(error) = outer.error(clock) {
                return Err(error);
            }

            self.shared.emit_telemetry(attempt, delay);
            outer.wait(clock, delay).await?;
            attempt = attempt.saturating_add(1);
        }
    }
}

impl RetryAfterShared {
    /// The wait before resending, or `None` when `out` must be returned to the caller.
    fn throttle_delay(
        &self,
        parts: &Parts,
        out: &TransportResult,
        backoffer: &mut dyn Backoffer,
        attempt: u32,
    ) -> Option<Duration> {
        let response = out.as_ref().ok().filter(|response| response.status() == StatusCode::TOO_MANY_REQUESTS)?;

        match response.headers().get(RETRY_AFTER) {
            None => Some(backoffer.backoff(BackoffArgs::new(parts, Some(out), attempt))),
            Some(value) => parse_retry_after(value).map(|value| self.header_unit.to_duration(value)),
        }
    }

    fn emit_telemetry(&self, attempt: u32, delay: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "ferry.retry_after",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt,
                resilience.retry.delay = delay.as_secs_f32(),
            );
        }

        self.telemetry.report_event(RETRY_AFTER_EVENT, Some(attempt));
    }
}

/// Accepts only a plain non-negative decimal integer, surrounding whitespace aside.
fn parse_retry_after(value: &HeaderValue) -> Option<u64> {
    let value = value.to_str().ok()?.trim();

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    value.parse().ok()
}
