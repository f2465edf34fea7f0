// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use layered::Service;
use tick::Clock;

use super::RetryLayer;
use crate::policy::{BackoffArgs, BackoffPolicy, Backoffer, RetryArgs, RetryPolicy, Retrier};
use crate::telemetry::{RETRY_EVENT, TelemetryHelper};
use crate::transport::send_attempt;
use crate::{NotSet, Request, RequestReplayer, Transport, TransportContext, TransportResult};

/// Retries requests according to pluggable retry and backoff policies.
///
/// Configure it with [`Retry::layer`]. See the [module documentation](crate::retry) for the
/// algorithm.
#[derive(Debug)]
pub struct Retry<S> {
    pub(super) shared: Arc<RetryShared>,
    pub(super) inner: S,
}

#[derive(Debug)]
pub(crate) struct RetryShared {
    pub(crate) clock: Clock,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) retry_policies: Vec<RetryPolicy>,
    pub(crate) telemetry: TelemetryHelper,
}

impl<S: Clone> Clone for Retry<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Retry<()> {
    /// Starts configuring a retry decorator named `name`.
    pub fn layer(name: impl Into<Cow<'static, str>>, context: &TransportContext) -> RetryLayer<NotSet> {
        RetryLayer::new(name.into(), context)
    }
}

/// Per-request policy instances.
struct Policies {
    retriers: Vec<Box<dyn Retrier>>,
    backoffer: Box<dyn Backoffer>,
}

impl<S> Service<Request> for Retry<S>
where
    S: Transport,
{
    type Out = TransportResult;

    #[cfg_attr(test, mutants::skip)] // mutating the loop exit never terminates
    async fn execute(&self, request: Request) -> Self::Out {
        let replayer = RequestReplayer::new(request).await?;
        let outer = replayer.context();
        let clock = &self.shared.clock;
        let mut policies = self.shared.create_policies();
        let mut attempt = 0_u32;

        loop {
            let attempt_context = outer.child();
            let request = policies.prepare(replayer.copy_with_context(attempt_context.clone()));

            let out = send_attempt(&self.inner, request, clock).await;

            let Some(delay) = policies.evaluate(&replayer, &out, attempt) else {
                return out;
            };

            // Discard the outcome and release anything still tied to the attempt.
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

impl RetryShared {
    fn create_policies(&self) -> Policies {
        Policies {
            retriers: self.retry_policies.iter().map(RetryPolicy::create).collect(),
            backoffer: self.backoff.create(),
        }
    }

    fn emit_telemetry(&self, attempt: u32, delay: Duration) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "ferry.retry",
                tracing::Level::WARN,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                resilience.attempt.index = attempt,
                resilience.retry.delay = delay.as_secs_f32(),
            );
        }

        self.telemetry.report_event(RETRY_EVENT, Some(attempt));
    }
}

impl Policies {
    fn prepare(&mut self, request: Request) -> Request {
        self.retriers.iter_mut().fold(request, |request, retrier| match retrier.as_requester() {
            Some(requester) => requester.request(request),
            None => request,
        })
    }

    /// Returns the wait before the next attempt, or `None` when no retrier asks for one.
    fn evaluate(&mut self, replayer: &RequestReplayer, out: &TransportResult, attempt: u32) -> Option<Duration> {
        let parts = replayer.parts();
        let retry = self
            .retriers
            .iter_mut()
            .any(|retrier| retrier.retry(RetryArgs::new(parts, out, attempt)));

        retry.then(|| self.backoffer.backoff(BackoffArgs::new(parts, Some(out), attempt)))
    }
}
