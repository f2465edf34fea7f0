// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use tick::Clock;

use super::Hedging;
use super::service::HedgingShared;
use crate::policy::BackoffPolicy;
use crate::telemetry::TelemetryHelper;
use crate::{Layer, NotSet, TransportContext};

/// Builder for the [`Hedging`] decorator.
///
/// The pacing policy is required: call [`backoff`](HedgingLayer::backoff) before building.
#[derive(Debug)]
pub struct HedgingLayer<Backoff = BackoffPolicy> {
    clock: Clock,
    telemetry: TelemetryHelper,
    backoff: Backoff,
}

impl HedgingLayer<NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &TransportContext) -> Self {
        Self {
            clock: context.clock().clone(),
            telemetry: context.create_telemetry(name),
            backoff: NotSet,
        }
    }
}

impl<Backoff> HedgingLayer<Backoff> {
    /// Sets the policy pacing extra attempts.
    ///
    /// The backoffer is asked for the next interval before every wait, without an outcome.
    #[must_use]
    pub fn backoff(self, policy: BackoffPolicy) -> HedgingLayer<BackoffPolicy> {
        HedgingLayer {
            clock: self.clock,
            telemetry: self.telemetry,
            backoff: policy,
        }
    }
}

impl<S> Layer<S> for HedgingLayer<BackoffPolicy> {
    type Service = Hedging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Hedging {
            shared: Arc::new(HedgingShared {
                clock: self.clock.clone(),
                backoff: self.backoff.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner,
        }
    }
}
