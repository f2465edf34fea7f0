// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::RetryAfter;
use super::constants::{DEFAULT_BACKOFF_SEED, DEFAULT_HEADER_UNIT};
use super::service::RetryAfterShared;
use crate::policy::BackoffPolicy;
use crate::telemetry::TelemetryHelper;
use crate::{Layer, TransportContext};

/// Unit of the integer carried by the `Retry-After` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum RetryAfterUnit {
    /// Whole seconds, as defined by HTTP.
    #[default]
    Seconds,
    /// Milliseconds, used by some services instead of seconds.
    Milliseconds,
}

impl RetryAfterUnit {
    pub(crate) fn to_duration(self, value: u64) -> Duration {
        match self {
            Self::Seconds => Duration::from_secs(value),
            Self::Milliseconds => Duration::from_millis(value),
        }
    }
}

/// Builder for the [`RetryAfter`] decorator.
#[derive(Debug)]
pub struct RetryAfterLayer {
    clock: Clock,
    telemetry: TelemetryHelper,
    backoff: BackoffPolicy,
    header_unit: RetryAfterUnit,
}

impl RetryAfterLayer {
    pub(crate) fn new(name: Cow<'static, str>, context: &TransportContext) -> Self {
        Self {
            clock: context.clock().clone(),
            telemetry: context.create_telemetry(name),
            backoff: BackoffPolicy::exponential(DEFAULT_BACKOFF_SEED),
            header_unit: DEFAULT_HEADER_UNIT,
        }
    }

    /// Sets the policy used when a 429 response has no `Retry-After` header.
    ///
    /// **Default**: exponential backoff starting at 20 ms.
    #[must_use]
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = policy;
        self
    }

    /// Sets how the `Retry-After` integer is interpreted.
    ///
    /// **Default**: [`RetryAfterUnit::Seconds`].
    #[must_use]
    pub fn header_unit(mut self, unit: RetryAfterUnit) -> Self {
        self.header_unit = unit;
        self
    }
}

impl<S> Layer<S> for RetryAfterLayer {
    type Service = RetryAfter<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryAfter {
            shared: Arc::new(RetryAfterShared {
                clock: self.clock.clone(),
                backoff: self.backoff.clone(),
                header_unit: self.header_unit,
                telemetry: self.telemetry.clone(),
            }),
            inner,
        }
    }
}
