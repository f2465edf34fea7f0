// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::sync::Arc;

use tick::Clock;

use super::Retry;
use super::service::RetryShared;
use crate::policy::{BackoffPolicy, RetryPolicy};
use crate::telemetry::TelemetryHelper;
use crate::{Layer, NotSet, TransportContext};

/// Builder for the [`Retry`] decorator.
///
/// Created by [`Retry::layer`]. A backoff policy is required; the layer becomes usable once
/// [`backoff`](RetryLayer::backoff) has been called.
#[derive(Debug)]
pub struct RetryLayer<Backoff = BackoffPolicy> {
    clock: Clock,
    telemetry: TelemetryHelper,
    backoff: Backoff,
    retry_policies: Vec<RetryPolicy>,
}

impl RetryLayer<NotSet> {
    pub(crate) fn new(name: Cow<'static, str>, context: &TransportContext) -> Self {
        Self {
            clock: context.clock().clone(),
            telemetry: context.create_telemetry(name),
            backoff: NotSet,
            retry_policies: Vec::new(),
        }
    }
}

impl<Backoff> RetryLayer<Backoff> {
    /// Sets the policy computing the wait between attempts.
    #[must_use]
    pub fn backoff(self, policy: BackoffPolicy) -> RetryLayer<BackoffPolicy> {
        RetryLayer {
            clock: self.clock,
            telemetry: self.telemetry,
            backoff: policy,
            retry_policies: self.retry_policies,
        }
    }

    /// Adds a retry policy.
    ///
    /// Policies are consulted in the order they were added. Without any policy the decorator
    /// sends every request exactly once.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policies.push(policy);
        self
    }

    /// Adds several retry policies.
    #[must_use]
    pub fn retry_policies(mut self, policies: impl IntoIterator<Item = RetryPolicy>) -> Self {
        self.retry_policies.extend(policies);
        self
    }
}

impl<S> Layer<S> for RetryLayer<BackoffPolicy> {
    type Service = Retry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Retry {
            shared: Arc::new(RetryShared {
                clock: self.clock.clone(),
                backoff: self.backoff.clone(),
                retry_policies: self.retry_policies.clone(),
                telemetry: self.telemetry.clone(),
            }),
            inner,
        }
    }
}
