// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use tick::Clock;

use crate::telemetry::TelemetryHelper;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Shared dependencies for the decorators of one transport stack.
///
/// Pass the same context to every layer of a stack so they share a clock and the
/// telemetry configuration.
///
/// # Examples
///
/// ```
/// use ferry::TransportContext;
/// use tick::Clock;
///
/// let context = TransportContext::new(Clock::new_frozen())
///     .name("billing_client")
///     .enable_logs();
/// # let _ = context;
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TransportContext {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
    logs_enabled: bool,
}

impl TransportContext {
    /// Creates a context with the given clock and the name `default`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
            logs_enabled: false,
        }
    }

    /// Sets the stack name reported in logs and metrics. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports resilience events as OpenTelemetry metrics.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::metrics::create_meter(provider)),
            ..self
        }
    }

    /// Emits resilience events as `tracing` events.
    #[must_use]
    pub fn enable_logs(self) -> Self {
        Self {
            logs_enabled: true,
            ..self
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn pipeline_name(&self) -> &Cow<'static, str> {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: Cow<'static, str>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name,
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::metrics::create_resilience_event_counter),
            logs_enabled: self.logs_enabled,
        }
    }
}

impl AsRef<Clock> for TransportContext {
    fn as_ref(&self) -> &Clock {
        &self.clock
    }
}
