// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Key for the name of the transport stack.
#[cfg(any(feature = "metrics", test))]
pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key for the name of the decorator within the stack.
#[cfg(any(feature = "metrics", test))]
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key for the kind of event, e.g. `retry` or `hedge`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Key for the zero-based index of the attempt that triggered the event.
#[cfg(any(feature = "metrics", test))]
pub(crate) const ATTEMPT_INDEX: &str = "resilience.attempt.index";

pub(crate) const RETRY_EVENT: &str = "retry";
pub(crate) const RETRY_AFTER_EVENT: &str = "retry_after";
pub(crate) const HEDGE_EVENT: &str = "hedge";
pub(crate) const RECYCLE_EVENT: &str = "recycle";

/// Per-decorator telemetry configuration derived from a [`TransportContext`](crate::TransportContext).
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn report(&self, attributes: &[opentelemetry::KeyValue]) {
        if let Some(reporter) = &self.event_reporter {
            reporter.add(1, attributes);
        }
    }

    /// Counts one occurrence of `event`, tagged with this decorator's names.
    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "no-op without the metrics feature")
    )]
    pub(crate) fn report_event(&self, event: &'static str, attempt: Option<u32>) {
        #[cfg(any(feature = "metrics", test))]
        if self.metrics_enabled() {
            use opentelemetry::KeyValue;

            let mut attributes = vec![
                KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()),
                KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()),
                KeyValue::new(EVENT_NAME, event),
            ];

            if let Some(attempt) = attempt {
                attributes.push(KeyValue::new(ATTEMPT_INDEX, i64::from(attempt)));
            }

            self.report(&attributes);
        }
    }
}
