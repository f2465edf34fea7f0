// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use http::StatusCode;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, MetricData, ResourceMetrics, ScopeMetrics};
use opentelemetry_sdk::metrics::{InMemoryMetricExporter, SdkMeterProvider};
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

use crate::{Body, BoxTransport, Factory, Request, Response, boxed, transport_fn};

/// A `POST` request with a small body.
pub(crate) fn request() -> Request {
    http::Request::post("http://example.com/items?page=2")
        .header(http::header::HOST, "example.com")
        .body(Body::from("payload"))
        .expect("valid request")
}

pub(crate) fn response(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// A transport answering with `statuses` in order, repeating the last one.
///
/// Every call is counted and the request body is asserted to be intact.
pub(crate) fn status_sequence(statuses: impl Into<Vec<StatusCode>>) -> (BoxTransport, Arc<AtomicUsize>) {
    let statuses = Arc::new(statuses.into());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let transport = transport_fn(move |request: Request| {
        let index = counter.fetch_add(1, Ordering::SeqCst);
        let status = statuses.get(index).or_else(|| statuses.last()).copied().unwrap_or(StatusCode::OK);

        async move {
            let body = request.into_body().into_bytes().await.expect("readable body");
            assert_eq!(body, "payload");
            Ok(response(status))
        }
    });

    (boxed(transport), calls)
}

/// A factory numbering the instances it creates, starting at 1.
///
/// Each instance answers `200 OK` with its number in the `x-instance` header. The returned
/// counter holds the number of instances created so far.
pub(crate) fn numbered_factory() -> (Factory, Arc<AtomicUsize>) {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&created);

    let factory = Factory::new(move || {
        let instance = counter.fetch_add(1, Ordering::SeqCst) + 1;
        boxed(transport_fn(move |_| async move {
            let mut response = response(StatusCode::OK);
            response.headers_mut().insert("x-instance", instance.into());
            Ok(response)
        }))
    });

    (factory, created)
}

/// The instance number stamped by [`numbered_factory`].
pub(crate) fn instance_of(response: &Response) -> usize {
    response.headers()["x-instance"]
        .to_str()
        .expect("ascii header")
        .parse()
        .expect("numeric header")
}

/// Collects metrics reported through an in-memory exporter.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub(crate) fn new() -> Self {
        let exporter = InMemoryMetricExporter::default();

        Self {
            provider: SdkMeterProvider::builder().with_periodic_exporter(exporter.clone()).build(),
            exporter,
        }
    }

    pub(crate) fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Data points of every `u64` counter as `(attributes, value)` pairs.
    pub(crate) fn counters(&self) -> Vec<(Vec<KeyValue>, u64)> {
        self.provider.force_flush().expect("flush succeeds");

        // Exports are cumulative, so the latest one carries every total.
        let finished = self.exporter.get_finished_metrics().expect("metrics are available");

        finished
            .last()
            .into_iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .flat_map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => sum
                    .data_points()
                    .map(|point| (point.attributes().cloned().collect(), point.value()))
                    .collect::<Vec<_>>(),
                _ => Vec::new(),
            })
            .collect()
    }

    /// Asserts the total of all data points carrying `attributes` equals `expected`.
    pub(crate) fn assert_attributes(&self, attributes: &[KeyValue], expected: u64) {
        let counters = self.counters();
        let total: u64 = counters
            .iter()
            .filter(|(point, _)| attributes.iter().all(|attribute| point.contains(attribute)))
            .map(|(_, value)| value)
            .sum();

        assert_eq!(total, expected, "unexpected total for {attributes:?} in {counters:?}");
    }
}

/// Captures formatted `tracing` output in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub(crate) fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "log output does not contain '{expected}', got:\n{output}");
    }

    /// A subscriber writing into this buffer; install it with `set_default`.
    pub(crate) fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        use tracing_subscriber::layer::SubscriberExt;

        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.buffer))
    }
}

pub(crate) struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
