// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured access logging.
//!
//! [`AccessLog`] emits one `tracing` event named `ferry.access` at `INFO` level per request,
//! once the response or the error is known. Failed requests are logged with the status of
//! [`error_to_status_code`](crate::error_to_status_code).
//!
//! | Field | Source |
//! |---|---|
//! | `host`, `port`, `scheme`, `uri_path`, `uri_query` | request URI |
//! | `site` | `Host` header, or the URI authority |
//! | `http_method` | request method |
//! | `http_request_content_type`, `http_referrer`, `http_user_agent` | request headers |
//! | `http_content_type` | response `Content-Type` header |
//! | `status` | response status |
//! | `duration` | time to the response, in milliseconds |

use std::borrow::Cow;
use std::sync::Arc;

use http::HeaderMap;
use http::header::{CONTENT_TYPE, HOST, REFERER, USER_AGENT};
use layered::Service;
use tick::Clock;

use crate::{Layer, Request, Transport, TransportContext, TransportResult, error_to_status_code};

/// Logs every request passing through.
///
/// # Examples
///
/// ```
/// use ferry::access_log::AccessLog;
/// use ferry::{Body, Layer, Response, TransportContext, transport_fn};
/// use tick::Clock;
///
/// let context = TransportContext::new(Clock::new_frozen()).name("billing");
/// let transport = AccessLog::layer(&context).layer(transport_fn(|_| async { Ok(Response::new(Body::empty())) }));
/// # let _ = transport;
/// ```
#[derive(Debug)]
pub struct AccessLog<S> {
    shared: Arc<AccessLogShared>,
    inner: S,
}

#[derive(Debug)]
struct AccessLogShared {
    clock: Clock,
    pipeline_name: Cow<'static, str>,
}

impl<S: Clone> Clone for AccessLog<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl AccessLog<()> {
    /// Creates an access log layer timing requests with the context's clock.
    #[must_use]
    pub fn layer(context: &TransportContext) -> AccessLogLayer {
        AccessLogLayer {
            clock: context.clock().clone(),
            pipeline_name: context.pipeline_name().clone(),
        }
    }
}

/// Builder for the [`AccessLog`] decorator.
#[derive(Debug, Clone)]
pub struct AccessLogLayer {
    clock: Clock,
    pipeline_name: Cow<'static, str>,
}

impl<S> Layer<S> for AccessLogLayer {
    type Service = AccessLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AccessLog {
            shared: Arc::new(AccessLogShared {
                clock: self.clock.clone(),
                pipeline_name: self.pipeline_name.clone(),
            }),
            inner,
        }
    }
}

/// Request attributes captured before the request is handed over.
#[derive(Debug)]
struct RequestRecord {
    host: String,
    port: u16,
    site: String,
    content_type: String,
    method: String,
    referrer: String,
    user_agent: String,
    path: String,
    query: String,
    scheme: String,
}

impl RequestRecord {
    fn capture(request: &Request) -> Self {
        let uri = request.uri();
        let headers = request.headers();
        let host = uri.host().unwrap_or_default().to_owned();

        Self {
            port: uri.port_u16().unwrap_or_default(),
            site: headers
                .get(HOST)
                .and_then(|value| value.to_str().ok())
                .map_or_else(|| uri.authority().map(ToString::to_string).unwrap_or_default(), str::to_owned),
            content_type: header_text(headers, CONTENT_TYPE),
            method: request.method().to_string(),
            referrer: header_text(headers, REFERER),
            user_agent: header_text(headers, USER_AGENT),
            path: uri.path().to_owned(),
            query: uri.query().unwrap_or_default().to_owned(),
            scheme: uri.scheme_str().unwrap_or_default().to_owned(),
            host,
        }
    }
}

fn header_text(headers: &HeaderMap, name: http::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

impl<S> Service<Request> for AccessLog<S>
where
    S: Transport,
{
    type Out = TransportResult;

    async fn execute(&self, request: Request) -> Self::Out {
        let record = RequestRecord::capture(&request);
        let stopwatch = self.shared.clock.stopwatch();

        let out = self.inner.execute(request).await;

        let duration = u64::try_from(stopwatch.elapsed().as_millis()).unwrap_or(u64::MAX);
        let (status, content_type) = match &out {
            Ok(response) => (response.status(), header_text(response.headers(), CONTENT_TYPE)),
            Err(error) => (error_to_status_code(error), String::new()),
        };

        tracing::event!(
            name: "ferry.access",
            tracing::Level::INFO,
            pipeline.name = %self.shared.pipeline_name,
            host = %record.host,
            port = record.port,
            site = %record.site,
            http_request_content_type = %record.content_type,
            http_method = %record.method,
            http_referrer = %record.referrer,
            http_user_agent = %record.user_agent,
            uri_path = %record.path,
            uri_query = %record.query,
            scheme = %record.scheme,
            duration,
            http_content_type = %content_type,
            status = status.as_u16(),
            "access"
        );

        out
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::StatusCode;
    use tick::ClockControl;

    use super::*;
    use crate::testing::{LogCapture, request, response};
    use crate::{BoxTransport, TransportError, transport_fn};

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(AccessLog<BoxTransport>: Send, Sync, Clone);
    }

    #[test]
    fn captures_request_attributes() {
        let request = http::Request::get("https://api.example.com:8443/v1/orders?id=7&sort=asc")
            .header(CONTENT_TYPE, "application/json")
            .header(REFERER, "https://portal.example.com/")
            .header(USER_AGENT, "ferry-test/1.0")
            .body(crate::Body::empty())
            .unwrap();

        let record = RequestRecord::capture(&request);

        assert_eq!(record.host, "api.example.com");
        assert_eq!(record.port, 8443);
        assert_eq!(record.site, "api.example.com:8443");
        assert_eq!(record.content_type, "application/json");
        assert_eq!(record.method, "GET");
        assert_eq!(record.referrer, "https://portal.example.com/");
        assert_eq!(record.user_agent, "ferry-test/1.0");
        assert_eq!(record.path, "/v1/orders");
        assert_eq!(record.query, "id=7&sort=asc");
        assert_eq!(record.scheme, "https");
    }

    #[test]
    fn missing_attributes_are_empty() {
        let request = http::Request::get("/health").body(crate::Body::empty()).unwrap();

        let record = RequestRecord::capture(&request);

        assert_eq!(record.host, "");
        assert_eq!(record.port, 0);
        assert_eq!(record.site, "");
        assert_eq!(record.scheme, "");
        assert_eq!(record.query, "");
        assert_eq!(record.path, "/health");
    }

    #[tokio::test]
    async fn logs_successful_requests() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let clock = ClockControl::new().auto_advance_timers(true).to_clock();
        let delay_clock = clock.clone();
        let base = transport_fn(move |_| {
            let clock = delay_clock.clone();
            async move {
                clock.delay(Duration::from_millis(1500)).await;
                let mut response = response(StatusCode::CREATED);
                response
                    .headers_mut()
                    .insert(CONTENT_TYPE, http::HeaderValue::from_static("text/plain"));
                Ok(response)
            }
        });
        let context = TransportContext::new(&clock).name("billing");

        AccessLog::layer(&context).layer(base).execute(request()).await.unwrap();

        capture.assert_contains("ferry::access_log");
        capture.assert_contains("access");
        capture.assert_contains("pipeline.name=billing");
        capture.assert_contains("host=example.com");
        capture.assert_contains("site=example.com");
        capture.assert_contains("http_method=POST");
        capture.assert_contains("uri_path=/items");
        capture.assert_contains("uri_query=page=2");
        capture.assert_contains("scheme=http");
        capture.assert_contains("duration=1500");
        capture.assert_contains("http_content_type=text/plain");
        capture.assert_contains("status=201");
    }

    #[tokio::test]
    async fn logs_gateway_status_for_errors() {
        let capture = LogCapture::default();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let context = TransportContext::new(Clock::new_frozen());
        let refused = transport_fn(|_| async { Err(TransportError::transport("refused")) });
        let timed_out = transport_fn(|_| async { Err(TransportError::deadline_exceeded()) });

        let refused_error = AccessLog::layer(&context).layer(refused).execute(request()).await.unwrap_err();
        let timed_out_error = AccessLog::layer(&context).layer(timed_out).execute(request()).await.unwrap_err();

        assert_eq!(refused_error.kind(), crate::ErrorKind::Transport);
        assert_eq!(timed_out_error.kind(), crate::ErrorKind::DeadlineExceeded);
        capture.assert_contains("status=502");
        capture.assert_contains("status=504");
    }
}
