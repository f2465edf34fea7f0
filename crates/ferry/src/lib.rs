// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Composable resilience decorators for HTTP transports.
//!
//! A transport is any [`Service`] turning a [`Request`] into a [`TransportResult`]. This crate
//! provides decorators that wrap a transport into another transport with added behavior:
//!
//! - [`retry`]: resends a request while pluggable [`policy`] objects ask for it.
//! - [`retry_after`]: honors `429 Too Many Requests` and its `Retry-After` header.
//! - [`hedging`]: races paced copies of a request and returns the first outcome.
//! - [`pool`]: recycles or rotates transport instances produced by a [`Factory`].
//! - [`header`] and [`access_log`]: request and response annotation, structured logging.
//!
//! Decorators compose statically through [`Layer`] or dynamically through a
//! [`Chain`](chain::Chain).
//!
//! # Requests, bodies and cancellation
//!
//! Decorators that send a request more than once buffer it first with a [`RequestReplayer`],
//! so the body stream of the original request is read exactly once. A failure to read it is
//! reported as a [`TransportError`] of kind [`ErrorKind::Body`] before any attempt is made.
//!
//! The caller controls cancellation and deadlines by attaching a [`RequestContext`] to the
//! request. Every attempt runs under a child of that context, so canceling the caller's context
//! stops waits and in-flight attempts. Abandoned attempts are canceled individually.
//!
//! # Time
//!
//! All waits and timestamps go through the [`Clock`](tick::Clock) carried by a
//! [`TransportContext`], which lets tests control time.
//!
//! # Telemetry
//!
//! Decorators emit `tracing` events once logs are enabled on the [`TransportContext`]. With the
//! `metrics` feature, they also report a `resilience.event` OpenTelemetry counter.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ferry::access_log::AccessLog;
//! use ferry::policy::{BackoffPolicy, RetryPolicy};
//! use ferry::retry::Retry;
//! use ferry::{Body, Layer, Request, RequestContext, Response, Service, TransportContext, transport_fn};
//! use http::StatusCode;
//! use tick::Clock;
//!
//! # async fn example(clock: Clock) -> Result<(), ferry::TransportError> {
//! let context = TransportContext::new(&clock).name("inventory").enable_logs();
//! let base = transport_fn(|_| async { Ok(Response::new(Body::from("ok"))) });
//!
//! let transport = AccessLog::layer(&context).layer(
//!     Retry::layer("retry", &context)
//!         .backoff(BackoffPolicy::percent_jittered(
//!             BackoffPolicy::exponential(Duration::from_millis(50)),
//!             0.2,
//!         ))
//!         .retry_policy(RetryPolicy::limited(
//!             3,
//!             [
//!                 RetryPolicy::status_codes([StatusCode::SERVICE_UNAVAILABLE]),
//!                 RetryPolicy::timeout(&clock, Duration::from_secs(2)),
//!             ],
//!         ))
//!         .layer(base),
//! );
//!
//! let mut request = Request::new(Body::from("hello"));
//! RequestContext::with_timeout(&clock, Duration::from_secs(10)).attach(&mut request);
//!
//! let response = transport.execute(request).await?;
//! assert_eq!(response.status(), StatusCode::OK);
//! # Ok(())
//! # }
//! ```

mod body;
mod context;
mod error;
mod fn_wrapper;
#[cfg(any(feature = "metrics", test))]
mod metrics;
mod replay;
mod request_context;
mod rnd;
mod telemetry;
mod transport;

pub mod access_log;
pub mod chain;
pub mod header;
pub mod hedging;
pub mod policy;
pub mod pool;
pub mod retry;
pub mod retry_after;

pub use body::Body;
pub use context::TransportContext;
pub use error::{BoxError, ErrorKind, TransportError, error_to_status_code};
pub use layered::{Layer, Service};
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};
pub use replay::RequestReplayer;
pub use request_context::RequestContext;
pub use transport::{BoxTransport, Factory, Request, Response, Transport, TransportResult, boxed, transport_fn};

/// Marks a required builder setting that has not been provided yet.
#[derive(Debug, Clone, Copy, Default)]
#[non_exhaustive]
pub struct NotSet;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;
