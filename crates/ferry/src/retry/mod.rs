// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sends a request again while any retry policy asks for it.
//!
//! The request is buffered once with [`RequestReplayer`](crate::RequestReplayer) and every
//! attempt runs under a fresh child of the caller's [`RequestContext`](crate::RequestContext).
//! After each attempt the retriers vote; a single vote is enough to retry. Between attempts the
//! decorator waits for the backoff policy's delay. The caller's context cancels the wait,
//! and its error is returned in that case.
//!
//! The last outcome is returned unchanged once no retrier votes to retry.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ferry::policy::{BackoffPolicy, RetryPolicy};
//! use ferry::retry::Retry;
//! use ferry::{Body, Layer, Response, TransportContext, transport_fn};
//! use http::StatusCode;
//! use tick::Clock;
//!
//! let context = TransportContext::new(Clock::new_frozen());
//! let base = transport_fn(|_| async { Ok(Response::new(Body::empty())) });
//!
//! let transport = Retry::layer("retry", &context)
//!     .backoff(BackoffPolicy::exponential(Duration::from_millis(100)))
//!     .retry_policy(RetryPolicy::limited(
//!         3,
//!         [RetryPolicy::status_codes([StatusCode::SERVICE_UNAVAILABLE])],
//!     ))
//!     .layer(base);
//! # let _ = transport;
//! ```

mod layer;
mod service;

pub use layer::RetryLayer;
pub use service::Retry;
