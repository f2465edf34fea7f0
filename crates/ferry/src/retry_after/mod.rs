// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Honors `429 Too Many Requests` responses.
//!
//! Every response other than a 429, as well as every transport error, is returned unchanged.
//! On a 429 the decorator waits and sends the buffered request again:
//!
//! - without a `Retry-After` header, it waits for the backoff policy, which defaults to an
//!   exponential backoff starting at 20 ms;
//! - with a non-negative integer `Retry-After`, it waits exactly that long, in seconds unless
//!   configured otherwise with [`RetryAfterLayer::header_unit`];
//! - with any other `Retry-After` value, the 429 response is returned as-is.
//!
//! There is no attempt ceiling. Bound the loop with a deadline on the caller's
//! [`RequestContext`](crate::RequestContext), which also interrupts the waits.
//!
//! # Examples
//!
//! ```
//! use ferry::retry_after::{RetryAfter, RetryAfterUnit};
//! use ferry::{Body, Layer, Response, TransportContext, transport_fn};
//! use tick::Clock;
//!
//! let context = TransportContext::new(Clock::new_frozen());
//! let base = transport_fn(|_| async { Ok(Response::new(Body::empty())) });
//!
//! let transport = RetryAfter::layer("throttling", &context)
//!     .header_unit(RetryAfterUnit::Milliseconds)
//!     .layer(base);
//! # let _ = transport;
//! ```

mod constants;
mod layer;
mod service;

pub use layer::{RetryAfterLayer, RetryAfterUnit};
pub use service::RetryAfter;
