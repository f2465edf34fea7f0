// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sends concurrent copies of a request to cut tail latency.
//!
//! The first attempt starts immediately. Whenever the backoff policy's interval elapses
//! without any attempt completing, another copy of the buffered request is launched next to
//! the ones in flight. The first attempt to complete wins, whether it succeeded or failed.
//! The remaining attempts are canceled through their own child
//! [`RequestContext`](crate::RequestContext) and dropped.
//!
//! The number of attempts is bounded only by the pacing of the backoff policy and the caller's
//! deadline. When the caller's context is canceled or expires first, its error is returned.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ferry::hedging::Hedging;
//! use ferry::policy::BackoffPolicy;
//! use ferry::{Body, Layer, Response, TransportContext, transport_fn};
//! use tick::Clock;
//!
//! let context = TransportContext::new(Clock::new_frozen());
//! let base = transport_fn(|_| async { Ok(Response::new(Body::empty())) });
//!
//! let transport = Hedging::layer("hedging", &context)
//!     .backoff(BackoffPolicy::fixed(Duration::from_millis(50)))
//!     .layer(base);
//! # let _ = transport;
//! ```

mod constants;
mod layer;
mod service;

pub use layer::HedgingLayer;
pub use service::Hedging;
