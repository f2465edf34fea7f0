// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pluggable strategies deciding whether and when to send a request again.
//!
//! Three capabilities make up a policy:
//!
//! - [`Retrier`] votes on whether an attempt's outcome warrants another attempt.
//! - [`Requester`] adjusts each outgoing attempt, e.g. to bound its lifetime. A retrier
//!   exposes it through [`Retrier::as_requester`].
//! - [`Backoffer`] decides how long to wait before the next attempt.
//!
//! Decorators never share policy state between calls. They hold a [`RetryPolicy`] or
//! [`BackoffPolicy`] factory and create fresh instances at the start of every request, so
//! counters such as [`LimitedRetrier`]'s attempt budget are per request.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ferry::policy::{BackoffPolicy, RetryPolicy};
//! use http::StatusCode;
//!
//! // Up to three retries of 503 responses, one second apart give or take 20%.
//! let retry = RetryPolicy::limited(3, [RetryPolicy::status_codes([StatusCode::SERVICE_UNAVAILABLE])]);
//! let backoff = BackoffPolicy::percent_jittered(BackoffPolicy::fixed(Duration::from_secs(1)), 0.2);
//! # let _ = (retry, backoff);
//! ```

mod args;
mod backoff;
mod retrier;

pub use args::{BackoffArgs, RetryArgs};
pub use backoff::{BackoffPolicy, Backoffer, ExponentialBackoffer, FixedBackoffer, PercentJitteredBackoffer};
pub use retrier::{LimitedRetrier, Requester, Retrier, RetryPolicy, StatusCodeRetrier, TimeoutRetrier};
