// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use http::StatusCode;
use tick::Clock;

use super::RetryArgs;
use crate::fn_wrapper::define_fn_wrapper;
use crate::{ErrorKind, Request, RequestContext};

/// Decides whether an attempt's outcome warrants another attempt.
///
/// Instances are created per request by a [`RetryPolicy`] and may keep state across the
/// attempts of that request.
pub trait Retrier: Send {
    /// Returns `true` to request another attempt.
    fn retry(&mut self, args: RetryArgs<'_>) -> bool;

    /// Exposes the [`Requester`] capability, if this retrier has one.
    fn as_requester(&mut self) -> Option<&mut dyn Requester> {
        None
    }
}

/// Adjusts each attempt before it is sent.
pub trait Requester: Send {
    /// Returns the request to send, typically `request` with extra headers or a
    /// narrower [`RequestContext`].
    fn request(&mut self, request: Request) -> Request;
}

define_fn_wrapper!(
    /// Creates a fresh [`Retrier`] for every request.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferry::policy::{RetryArgs, Retrier, RetryPolicy};
    ///
    /// struct RetryErrors;
    ///
    /// impl Retrier for RetryErrors {
    ///     fn retry(&mut self, args: RetryArgs<'_>) -> bool {
    ///         args.outcome().is_err()
    ///     }
    /// }
    ///
    /// let policy = RetryPolicy::limited(2, [RetryPolicy::new(|| Box::new(RetryErrors))]);
    /// # let _ = policy;
    /// ```
    pub RetryPolicy(Fn() -> Box<dyn Retrier>)
);

impl RetryPolicy {
    /// Instantiates a retrier.
    #[must_use]
    pub fn create(&self) -> Box<dyn Retrier> {
        self.call()
    }

    /// Retries responses whose status is one of `codes`. See [`StatusCodeRetrier`].
    pub fn status_codes(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        let codes: Vec<StatusCode> = codes.into_iter().collect();
        Self::new(move || Box::new(StatusCodeRetrier::new(codes.iter().copied())))
    }

    /// Bounds each attempt to `timeout` and retries attempts that ran out of time.
    /// See [`TimeoutRetrier`].
    #[must_use]
    pub fn timeout(clock: &Clock, timeout: Duration) -> Self {
        let clock = clock.clone();
        Self::new(move || Box::new(TimeoutRetrier::new(&clock, timeout)))
    }

    /// Caps the retries granted by `policies` at `limit`. See [`LimitedRetrier`].
    pub fn limited(limit: u32, policies: impl IntoIterator<Item = Self>) -> Self {
        let policies: Vec<Self> = policies.into_iter().collect();
        Self::new(move || Box::new(LimitedRetrier::new(limit, policies.iter().map(Self::create))))
    }
}

/// Retries when the response status is one of a fixed set.
///
/// Transport errors are never retried by this retrier.
#[derive(Debug, Clone)]
pub struct StatusCodeRetrier {
    codes: Vec<StatusCode>,
}

impl StatusCodeRetrier {
    /// Creates a retrier for the given status codes.
    pub fn new(codes: impl IntoIterator<Item = StatusCode>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
        }
    }
}

impl Retrier for StatusCodeRetrier {
    fn retry(&mut self, args: RetryArgs<'_>) -> bool {
        matches!(args.outcome(), Ok(response) if self.codes.contains(&response.status()))
    }
}

/// Gives every attempt its own deadline and retries attempts that exceeded it.
///
/// As a [`Requester`], it attaches a child [`RequestContext`] that expires `timeout` after the
/// attempt starts. The parent's deadline still applies when it is earlier.
#[derive(Debug, Clone)]
pub struct TimeoutRetrier {
    clock: Clock,
    timeout: Duration,
}

impl TimeoutRetrier {
    /// Creates a retrier bounding attempts to `timeout`.
    #[must_use]
    pub fn new(clock: &Clock, timeout: Duration) -> Self {
        Self {
            clock: clock.clone(),
            timeout,
        }
    }
}

impl Retrier for TimeoutRetrier {
    fn retry(&mut self, args: RetryArgs<'_>) -> bool {
        matches!(args.outcome(), Err(error) if error.kind() == ErrorKind::DeadlineExceeded)
    }

    fn as_requester(&mut self) -> Option<&mut dyn Requester> {
        Some(self)
    }
}

impl Requester for TimeoutRetrier {
    fn request(&mut self, mut request: Request) -> Request {
        RequestContext::of(&request)
            .child_with_timeout(&self.clock, self.timeout)
            .attach(&mut request);
        request
    }
}

/// Combines retriers under a shared attempt budget.
///
/// Votes to retry only while fewer than `limit` retries were granted and at least one wrapped
/// retrier votes to retry. Every evaluation below the limit consumes budget, regardless of
/// the outcome. Wrapped requesters are applied in order.
pub struct LimitedRetrier {
    limit: u32,
    attempts: u32,
    retriers: Vec<Box<dyn Retrier>>,
}

impl LimitedRetrier {
    /// Wraps `retriers` with a budget of `limit` retries.
    pub fn new(limit: u32, retriers: impl IntoIterator<Item = Box<dyn Retrier>>) -> Self {
        Self {
            limit,
            attempts: 0,
            retriers: retriers.into_iter().collect(),
        }
    }
}

impl std::fmt::Debug for LimitedRetrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimitedRetrier")
            .field("limit", &self.limit)
            .field("attempts", &self.attempts)
            .field("retriers", &self.retriers.len())
            .finish()
    }
}

impl Retrier for LimitedRetrier {
    fn retry(&mut self, args: RetryArgs<'_>) -> bool {
        if self.attempts >= self.limit {
            return false;
        }

        self.attempts = self.attempts.saturating_add(1);
        self.retriers.iter_mut().any(|retrier| retrier.retry(args))
    }

    fn as_requester(&mut self) -> Option<&mut dyn Requester> {
        Some(self)
    }
}

impl Requester for LimitedRetrier {
    fn request(&mut self, request: Request) -> Request {
        self.retriers.iter_mut().fold(request, |request, retrier| match retrier.as_requester() {
            Some(requester) => requester.request(request),
            None => request,
        })
    }
}
