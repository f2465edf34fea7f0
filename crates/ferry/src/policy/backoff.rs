// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::BackoffArgs;
use crate::fn_wrapper::define_fn_wrapper;
use crate::rnd::{Rnd, scale};

/// Decides how long to wait before the next attempt.
///
/// Instances are created per request by a [`BackoffPolicy`] and may keep state across the
/// attempts of that request.
pub trait Backoffer: Send {
    /// The wait before the next attempt.
    fn backoff(&mut self, args: BackoffArgs<'_>) -> Duration;
}

define_fn_wrapper!(
    /// Creates a fresh [`Backoffer`] for every request.
    pub BackoffPolicy(Fn() -> Box<dyn Backoffer>)
);

impl BackoffPolicy {
    /// Instantiates a backoffer.
    #[must_use]
    pub fn create(&self) -> Box<dyn Backoffer> {
        self.call()
    }

    /// Always waits `delay`. See [`FixedBackoffer`].
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self::new(move || Box::new(FixedBackoffer::new(delay)))
    }

    /// Waits `seed`, then twice as long after every attempt. See [`ExponentialBackoffer`].
    #[must_use]
    pub fn exponential(seed: Duration) -> Self {
        Self::new(move || Box::new(ExponentialBackoffer::new(seed)))
    }

    /// Randomizes the waits of `policy` by up to `percent` in either direction.
    /// See [`PercentJitteredBackoffer`].
    #[must_use]
    pub fn percent_jittered(policy: Self, percent: f64) -> Self {
        Self::new(move || Box::new(PercentJitteredBackoffer::new(policy.create(), percent)))
    }
}

/// Waits the same duration every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoffer {
    delay: Duration,
}

impl FixedBackoffer {
    /// Creates a backoffer that always waits `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Backoffer for FixedBackoffer {
    fn backoff(&mut self, _args: BackoffArgs<'_>) -> Duration {
        self.delay
    }
}

/// Waits `seed` first and doubles the wait on every call.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoffer {
    next: Duration,
}

impl ExponentialBackoffer {
    /// Creates a backoffer starting at `seed`.
    #[must_use]
    pub fn new(seed: Duration) -> Self {
        Self { next: seed }
    }
}

impl Backoffer for ExponentialBackoffer {
    fn backoff(&mut self, _args: BackoffArgs<'_>) -> Duration {
        let current = self.next;
        self.next = current.saturating_mul(2);
        current
    }
}

/// Spreads the waits of another backoffer.
///
/// A wait `B` becomes `B ± U[0, 1) × percent × B`, with the sign drawn independently. The
/// result always lies within `[B × (1 - percent), B × (1 + percent)]`. `percent` is clamped
/// to `[0, 1]`.
pub struct PercentJitteredBackoffer {
    inner: Box<dyn Backoffer>,
    percent: f64,
    rnd: Rnd,
}

impl PercentJitteredBackoffer {
    /// Jitters the waits of `inner` by up to `percent`, e.g. `0.1` for ±10%.
    #[must_use]
    pub fn new(inner: Box<dyn Backoffer>, percent: f64) -> Self {
        let percent = if percent.is_finite() { percent.clamp(0.0, 1.0) } else { 0.0 };

        Self {
            inner,
            percent,
            rnd: Rnd::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }
}

impl std::fmt::Debug for PercentJitteredBackoffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PercentJitteredBackoffer")
            .field("percent", &self.percent)
            .finish_non_exhaustive()
    }
}

impl Backoffer for PercentJitteredBackoffer {
    fn backoff(&mut self, args: BackoffArgs<'_>) -> Duration {
        let base = self.inner.backoff(args);
        self.rnd.jitter(base, scale(base, self.percent))
    }
}
