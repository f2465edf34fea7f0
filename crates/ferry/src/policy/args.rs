// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use http::request::Parts;

use crate::TransportResult;

/// Arguments for [`Retrier::retry`](super::Retrier::retry).
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct RetryArgs<'a> {
    pub(crate) parts: &'a Parts,
    pub(crate) outcome: &'a TransportResult,
    pub(crate) attempt: u32,
}

impl<'a> RetryArgs<'a> {
    /// Creates arguments for evaluating `outcome` of attempt number `attempt`.
    #[must_use]
    pub fn new(parts: &'a Parts, outcome: &'a TransportResult, attempt: u32) -> Self {
        Self { parts, outcome, attempt }
    }

    /// Metadata of the request being sent.
    #[must_use]
    pub fn parts(&self) -> &'a Parts {
        self.parts
    }

    /// The outcome of the attempt that just finished.
    #[must_use]
    pub fn outcome(&self) -> &'a TransportResult {
        self.outcome
    }

    /// Zero-based index of the attempt that just finished.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Arguments for [`Backoffer::backoff`](super::Backoffer::backoff).
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct BackoffArgs<'a> {
    pub(crate) parts: &'a Parts,
    pub(crate) outcome: Option<&'a TransportResult>,
    pub(crate) attempt: u32,
}

impl<'a> BackoffArgs<'a> {
    /// Creates arguments for computing the wait after attempt number `attempt`.
    #[must_use]
    pub fn new(parts: &'a Parts, outcome: Option<&'a TransportResult>, attempt: u32) -> Self {
        Self { parts, outcome, attempt }
    }

    /// Metadata of the request being sent.
    #[must_use]
    pub fn parts(&self) -> &'a Parts {
        self.parts
    }

    /// The outcome that led to waiting.
    ///
    /// `None` when pacing does not depend on an outcome, as with hedging.
    #[must_use]
    pub fn outcome(&self) -> Option<&'a TransportResult> {
        self.outcome
    }

    /// Zero-based index of the most recent attempt.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
