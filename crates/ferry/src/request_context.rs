// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;
use std::time::{Duration, Instant};

use futures_util::future::{Either, select};
use tick::Clock;
use tokio_util::sync::CancellationToken;

use crate::{Request, TransportError};

/// Cancellation token and deadline attached to a request.
///
/// The context travels in the request extensions. Requests without one behave as if they
/// carried a context that is never canceled and has no deadline.
///
/// Children observe their parent: canceling a parent cancels every child, and a child's
/// deadline is never later than its parent's. Canceling a child leaves the parent untouched.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ferry::{Body, RequestContext};
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let mut request = http::Request::new(Body::empty());
///
/// RequestContext::with_timeout(&clock, Duration::from_secs(5)).attach(&mut request);
///
/// assert!(RequestContext::of(&request).deadline().is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// Creates a context without a deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(clock: &Clock, timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: clock.instant().checked_add(timeout),
        }
    }

    /// Creates a context driven by an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token, deadline: None }
    }

    /// Returns the context attached to `request`, or a context that never fires.
    #[must_use]
    pub fn of(request: &Request) -> Self {
        request.extensions().get::<Self>().cloned().unwrap_or_default()
    }

    /// Attaches this context to `request`, replacing any previous one.
    pub fn attach(self, request: &mut Request) {
        request.extensions_mut().insert(self);
    }

    /// The underlying cancellation token.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The absolute deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Creates a child that shares this context's deadline.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Creates a child that expires after `timeout` or at this context's deadline, whichever
    /// comes first.
    #[must_use]
    pub fn child_with_timeout(&self, clock: &Clock, timeout: Duration) -> Self {
        let own = clock.instant().checked_add(timeout);
        let deadline = match (self.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };

        Self {
            token: self.token.child_token(),
            deadline,
        }
    }

    /// Cancels this context and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once the token has been canceled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the error describing why this context is done, or `None` while it is live.
    #[must_use]
    pub fn error(&self, clock: &Clock) -> Option<TransportError> {
        if self.token.is_cancelled() {
            return Some(TransportError::canceled());
        }

        self.deadline
            .filter(|deadline| clock.instant() >= *deadline)
            .map(|_| TransportError::deadline_exceeded())
    }

    /// Resolves once the token is canceled or the deadline passes.
    pub async fn done(&self, clock: &Clock) -> TransportError {
        let remaining = self
            .deadline
            .map_or(Duration::MAX, |deadline| deadline.saturating_duration_since(clock.instant()));

        let cancelled = pin!(self.token.cancelled());
        let expired = pin!(clock.delay(remaining));

        match select(cancelled, expired).await {
            Either::Left(((), _)) => TransportError::canceled(),
            Either::Right(((), _)) => TransportError::deadline_exceeded(),
        }
    }

    /// Waits for `delay` unless this context finishes first.
    pub(crate) async fn wait(&self, clock: &Clock, delay: Duration) -> Result<(), TransportError> {
        let done = pin!(self.done(clock));
        let delay = pin!(clock.delay(delay));

        match select(done, delay).await {
            Either::Left((error, _)) => Err(error),
            Either::Right(((), _)) => Ok(()),
        }
    }
}
