// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};

use http::StatusCode;
use recoverable::{Recovery, RecoveryInfo};

/// Boxed error type used for body and transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Classifies a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The request's cancellation token was canceled.
    Canceled,

    /// The request's deadline passed before a response was produced.
    DeadlineExceeded,

    /// The request body could not be buffered for replay.
    Body,

    /// The wrapped transport reported a failure.
    Transport,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Canceled => "canceled",
            Self::DeadlineExceeded => "deadline exceeded",
            Self::Body => "body",
            Self::Transport => "transport",
        };
        f.write_str(text)
    }
}

/// The error produced by transports and every decorator in this crate.
///
/// Use [`TransportError::kind`] to tell cancellation apart from genuine transport failures.
/// The type implements [`Recovery`], so it plugs into any retry machinery that understands
/// [`RecoveryInfo`].
///
/// # Examples
///
/// ```
/// use ferry::{ErrorKind, TransportError};
///
/// let error = TransportError::transport("connection reset");
/// assert_eq!(error.kind(), ErrorKind::Transport);
/// assert!(!error.is_cancellation());
/// ```
#[ohno::error]
#[display("transport request failed: {kind}")]
pub struct TransportError {
    kind: ErrorKind,
}

impl TransportError {
    /// The request's cancellation token was canceled.
    #[must_use]
    pub fn canceled() -> Self {
        Self::new(ErrorKind::Canceled)
    }

    /// The request's deadline passed.
    #[must_use]
    pub fn deadline_exceeded() -> Self {
        Self::new(ErrorKind::DeadlineExceeded)
    }

    /// Buffering the request body failed.
    pub fn body(cause: impl Into<BoxError>) -> Self {
        Self::caused_by(ErrorKind::Body, cause)
    }

    /// The wrapped transport failed.
    pub fn transport(cause: impl Into<BoxError>) -> Self {
        Self::caused_by(ErrorKind::Transport, cause)
    }

    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` when the error originates from a canceled or expired request token.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind, ErrorKind::Canceled | ErrorKind::DeadlineExceeded)
    }
}

impl Recovery for TransportError {
    fn recovery(&self) -> RecoveryInfo {
        match self.kind {
            ErrorKind::DeadlineExceeded => RecoveryInfo::retry(),
            ErrorKind::Transport => RecoveryInfo::unknown(),
            ErrorKind::Canceled | ErrorKind::Body => RecoveryInfo::never(),
        }
    }
}

/// Maps an error to the status code reported for it in access logs.
///
/// Cancellation and deadline errors map to `504 Gateway Timeout`; everything else maps to
/// `502 Bad Gateway`.
#[must_use]
pub fn error_to_status_code(error: &TransportError) -> StatusCode {
    if error.is_cancellation() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    }
}
