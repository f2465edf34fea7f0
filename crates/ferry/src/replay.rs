// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bytes::Bytes;
use http::request::Parts;
use http_body::Body as _;

use crate::{Body, Request, RequestContext, TransportError};

/// Produces independent copies of a request whose body may be a single-use stream.
///
/// The body is drained exactly once, at construction. Every [`copy`](Self::copy) carries the
/// original metadata and a fresh reader over the buffered bytes, so attempts never observe
/// each other's reads.
///
/// # Examples
///
/// ```
/// use ferry::{Body, RequestReplayer};
///
/// # async fn example() -> Result<(), ferry::TransportError> {
/// let request = http::Request::post("http://example.com").body(Body::from("payload")).unwrap();
/// let replayer = RequestReplayer::new(request).await?;
///
/// let first = replayer.copy();
/// let second = replayer.copy();
/// # let _ = (first, second);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RequestReplayer {
    parts: Parts,
    body: Option<Bytes>,
}

impl RequestReplayer {
    /// Buffers `request` for replay.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::Body`](crate::ErrorKind::Body) error if the body cannot be read.
    /// No copy can be produced in that case.
    pub async fn new(request: Request) -> Result<Self, TransportError> {
        let (parts, body) = request.into_parts();

        let body = if body.is_end_stream() {
            None
        } else {
            Some(body.into_bytes().await.map_err(TransportError::body)?)
        };

        Ok(Self { parts, body })
    }

    /// Request metadata: method, URI, version, headers and extensions.
    #[must_use]
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// The context attached to the original request.
    #[must_use]
    pub fn context(&self) -> RequestContext {
        self.parts.extensions.get::<RequestContext>().cloned().unwrap_or_default()
    }

    /// A new request identical to the original, with its own body reader.
    #[must_use]
    pub fn copy(&self) -> Request {
        let body = self.body.clone().map_or_else(Body::empty, Body::full);
        Request::from_parts(self.parts.clone(), body)
    }

    /// Like [`copy`](Self::copy), with `context` attached in place of the original one.
    #[must_use]
    pub fn copy_with_context(&self, context: RequestContext) -> Request {
        let mut request = self.copy();
        context.attach(&mut request);
        request
    }
}
