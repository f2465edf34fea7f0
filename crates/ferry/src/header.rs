// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Sets computed headers on requests and responses.
//!
//! # Examples
//!
//! ```
//! use ferry::header::Header;
//! use ferry::{Body, Layer, Request, Response, transport_fn};
//! use http::{HeaderName, HeaderValue};
//!
//! let base = transport_fn(|_| async { Ok(Response::new(Body::empty())) });
//!
//! let transport = Header::layer(|_: &Request| {
//!     (HeaderName::from_static("x-client"), HeaderValue::from_static("ferry"))
//! })
//! .response_provider(|response: &Response| {
//!     (HeaderName::from_static("x-upstream-status"), response.status().as_u16().into())
//! })
//! .layer(base);
//! # let _ = transport;
//! ```

use std::sync::Arc;

use http::{HeaderName, HeaderValue};
use layered::Service;

use crate::fn_wrapper::define_fn_wrapper;
use crate::{Layer, Request, Response, Transport, TransportResult};

define_fn_wrapper!(
    /// Computes the header to set on an outgoing request.
    pub RequestHeaderProvider(Fn(request: &Request) -> (HeaderName, HeaderValue))
);

define_fn_wrapper!(
    /// Computes the header to set on a successful response.
    pub ResponseHeaderProvider(Fn(response: &Response) -> (HeaderName, HeaderValue))
);

/// Sets one header on every request and, optionally, one on every successful response.
///
/// Existing values of the same header are replaced. Errors pass through unchanged.
#[derive(Debug)]
pub struct Header<S> {
    shared: Arc<HeaderShared>,
    inner: S,
}

#[derive(Debug)]
struct HeaderShared {
    request_provider: RequestHeaderProvider,
    response_provider: Option<ResponseHeaderProvider>,
}

impl<S: Clone> Clone for Header<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            inner: self.inner.clone(),
        }
    }
}

impl Header<()> {
    /// Starts configuring a header decorator setting the header computed by `request_provider`.
    pub fn layer<F>(request_provider: F) -> HeaderLayer
    where
        F: Fn(&Request) -> (HeaderName, HeaderValue) + Send + Sync + 'static,
    {
        HeaderLayer {
            request_provider: RequestHeaderProvider::new(request_provider),
            response_provider: None,
        }
    }
}

/// Builder for the [`Header`] decorator.
#[derive(Debug, Clone)]
pub struct HeaderLayer {
    request_provider: RequestHeaderProvider,
    response_provider: Option<ResponseHeaderProvider>,
}

impl HeaderLayer {
    /// Also sets the header computed by `provider` on successful responses.
    #[must_use]
    pub fn response_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Response) -> (HeaderName, HeaderValue) + Send + Sync + 'static,
    {
        self.response_provider = Some(ResponseHeaderProvider::new(provider));
        self
    }
}

impl<S> Layer<S> for HeaderLayer {
    type Service = Header<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Header {
            shared: Arc::new(HeaderShared {
                request_provider: self.request_provider.clone(),
                response_provider: self.response_provider.clone(),
            }),
            inner,
        }
    }
}

impl<S> Service<Request> for Header<S>
where
    S: Transport,
{
    type Out = TransportResult;

    async fn execute(&self, mut request: Request) -> Self::Out {
        let (name, value) = self.shared.request_provider.call(&request);
        request.headers_mut().insert(name, value);

        let mut response = self.inner.execute(request).await?;

        if let Some(provider) = &self.shared.response_provider {
            let (name, value) = provider.call(&response);
            response.headers_mut().insert(name, value);
        }

        Ok(response)
    }
}
