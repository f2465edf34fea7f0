// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;

use futures_util::future::{Either, select};
use layered::{DynamicService, DynamicServiceExt, Execute, Service};
use tick::Clock;

use crate::fn_wrapper::define_fn_wrapper;
use crate::{Body, RequestContext, TransportError};

/// An HTTP request flowing through transports.
pub type Request = http::Request<Body>;

/// An HTTP response produced by transports.
pub type Response = http::Response<Body>;

/// The outcome of sending a request.
pub type TransportResult = Result<Response, TransportError>;

/// A capability that sends a request and produces a response.
///
/// Implemented for every [`Service`] that maps a [`Request`] to a [`TransportResult`], so
/// plain services, decorators and [`BoxTransport`] are all transports.
pub trait Transport: Service<Request, Out = TransportResult> {}

impl<T> Transport for T where T: Service<Request, Out = TransportResult> {}

/// A type-erased, cheaply cloneable transport.
pub type BoxTransport = DynamicService<Request, TransportResult>;

/// Erases the concrete type of a transport.
pub fn boxed<T>(transport: T) -> BoxTransport
where
    T: Transport + 'static,
{
    transport.into_dynamic()
}

/// Adapts an async function into a transport.
///
/// # Examples
///
/// ```
/// use ferry::{Body, Request, Response, transport_fn};
///
/// let transport = transport_fn(|_request: Request| async { Ok(Response::new(Body::from("hello"))) });
/// # let _ = transport;
/// ```
pub fn transport_fn<F, Fut>(f: F) -> Execute<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TransportResult> + Send + 'static,
{
    Execute::new(f)
}

define_fn_wrapper!(
    /// Produces new transport instances.
    ///
    /// Used by [`Recycler`](crate::pool::Recycler) and [`Rotator`](crate::pool::Rotator) to build
    /// the instances they manage, and by [`Chain::apply_factory`](crate::chain::Chain::apply_factory)
    /// to decorate each of them.
    pub Factory(Fn() -> BoxTransport)
);

impl Factory {
    /// Builds a new transport instance.
    #[must_use]
    pub fn create(&self) -> BoxTransport {
        self.call()
    }

    /// A factory that hands out clones of a single transport.
    pub fn shared<T>(transport: T) -> Self
    where
        T: Transport + 'static,
    {
        let transport = boxed(transport);
        Self::new(move || transport.clone())
    }
}

/// Sends one attempt, bounded by the context attached to the request.
pub(crate) async fn send_attempt<S>(inner: &S, request: Request, clock: &Clock) -> TransportResult
where
    S: Transport,
{
    let context = RequestContext::of(&request);
    let send = pin!(inner.execute(request));
    let done = pin!(context.done(clock));

    match select(send, done).await {
        Either::Left((out, _)) => out,
        Either::Right((error, _)) => Err(error),
    }
}
