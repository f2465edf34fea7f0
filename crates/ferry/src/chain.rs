// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Dynamic composition of decorators.
//!
//! A [`Chain`] is an ordered list of [`Decorator`]s. [`Chain::apply`] wraps a base transport so
//! that a request passes through the decorators in list order and reaches the base last.
//! Static stacks can instead be composed with [`Layer::layer`](crate::Layer::layer) directly.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use ferry::chain::{Chain, Decorator};
//! use ferry::hedging::Hedging;
//! use ferry::policy::BackoffPolicy;
//! use ferry::retry_after::RetryAfter;
//! use ferry::{Body, Response, TransportContext, boxed, transport_fn};
//! use tick::Clock;
//!
//! let context = TransportContext::new(Clock::new_frozen());
//! let chain = Chain::new()
//!     .push(Decorator::from_layer(RetryAfter::layer("throttling", &context)))
//!     .push(Decorator::from_layer(
//!         Hedging::layer("hedging", &context).backoff(BackoffPolicy::fixed(Duration::from_millis(50))),
//!     ));
//!
//! let transport = chain.apply(boxed(transport_fn(|_| async { Ok(Response::new(Body::empty())) })));
//! # let _ = transport;
//! ```

use crate::fn_wrapper::define_fn_wrapper;
use crate::{BoxTransport, Factory, Layer, Transport, boxed};

define_fn_wrapper!(
    /// Wraps a transport into another one.
    pub Decorator(Fn(transport: BoxTransport) -> BoxTransport)
);

impl Decorator {
    /// Adapts a layer whose services are transports.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<BoxTransport> + Send + Sync + 'static,
        L::Service: Transport + 'static,
    {
        Self::new(move |transport| boxed(layer.layer(transport)))
    }

    /// Applies the decorator to `transport`.
    #[must_use]
    pub fn decorate(&self, transport: BoxTransport) -> BoxTransport {
        self.call(transport)
    }
}

/// An ordered collection of decorators; the first one is outermost.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    decorators: Vec<Decorator>,
}

impl Chain {
    /// An empty chain; applying it returns the base unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `decorator`, which becomes the innermost one so far.
    #[must_use]
    pub fn push(mut self, decorator: Decorator) -> Self {
        self.decorators.push(decorator);
        self
    }

    /// The number of decorators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    /// Whether the chain holds no decorator.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }

    /// Wraps `base` with every decorator, the first-listed ending up outermost.
    #[must_use]
    pub fn apply(&self, base: BoxTransport) -> BoxTransport {
        self.decorators.iter().rev().fold(base, |transport, decorator| decorator.decorate(transport))
    }

    /// A factory whose instances are the instances of `factory`, each wrapped by this chain.
    #[must_use]
    pub fn apply_factory(&self, factory: Factory) -> Factory {
        let chain = self.clone();
        Factory::new(move || chain.apply(factory.create()))
    }
}

impl FromIterator<Decorator> for Chain {
    fn from_iter<I: IntoIterator<Item = Decorator>>(iter: I) -> Self {
        Self {
            decorators: iter.into_iter().collect(),
        }
    }
}

impl Extend<Decorator> for Chain {
    fn extend<I: IntoIterator<Item = Decorator>>(&mut self, iter: I) {
        self.decorators.extend(iter);
    }
}
