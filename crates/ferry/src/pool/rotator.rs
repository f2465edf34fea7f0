// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use layered::Service;
use parking_lot::Mutex;

use crate::{BoxTransport, Factory, Request, TransportResult};

/// Spreads requests round-robin over a fixed set of instances.
///
/// # Examples
///
/// ```
/// use ferry::pool::Rotator;
/// use ferry::{Body, Factory, Response, transport_fn};
///
/// let factory = Factory::shared(transport_fn(|_| async { Ok(Response::new(Body::empty())) }));
/// let rotator = Rotator::new(&factory, 4);
///
/// assert_eq!(rotator.len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct Rotator {
    shared: Arc<RotatorShared>,
}

#[derive(Debug)]
struct RotatorShared {
    instances: Vec<BoxTransport>,
    offset: Mutex<usize>,
}

impl Rotator {
    /// Creates `instances` transports up front; at least one is always created.
    #[must_use]
    pub fn new(factory: &Factory, instances: usize) -> Self {
        let instances = (0..instances.max(1)).map(|_| factory.create()).collect();

        Self {
            shared: Arc::new(RotatorShared {
                instances,
                offset: Mutex::new(0),
            }),
        }
    }

    /// A factory producing a new [`Rotator`] over `instances` fresh transports on every call.
    #[must_use]
    pub fn factory(factory: Factory, instances: usize) -> Factory {
        Factory::new(move || crate::boxed(Self::new(&factory, instances)))
    }

    /// The number of instances in rotation.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.instances.len()
    }

    /// Always `false`: a rotator holds at least one instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.instances.is_empty()
    }

    fn next_instance(&self) -> BoxTransport {
        let instances = &self.shared.instances;
        let mut offset = self.shared.offset.lock();
        *offset = offset.wrapping_add(1) % instances.len();
        instances[*offset].clone()
    }
}

impl Service<Request> for Rotator {
    type Out = TransportResult;

    async fn execute(&self, request: Request) -> Self::Out {
        let instance = self.next_instance();
        instance.execute(request).await
    }
}
