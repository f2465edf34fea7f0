// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_core::Stream;
use futures_util::{FutureExt, StreamExt};
use layered::Service;
use parking_lot::Mutex;
use tick::Clock;

use crate::rnd::Rnd;
use crate::telemetry::{RECYCLE_EVENT, TelemetryHelper};
use crate::{BoxTransport, Factory, Request, TransportContext, TransportResult};

type Signal = Pin<Box<dyn Stream<Item = ()> + Send>>;

/// A signal source shared by every recycler built from the same options; `None` once ended.
type SharedSignal = Arc<Mutex<Option<Signal>>>;

/// Triggers that make a [`Recycler`] replace its instance.
///
/// Cloning the options shares the registered signal sources: each signal is consumed by
/// exactly one of the recyclers built from them.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ferry::pool::RecyclerOptions;
///
/// let (sender, receiver) = futures::channel::mpsc::unbounded::<()>();
/// let options = RecyclerOptions::new()
///     .ttl(Duration::from_secs(300))
///     .ttl_jitter(Duration::from_secs(30))
///     .max_usage(10_000)
///     .signal(receiver);
/// # let _ = (sender, options);
/// ```
#[derive(Clone, Default)]
pub struct RecyclerOptions {
    ttl: Option<Duration>,
    ttl_jitter: Duration,
    max_usage: Option<u64>,
    signals: Vec<SharedSignal>,
    rnd: Rnd,
}

impl RecyclerOptions {
    /// Options without any trigger; the first instance is kept forever.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the instance once it is older than `ttl`. A zero `ttl` disables the trigger.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    /// Shifts every time to live up or down by a random amount below `jitter`.
    #[must_use]
    pub fn ttl_jitter(mut self, jitter: Duration) -> Self {
        self.ttl_jitter = jitter;
        self
    }

    /// Replaces the instance after it served `max_usage` requests. Zero disables the trigger.
    #[must_use]
    pub fn max_usage(mut self, max_usage: u64) -> Self {
        self.max_usage = Some(max_usage).filter(|max| *max > 0);
        self
    }

    /// Replaces the instance whenever `signal` yields. May be called several times.
    #[must_use]
    pub fn signal(mut self, signal: impl Stream<Item = ()> + Send + 'static) -> Self {
        self.signals.push(Arc::new(Mutex::new(Some(Box::pin(signal)))));
        self
    }

    #[cfg(test)]
    pub(crate) fn rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    /// Consumes one pending signal, dropping sources that have ended.
    fn take_signal(&self) -> bool {
        self.signals.iter().any(|shared| {
            let mut slot = shared.lock();
            match slot.as_mut().map(|signal| signal.next().now_or_never()) {
                Some(Some(Some(()))) => true,
                Some(Some(None)) => {
                    *slot = None;
                    false
                }
                Some(None) | None => false,
            }
        })
    }
}

impl std::fmt::Debug for RecyclerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecyclerOptions")
            .field("ttl", &self.ttl)
            .field("ttl_jitter", &self.ttl_jitter)
            .field("max_usage", &self.max_usage)
            .field("signals", &self.signals.len())
            .finish_non_exhaustive()
    }
}

/// Why an instance was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecycleReason {
    Usage,
    Ttl,
    Signal,
}

impl RecycleReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::Usage => "usage",
            Self::Ttl => "ttl",
            Self::Signal => "signal",
        }
    }
}

/// Replaces its transport instance on time to live, usage or external signals.
///
/// Each request first resolves the instance to use under a lock, then is sent outside of it.
/// See [`RecyclerOptions`] for the triggers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use ferry::pool::{Recycler, RecyclerOptions};
/// use ferry::{Body, Factory, Response, TransportContext, boxed, transport_fn};
/// use tick::Clock;
///
/// let context = TransportContext::new(Clock::new_frozen());
/// let factory = Factory::new(|| boxed(transport_fn(|_| async { Ok(Response::new(Body::empty())) })));
///
/// let recycler = Recycler::new(
///     "connections",
///     factory,
///     RecyclerOptions::new().ttl(Duration::from_secs(60)),
///     &context,
/// );
/// # let _ = recycler;
/// ```
#[derive(Debug, Clone)]
pub struct Recycler {
    shared: Arc<RecyclerShared>,
}

#[derive(Debug)]
struct RecyclerShared {
    clock: Clock,
    factory: Factory,
    options: RecyclerOptions,
    telemetry: TelemetryHelper,
    state: Mutex<RecyclerState>,
}

#[derive(Debug)]
struct RecyclerState {
    current: BoxTransport,
    usage: u64,
    deadline: Option<Instant>,
}

impl Recycler {
    /// Creates the first instance right away.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        factory: Factory,
        options: RecyclerOptions,
        context: &TransportContext,
    ) -> Self {
        let clock = context.clock().clone();
        let state = RecyclerState {
            current: factory.create(),
            usage: 0,
            deadline: next_deadline(&clock, &options),
        };

        Self {
            shared: Arc::new(RecyclerShared {
                clock,
                factory,
                options,
                telemetry: context.create_telemetry(name.into()),
                state: Mutex::new(state),
            }),
        }
    }

    /// A factory producing a new [`Recycler`] on every call.
    ///
    /// All recyclers produced share the signal sources registered in `options`.
    pub fn factory(
        name: impl Into<Cow<'static, str>>,
        factory: Factory,
        options: RecyclerOptions,
        context: &TransportContext,
    ) -> Factory {
        let name = name.into();
        let context = context.clone();

        Factory::new(move || crate::boxed(Self::new(name.clone(), factory.clone(), options.clone(), &context)))
    }
}

impl RecyclerShared {
    fn resolve(&self) -> BoxTransport {
        let mut state = self.state.lock();

        if let Some(reason) = self.recycle_reason(&mut state) {
            state.current = self.factory.create();
            state.usage = 0;
            state.deadline = next_deadline(&self.clock, &self.options);
            self.emit_telemetry(reason);
        }

        state.current.clone()
    }

    fn recycle_reason(&self, state: &mut RecyclerState) -> Option<RecycleReason> {
        if let Some(max_usage) = self.options.max_usage {
            state.usage = state.usage.saturating_add(1);
            if state.usage > max_usage {
                return Some(RecycleReason::Usage);
            }
        }

        if state.deadline.is_some_and(|deadline| self.clock.instant() >= deadline) {
            return Some(RecycleReason::Ttl);
        }

        self.options.take_signal().then_some(RecycleReason::Signal)
    }

    fn emit_telemetry(&self, reason: RecycleReason) {
        if self.telemetry.logs_enabled {
            tracing::event!(
                name: "ferry.recycle",
                tracing::Level::INFO,
                pipeline.name = %self.telemetry.pipeline_name,
                strategy.name = %self.telemetry.strategy_name,
                recycle.reason = reason.as_str(),
            );
        }

        self.telemetry.report_event(RECYCLE_EVENT, None);
    }
}

/// `now + ttl ± jitter`, or `None` without a time to live.
fn next_deadline(clock: &Clock, options: &RecyclerOptions) -> Option<Instant> {
    let ttl = options.rnd.jitter(options.ttl?, options.ttl_jitter);
    clock.instant().checked_add(ttl)
}

impl Service<Request> for Recycler {
    type Out = TransportResult;

    async fn execute(&self, request: Request) -> Self::Out {
        let instance = self.shared.resolve();
        instance.execute(request).await
    }
}
