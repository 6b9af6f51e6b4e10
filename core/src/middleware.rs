//! Middleware: asynchronous event interceptors that run before reduction.
//!
//! A [`Middleware`] receives every event on its way to the reducer and
//! answers with a stream of events that replace it. Middleware is the only
//! stage allowed to call effect providers (network, chain clients, hashing)
//! and the only stage that may drop or rewrite events. It never touches
//! state.
//!
//! # Algebra
//!
//! | Combinator | Output for input `e` |
//! |------------|----------------------|
//! | [`Middleware::passthrough`] | `{e}` |
//! | [`Middleware::when`] | `{e}` if the filter misses, else exactly what the handler emits |
//! | [`Middleware::serial`] | each stage flat-mapped (merged) into the next; `[]` is passthrough |
//! | [`Middleware::parallel`] | all stages against `e`, merged in completion order; `[]` is passthrough |
//!
//! # Example
//!
//! ```
//! use automata_core::middleware::Middleware;
//! use futures::StreamExt;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum PinEvent {
//!     Validating(Vec<u8>),
//!     Valid,
//!     Invalid,
//!     Digit(u8),
//! }
//!
//! let validate = Middleware::when(|event: &PinEvent| match event {
//!     PinEvent::Validating(pin) => Some(pin.clone()),
//!     _ => None,
//! })
//! .then_map(|pin| if pin == [1, 2, 3, 4] { PinEvent::Valid } else { PinEvent::Invalid });
//!
//! # futures::executor::block_on(async {
//! let out: Vec<_> = validate.call(PinEvent::Validating(vec![1, 2, 3, 4])).collect().await;
//! assert_eq!(out, vec![PinEvent::Valid]);
//!
//! let out: Vec<_> = validate.call(PinEvent::Digit(5)).collect().await;
//! assert_eq!(out, vec![PinEvent::Digit(5)]);
//! # });
//! ```

use crate::effect::{self, EventStream};
use futures::future::Future;
use futures::stream::{self, StreamExt};
use std::sync::Arc;

type MiddlewareFn<E> = dyn Fn(E) -> EventStream<E> + Send + Sync;
type EventFilter<E, P> = dyn Fn(&E) -> Option<P> + Send + Sync;

/// An asynchronous `event -> stream<event>` stage.
///
/// Cloning is cheap; clones share the same closure.
pub struct Middleware<E> {
    run: Arc<MiddlewareFn<E>>,
}

impl<E> Clone for Middleware<E> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<E> std::fmt::Debug for Middleware<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Middleware(<fn>)")
    }
}

impl<E> Default for Middleware<E>
where
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::passthrough()
    }
}

impl<E> Middleware<E>
where
    E: Clone + Send + 'static,
{
    /// Wrap a raw closure.
    pub fn from_fn<F>(run: F) -> Self
    where
        F: Fn(E) -> EventStream<E> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Emit the input event unchanged.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::from_fn(effect::just)
    }

    /// Run the middleware against one event.
    #[must_use]
    pub fn call(&self, event: E) -> EventStream<E> {
        (self.run)(event)
    }

    /// Predicate dispatch: handle events the filter extracts a payload from,
    /// pass every other event through untouched.
    ///
    /// Finish the builder with one of the `then*` methods. When the filter
    /// matches, the handler's output replaces the event entirely; a handler
    /// that emits nothing swallows it.
    pub fn when<P, F>(filter: F) -> WhenEvent<E, P>
    where
        F: Fn(&E) -> Option<P> + Send + Sync + 'static,
    {
        WhenEvent {
            filter: Arc::new(filter),
        }
    }

    /// Chain stages left to right.
    ///
    /// Each stage's output events are fed to the next stage as they arrive;
    /// inner streams of a stage run concurrently (merge, not concat). An empty
    /// chain is passthrough.
    pub fn serial<I>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let stages: Arc<[Self]> = middlewares.into_iter().collect();

        Self::from_fn(move |event| {
            stages.iter().fold(effect::just(event), |upstream, stage| {
                let stage = stage.clone();
                upstream
                    .flat_map_unordered(None, move |event| stage.call(event))
                    .boxed()
            })
        })
    }

    /// Run every stage against the same event and merge their outputs in
    /// completion order.
    ///
    /// An empty list degenerates to passthrough so a pipeline is never inert.
    pub fn parallel<I>(middlewares: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let branches: Arc<[Self]> = middlewares.into_iter().collect();
        if branches.is_empty() {
            return Self::passthrough();
        }

        Self::from_fn(move |event: E| {
            stream::select_all(branches.iter().map(|branch| branch.call(event.clone()))).boxed()
        })
    }
}

/// Builder returned by [`Middleware::when`].
pub struct WhenEvent<E, P> {
    filter: Arc<EventFilter<E, P>>,
}

impl<E, P> WhenEvent<E, P>
where
    E: Clone + Send + 'static,
    P: Send + 'static,
{
    /// Handle matches with access to the original event.
    pub fn then_with_event<F>(self, execute: F) -> Middleware<E>
    where
        F: Fn(E, P) -> EventStream<E> + Send + Sync + 'static,
    {
        let filter = self.filter;
        Middleware::from_fn(move |event| match filter(&event) {
            Some(payload) => execute(event, payload),
            None => effect::just(event),
        })
    }

    /// Handle matches with a stream-producing closure.
    pub fn then<F>(self, execute: F) -> Middleware<E>
    where
        F: Fn(P) -> EventStream<E> + Send + Sync + 'static,
    {
        self.then_with_event(move |_, payload| execute(payload))
    }

    /// Replace matches with exactly one event.
    pub fn then_map<F>(self, execute: F) -> Middleware<E>
    where
        F: Fn(P) -> E + Send + Sync + 'static,
    {
        self.then(move |payload| effect::just(execute(payload)))
    }

    /// Replace matches with at most one event; `None` swallows the event.
    pub fn then_filter_map<F>(self, execute: F) -> Middleware<E>
    where
        F: Fn(P) -> Option<E> + Send + Sync + 'static,
    {
        self.then(move |payload| effect::from_option(execute(payload)))
    }

    /// Replace matches with the outcome of one asynchronous effect.
    pub fn then_async<F, Fut>(self, execute: F) -> Middleware<E>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<E>> + Send + 'static,
    {
        self.then(move |payload| effect::from_future(execute(payload)))
    }

    /// Replace matches with the outcome of a fallible effect.
    ///
    /// An error that the closure did not turn into an event is logged and
    /// the invocation ends without emitting.
    pub fn then_try<F, Fut, Er>(self, execute: F) -> Middleware<E>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E, Er>> + Send + 'static,
        Er: std::fmt::Display,
    {
        self.then(move |payload| effect::from_result(execute(payload)))
    }
}
