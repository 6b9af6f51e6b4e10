//! Requests: state-driven event sources that run after every publication.
//!
//! A [`Request`] looks at a freshly published state and decides whether the
//! machine needs something from the outside world: "the PIN has four digits,
//! validate it", "the account is initial, fetch the wallet". The events it
//! emits go back through middleware and reduction like any other event.
//!
//! # Algebra
//!
//! | Combinator | Output for state `s` |
//! |------------|----------------------|
//! | [`Request::passthrough`] | `{}` |
//! | [`Request::when`] | `{}` if the filter misses, else exactly what the handler emits |
//! | [`Request::serial`] | every request's stream, drained in registration order; `[]` is `{}` |
//! | [`Request::parallel`] | every request's stream, merged in completion order; `[]` is `{}` |

use crate::effect::{self, EventStream};
use futures::future::Future;
use futures::stream::{self, StreamExt};
use std::marker::PhantomData;
use std::sync::Arc;

type RequestFn<S, E> = dyn Fn(&S) -> EventStream<E> + Send + Sync;
type StateFilter<S, P> = dyn Fn(&S) -> Option<P> + Send + Sync;

/// A `state -> stream<event>` stage.
///
/// Requests receive a borrowed snapshot; anything an effect needs after the
/// call returns must be extracted (cloned) into the payload first.
pub struct Request<S, E> {
    run: Arc<RequestFn<S, E>>,
}

impl<S, E> Clone for Request<S, E> {
    fn clone(&self) -> Self {
        Self {
            run: Arc::clone(&self.run),
        }
    }
}

impl<S, E> std::fmt::Debug for Request<S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Request(<fn>)")
    }
}

impl<S, E> Default for Request<S, E>
where
    S: 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::passthrough()
    }
}

impl<S, E> Request<S, E>
where
    S: 'static,
    E: Send + 'static,
{
    /// Wrap a raw closure.
    pub fn from_fn<F>(run: F) -> Self
    where
        F: Fn(&S) -> EventStream<E> + Send + Sync + 'static,
    {
        Self { run: Arc::new(run) }
    }

    /// Emit nothing, for every state.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::from_fn(|_| effect::empty())
    }

    /// Run the request against one state.
    #[must_use]
    pub fn call(&self, state: &S) -> EventStream<E> {
        (self.run)(state)
    }

    /// Predicate dispatch on the state; states the filter misses emit
    /// nothing.
    pub fn when<P, F>(filter: F) -> WhenState<S, E, P>
    where
        F: Fn(&S) -> Option<P> + Send + Sync + 'static,
    {
        WhenState {
            filter: Arc::new(filter),
            _event: PhantomData,
        }
    }

    /// Concatenate the requests' streams in registration order.
    ///
    /// Every request is invoked against the same snapshot up front; the
    /// second stream is polled only once the first has completed.
    pub fn serial<I>(requests: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let stages: Arc<[Self]> = requests.into_iter().collect();

        Self::from_fn(move |state| {
            let streams: Vec<_> = stages.iter().map(|stage| stage.call(state)).collect();
            stream::iter(streams).flatten().boxed()
        })
    }

    /// Merge the requests' streams in completion order.
    pub fn parallel<I>(requests: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let branches: Arc<[Self]> = requests.into_iter().collect();
        if branches.is_empty() {
            return Self::passthrough();
        }

        Self::from_fn(move |state| {
            stream::select_all(branches.iter().map(|branch| branch.call(state))).boxed()
        })
    }
}

/// Builder returned by [`Request::when`].
pub struct WhenState<S, E, P> {
    filter: Arc<StateFilter<S, P>>,
    _event: PhantomData<fn() -> E>,
}

impl<S, E, P> WhenState<S, E, P>
where
    S: 'static,
    E: Send + 'static,
    P: Send + 'static,
{
    /// Handle matches with access to the state snapshot.
    pub fn then_with_state<F>(self, execute: F) -> Request<S, E>
    where
        F: Fn(&S, P) -> EventStream<E> + Send + Sync + 'static,
    {
        let filter = self.filter;
        Request::from_fn(move |state| match filter(state) {
            Some(payload) => execute(state, payload),
            None => effect::empty(),
        })
    }

    /// Handle matches with a stream-producing closure.
    pub fn then<F>(self, execute: F) -> Request<S, E>
    where
        F: Fn(P) -> EventStream<E> + Send + Sync + 'static,
    {
        self.then_with_state(move |_, payload| execute(payload))
    }

    /// Emit exactly one event on a match.
    pub fn then_map<F>(self, execute: F) -> Request<S, E>
    where
        F: Fn(P) -> E + Send + Sync + 'static,
    {
        self.then(move |payload| effect::just(execute(payload)))
    }

    /// Emit at most one event on a match.
    pub fn then_filter_map<F>(self, execute: F) -> Request<S, E>
    where
        F: Fn(P) -> Option<E> + Send + Sync + 'static,
    {
        self.then(move |payload| effect::from_option(execute(payload)))
    }

    /// Emit the outcome of one asynchronous effect on a match.
    pub fn then_async<F, Fut>(self, execute: F) -> Request<S, E>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<E>> + Send + 'static,
    {
        self.then(move |payload| effect::from_future(execute(payload)))
    }

    /// Emit the outcome of a fallible effect on a match; unhandled errors
    /// are logged and emit nothing.
    pub fn then_try<F, Fut, Er>(self, execute: F) -> Request<S, E>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<E, Er>> + Send + 'static,
        Er: std::fmt::Display,
    {
        self.then(move |payload| effect::from_result(execute(payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum Pin {
        Entering(Vec<u8>),
        Checked,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum PinEvent {
        Validating(Vec<u8>),
        Note(&'static str),
    }

    fn full_pin() -> Request<Pin, PinEvent> {
        Request::when(|state: &Pin| match state {
            Pin::Entering(digits) if digits.len() == 4 => Some(digits.clone()),
            _ => None,
        })
        .then_map(PinEvent::Validating)
    }

    fn note(label: &'static str, delay_ms: u64) -> Request<Pin, PinEvent> {
        Request::from_fn(move |_| {
            effect::from_future(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Some(PinEvent::Note(label))
            })
        })
    }

    async fn run(request: &Request<Pin, PinEvent>, state: &Pin) -> Vec<PinEvent> {
        request.call(state).collect().await
    }

    #[tokio::test]
    async fn test_when_infers_event_from_handler() {
        let request = Request::when(|state: &Pin| matches!(state, Pin::Checked).then_some("checked"))
            .then_map(PinEvent::Note);
        assert_eq!(run(&request, &Pin::Checked).await, vec![PinEvent::Note("checked")]);
    }

    #[tokio::test]
    async fn test_passthrough_emits_nothing() {
        let request = Request::<Pin, PinEvent>::passthrough();
        assert!(run(&request, &Pin::Checked).await.is_empty());
    }

    #[tokio::test]
    async fn test_when_dispatches_on_state() {
        let request = full_pin();
        assert_eq!(
            run(&request, &Pin::Entering(vec![1, 2, 3, 4])).await,
            vec![PinEvent::Validating(vec![1, 2, 3, 4])]
        );
        assert!(run(&request, &Pin::Entering(vec![1, 2])).await.is_empty());
        assert!(run(&request, &Pin::Checked).await.is_empty());
    }

    #[tokio::test]
    async fn test_then_with_state_sees_snapshot() {
        let request = Request::when(|state: &Pin| matches!(state, Pin::Entering(_)).then_some(()))
            .then_with_state(|state, ()| match state {
                Pin::Entering(digits) if digits.is_empty() => effect::just(PinEvent::Note("empty")),
                _ => effect::empty(),
            });

        assert_eq!(
            run(&request, &Pin::Entering(vec![])).await,
            vec![PinEvent::Note("empty")]
        );
        assert!(run(&request, &Pin::Entering(vec![1])).await.is_empty());
    }

    #[tokio::test]
    async fn test_serial_and_parallel_empty_emit_nothing() {
        let serial = Request::<Pin, PinEvent>::serial(Vec::new());
        let parallel = Request::<Pin, PinEvent>::parallel(Vec::new());
        assert!(run(&serial, &Pin::Checked).await.is_empty());
        assert!(run(&parallel, &Pin::Checked).await.is_empty());
    }

    #[tokio::test]
    async fn test_serial_keeps_registration_order() {
        let request = Request::serial(vec![note("slow", 30), note("fast", 1)]);
        assert_eq!(
            run(&request, &Pin::Checked).await,
            vec![PinEvent::Note("slow"), PinEvent::Note("fast")]
        );
    }

    #[tokio::test]
    async fn test_parallel_merges_by_completion() {
        let request = Request::parallel(vec![note("slow", 30), note("fast", 1)]);
        assert_eq!(
            run(&request, &Pin::Checked).await,
            vec![PinEvent::Note("fast"), PinEvent::Note("slow")]
        );
    }

    #[tokio::test]
    async fn test_then_try_error_is_swallowed() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let request = Request::when(|state: &Pin| matches!(state, Pin::Checked).then_some(()))
            .then_try(move |()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<PinEvent, _>(effect::EffectError::Unavailable("offline".into())) }
            });

        assert!(run(&request, &Pin::Checked).await.is_empty());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
