//! Event streams produced by effects, and the errors effect providers report.
//!
//! Every asynchronous stage of the engine (middleware and requests) answers
//! with an [`EventStream`]: zero, one or many events, each emitted whenever
//! it is ready. The helpers here build the common shapes.

use futures::future::{self, Future};
use futures::stream::{self, BoxStream, StreamExt};
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// A boxed, sendable stream of events.
pub type EventStream<E> = BoxStream<'static, E>;

/// A stream that emits exactly one event, immediately.
#[must_use]
pub fn just<E: Send + 'static>(event: E) -> EventStream<E> {
    stream::once(future::ready(event)).boxed()
}

/// A stream that completes without emitting anything.
#[must_use]
pub fn empty<E: Send + 'static>() -> EventStream<E> {
    stream::empty().boxed()
}

/// A stream that emits the future's event, if it produces one.
pub fn from_future<E, F>(fut: F) -> EventStream<E>
where
    E: Send + 'static,
    F: Future<Output = Option<E>> + Send + 'static,
{
    stream::once(fut)
        .filter_map(future::ready)
        .boxed()
}

/// A stream of zero or one event.
#[must_use]
pub fn from_option<E: Send + 'static>(event: Option<E>) -> EventStream<E> {
    match event {
        Some(event) => just(event),
        None => empty(),
    }
}

/// A stream that emits the event of a fallible effect.
///
/// An `Err` is logged and counted, then the stream completes empty: the
/// failure ends this invocation only.
pub fn from_result<E, Er, F>(fut: F) -> EventStream<E>
where
    E: Send + 'static,
    Er: std::fmt::Display,
    F: Future<Output = Result<E, Er>> + Send + 'static,
{
    from_future(async move {
        match fut.await {
            Ok(event) => Some(event),
            Err(error) => {
                tracing::warn!(error = %error, "Unhandled effect failure, invocation produced no event");
                metrics::counter!("automata.effects.failed").increment(1);
                None
            },
        }
    })
}

/// Wrap one pipeline invocation so a panic ends only that invocation.
///
/// Events emitted before the panic are kept. The panic is logged with the
/// pipeline label and the stream completes; the caller (and the engine
/// driving it) carries on.
pub fn isolate<E: Send + 'static>(events: EventStream<E>, pipeline: &'static str) -> EventStream<E> {
    AssertUnwindSafe(events)
        .catch_unwind()
        .scan((), move |_, item| {
            future::ready(match item {
                Ok(event) => Some(event),
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "<non-string panic>".to_string());
                    tracing::error!(pipeline, panic = %message, "Pipeline invocation panicked, stream terminated");
                    metrics::counter!("automata.effects.panicked", "pipeline" => pipeline).increment(1);
                    None
                },
            })
        })
        .boxed()
}

/// Failure reported by an effect provider (network, chain client, keystore).
///
/// Middleware and requests are expected to turn these into ordinary events
/// (a "failed" event, a fallback value). An error that is not handled ends
/// the stream of the invocation that hit it, never the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    /// The provider could not be reached or did not answer.
    #[error("Effect provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered but refused or could not parse the request.
    #[error("Effect provider rejected the request: {0}")]
    Rejected(String),

    /// The provider did not answer in time.
    #[error("Effect provider timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl EffectError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_just_and_empty() {
        assert_eq!(just(7).collect::<Vec<_>>().await, vec![7]);
        assert!(empty::<i32>().collect::<Vec<_>>().await.is_empty());
    }

    #[tokio::test]
    async fn test_from_future_drops_none() {
        let some = from_future(async { Some("done") }).collect::<Vec<_>>().await;
        let none = from_future(async { None::<&str> }).collect::<Vec<_>>().await;
        assert_eq!(some, vec!["done"]);
        assert!(none.is_empty());
    }

    #[tokio::test]
    #[allow(clippy::panic)] // Intentional panic for testing isolation
    async fn test_isolate_keeps_events_before_panic() {
        let events = stream::iter(vec![1, 2, 3])
            .map(|n| {
                if n == 3 {
                    panic!("third event explodes");
                }
                n
            })
            .boxed();

        let collected = isolate(events, "test").collect::<Vec<_>>().await;
        assert_eq!(collected, vec![1, 2]);
    }

    #[test]
    fn test_transient_errors() {
        assert!(EffectError::Unavailable("rpc down".into()).is_transient());
        assert!(EffectError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!EffectError::Rejected("bad address".into()).is_transient());
    }
}
