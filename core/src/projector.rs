//! Projection of state into externally observable actions.
//!
//! An [`ActionProjector`] turns a published state into whatever an observer
//! cares about: a screen's display model, a navigation route, a log line.
//! Projectors may decline to produce anything for transient states; the
//! runtime filters those absences out of the action stream instead of
//! delivering empty values.

use std::fmt::Debug;
use std::marker::PhantomData;

/// Derives an optional action from a state.
///
/// Must be pure: the same state always projects to the same action.
pub trait ActionProjector<S>: Send + Sync + 'static {
    /// The projected value delivered to observers.
    type Action: Clone + Debug + Send + 'static;

    /// Project a state, returning `None` when no action applies.
    fn transform(&self, state: &S) -> Option<Self::Action>;

    /// Post-process every projected action, keeping absences absent.
    ///
    /// Returning `None` from `f` drops the action as well.
    fn map<F, B>(self, f: F) -> Mapped<Self, F, S>
    where
        Self: Sized,
        F: Fn(Self::Action) -> Option<B> + Send + Sync + 'static,
        B: Clone + Debug + Send + 'static,
    {
        Mapped {
            inner: self,
            f,
            _state: PhantomData,
        }
    }
}

/// The state is its own action.
///
/// Mirrors machines whose observers want the raw state (every state projects).
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjector;

impl<S> ActionProjector<S> for IdentityProjector
where
    S: Clone + Debug + Send + 'static,
{
    type Action = S;

    fn transform(&self, state: &S) -> Option<S> {
        Some(state.clone())
    }
}

/// A projector backed by a plain function.
pub struct FnProjector<S, A> {
    transform: Box<dyn Fn(&S) -> Option<A> + Send + Sync>,
}

impl<S, A> FnProjector<S, A> {
    /// Wrap a projection function.
    #[must_use]
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&S) -> Option<A> + Send + Sync + 'static,
    {
        Self {
            transform: Box::new(transform),
        }
    }
}

impl<S, A> ActionProjector<S> for FnProjector<S, A>
where
    S: 'static,
    A: Clone + Debug + Send + 'static,
{
    type Action = A;

    fn transform(&self, state: &S) -> Option<A> {
        (self.transform)(state)
    }
}

impl<S, A> Debug for FnProjector<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnProjector(<fn>)")
    }
}

/// Projector returned by [`ActionProjector::map`].
pub struct Mapped<P, F, S> {
    inner: P,
    f: F,
    _state: PhantomData<fn(&S)>,
}

impl<P, F, S, B> ActionProjector<S> for Mapped<P, F, S>
where
    P: ActionProjector<S>,
    F: Fn(P::Action) -> Option<B> + Send + Sync + 'static,
    B: Clone + Debug + Send + 'static,
    S: 'static,
{
    type Action = B;

    fn transform(&self, state: &S) -> Option<B> {
        self.inner.transform(state).and_then(&self.f)
    }
}
