//! # Automata Runtime
//!
//! The engine that drives an `automata-core` state machine.
//!
//! ## Core Components
//!
//! - **Engine**: Owns the current state and runs the update cycle
//! - **Driver**: The single task that reduces settled events and publishes states
//! - **`ActionStream`**: What observers receive (projected actions, in publication order)
//!
//! ## Update Cycle
//!
//! 1. `handle(command)` interprets the command and enqueues its event
//! 2. Every queued event runs through the middleware; invocations overlap
//! 3. Each event the middleware emits is reduced against the latest published state
//! 4. The new state is published, then its projected action
//! 5. The request pipeline runs against the new state; its events go back to step 2
//!
//! ## Example
//!
//! ```
//! use automata_core::{FnMachine, IdentityProjector, Middleware, Request};
//! use automata_runtime::Engine;
//! use futures::StreamExt;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), automata_runtime::EngineError> {
//! #[derive(Clone, Debug, PartialEq)]
//! struct Tapped(u32);
//!
//! impl automata_core::Command for Tapped {
//!     type Event = u32;
//!     fn interpret(self) -> u32 {
//!         self.0
//!     }
//! }
//!
//! let machine = FnMachine::new(0_u32, |total: u32, n: u32| total + n);
//! let engine = Engine::<_, _, Tapped>::new(
//!     machine,
//!     IdentityProjector,
//!     Middleware::passthrough(),
//!     Request::passthrough(),
//! )?;
//!
//! let mut totals = engine.subscribe();
//! engine.handle(Tapped(2))?;
//! engine.handle(Tapped(3))?;
//!
//! assert_eq!(totals.next().await, Some(0)); // replay of the current state
//! assert_eq!(totals.next().await, Some(2));
//! assert_eq!(totals.next().await, Some(5));
//! # Ok(())
//! # }
//! ```

use std::borrow::Cow;
use std::str::FromStr;

/// Retry with exponential backoff for effect providers
pub mod retry;

/// Metric names and descriptions emitted by the engine
pub mod metrics;

/// Error types for the engine
pub mod error {
    use thiserror::Error;

    /// Errors returned by engine construction and command intake
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum EngineError {
        /// No Tokio runtime is available to run the driver task
        ///
        /// Engines must be built from inside a runtime context
        /// (`#[tokio::main]`, `#[tokio::test]`, `Runtime::enter`).
        #[error("Engine requires a Tokio runtime, none is running on this thread")]
        NoRuntime,

        /// The engine has been shut down and no longer accepts commands
        #[error("Engine has been shut down")]
        Stopped,

        /// The configuration cannot produce a working engine
        #[error("Invalid engine configuration: {0}")]
        InvalidConfig(String),
    }
}

pub use error::EngineError;

/// When a reduced state is published
///
/// Publication drives everything downstream: the state cell, the action
/// stream and the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishPolicy {
    /// Publish only states that differ structurally from the last published one
    ///
    /// No-op transitions (identity on unknown events) produce no action and
    /// do not re-run requests.
    #[default]
    SkipUnchanged,

    /// Publish every reduced state, equal or not
    Always,
}

impl FromStr for PublishPolicy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip-unchanged" | "skip_unchanged" | "distinct" => Ok(Self::SkipUnchanged),
            "always" => Ok(Self::Always),
            other => Err(EngineError::InvalidConfig(format!(
                "unknown publish policy '{other}', expected 'always' or 'skip-unchanged'"
            ))),
        }
    }
}

/// Configuration for Engine instances
///
/// # Example
///
/// ```
/// use automata_runtime::{EngineConfig, PublishPolicy};
///
/// let config = EngineConfig::default()
///     .with_action_capacity(64)
///     .with_publish_policy(PublishPolicy::Always)
///     .with_name("lock-screen");
///
/// assert_eq!(config.action_capacity, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Buffered actions per observer before a slow observer starts skipping
    pub action_capacity: usize,
    /// Which reduced states get published
    pub publish_policy: PublishPolicy,
    /// Name recorded on the driver's tracing span
    pub name: Cow<'static, str>,
}

impl EngineConfig {
    /// Environment variable overriding [`EngineConfig::action_capacity`]
    pub const ACTION_CAPACITY_VAR: &'static str = "AUTOMATA_ACTION_CAPACITY";

    /// Environment variable overriding [`EngineConfig::publish_policy`]
    pub const PUBLISH_POLICY_VAR: &'static str = "AUTOMATA_PUBLISH_POLICY";

    /// Set the action broadcast capacity
    #[must_use]
    pub const fn with_action_capacity(mut self, capacity: usize) -> Self {
        self.action_capacity = capacity;
        self
    }

    /// Set the publish policy
    #[must_use]
    pub const fn with_publish_policy(mut self, policy: PublishPolicy) -> Self {
        self.publish_policy = policy;
        self
    }

    /// Set the engine name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Defaults overridden by `AUTOMATA_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if a variable is set to a value
    /// that does not parse or fails validation.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `AUTOMATA_*` keys
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] for unparsable or invalid values.
    pub fn from_vars<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(Self::ACTION_CAPACITY_VAR) {
            config.action_capacity = raw.trim().parse().map_err(|_| {
                EngineError::InvalidConfig(format!(
                    "{} must be a positive integer, got '{raw}'",
                    Self::ACTION_CAPACITY_VAR
                ))
            })?;
        }
        if let Some(raw) = lookup(Self::PUBLISH_POLICY_VAR) {
            config.publish_policy = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration can be used to build an engine
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] when the action capacity is zero.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.action_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "action capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_capacity: 64,
            publish_policy: PublishPolicy::default(),
            name: Cow::Borrowed("engine"),
        }
    }
}

/// The engine: state owner and update-cycle coordinator
pub mod engine {
    use super::{EngineConfig, EngineError, PublishPolicy};
    use crate::metrics::EngineMetrics;
    use automata_core::effect::{self, EventStream};
    use automata_core::{ActionProjector, Command, Middleware, Request, StateMachine};
    use futures::FutureExt;
    use futures::channel::mpsc;
    use futures::stream::{BoxStream, SelectAll, Stream, StreamExt};
    use std::marker::PhantomData;
    use std::panic::AssertUnwindSafe;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex, PoisonError};
    use std::task::{Context, Poll};
    use std::time::Instant;
    use tokio::sync::{broadcast, watch};
    use tokio::task::JoinHandle;
    use tracing::Instrument;

    type EventOf<M> = <M as StateMachine>::Event;
    type StateOf<M> = <M as StateMachine>::State;

    /// A running state machine
    ///
    /// The Engine owns:
    /// 1. The latest published state (a `watch` cell, written only by the driver)
    /// 2. The event intake channel feeding the middleware
    /// 3. The action broadcast observers subscribe to
    /// 4. The driver task that reduces, publishes and runs requests
    ///
    /// Dropping the engine (or calling [`Engine::shutdown`]) tears down the
    /// driver together with every in-flight middleware and request stream.
    ///
    /// # Type Parameters
    ///
    /// - `M`: The state machine
    /// - `P`: The action projector observers see through
    /// - `C`: The command type accepted by [`Engine::handle`]
    pub struct Engine<M, P, C>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
    {
        events: mpsc::UnboundedSender<M::Event>,
        state: watch::Receiver<M::State>,
        actions: broadcast::Sender<P::Action>,
        projector: Arc<P>,
        publish_lock: Arc<Mutex<()>>,
        driver: JoinHandle<()>,
        config: EngineConfig,
        _command: PhantomData<fn(C)>,
    }

    /// Builder for [`Engine`]
    ///
    /// Middleware and request pipelines default to passthrough.
    pub struct EngineBuilder<M, P, C>
    where
        M: StateMachine,
    {
        machine: M,
        projector: P,
        middleware: Middleware<M::Event>,
        request: Request<M::State, M::Event>,
        config: EngineConfig,
        _command: PhantomData<fn(C)>,
    }

    impl<M, P, C> EngineBuilder<M, P, C>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
        C: Command<Event = M::Event>,
    {
        /// Set the middleware pipeline
        #[must_use]
        pub fn middleware(mut self, middleware: Middleware<M::Event>) -> Self {
            self.middleware = middleware;
            self
        }

        /// Set the request pipeline
        #[must_use]
        pub fn request(mut self, request: Request<M::State, M::Event>) -> Self {
            self.request = request;
            self
        }

        /// Set the engine configuration
        #[must_use]
        pub fn config(mut self, config: EngineConfig) -> Self {
            self.config = config;
            self
        }

        /// Seed the initial state, run the bootstrap requests and start the driver
        ///
        /// # Errors
        ///
        /// - [`EngineError::NoRuntime`] when called outside a Tokio runtime
        /// - [`EngineError::InvalidConfig`] when the configuration fails validation
        pub fn build(self) -> Result<Engine<M, P, C>, EngineError> {
            let runtime =
                tokio::runtime::Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
            self.config.validate()?;

            let Self {
                machine,
                projector,
                middleware,
                request,
                config,
                ..
            } = self;

            let (state_tx, state_rx) = watch::channel(machine.initial_state());
            let (actions, _) = broadcast::channel(config.action_capacity);
            let (events_tx, events_rx) = mpsc::unbounded();
            let projector = Arc::new(projector);
            let publish_lock = Arc::new(Mutex::new(()));

            // Bootstrap: one request invocation against the initial state.
            // Events it has ready now are queued ahead of any command.
            let mut bootstrap = invoke("request", || request.call(&state_tx.borrow()));
            let mut queued = 0_usize;
            let bootstrap = loop {
                match bootstrap.next().now_or_never() {
                    Some(Some(event)) => {
                        queued += 1;
                        // The receiver is still held here, so this cannot fail
                        let _ = events_tx.unbounded_send(event);
                    },
                    Some(None) => break effect::empty(),
                    None => break bootstrap,
                }
            };

            let span = tracing::info_span!("engine", name = %config.name);
            span.in_scope(|| tracing::debug!(queued, "Engine constructed, bootstrap requests started"));

            let driver = Driver {
                machine,
                projector: Arc::clone(&projector),
                middleware,
                request,
                state: state_tx,
                actions: actions.clone(),
                events: events_tx.clone(),
                publish_lock: Arc::clone(&publish_lock),
                policy: config.publish_policy,
            };
            let driver = runtime.spawn(driver.run(events_rx, bootstrap).instrument(span));

            Ok(Engine {
                events: events_tx,
                state: state_rx,
                actions,
                projector,
                publish_lock,
                driver,
                config,
                _command: PhantomData,
            })
        }
    }

    impl<M, P, C> Engine<M, P, C>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
        C: Command<Event = M::Event>,
    {
        /// Start building an engine for `machine`, observed through `projector`
        #[must_use]
        pub fn builder(machine: M, projector: P) -> EngineBuilder<M, P, C> {
            EngineBuilder {
                machine,
                projector,
                middleware: Middleware::passthrough(),
                request: Request::passthrough(),
                config: EngineConfig::default(),
                _command: PhantomData,
            }
        }

        /// Build an engine with the default configuration
        ///
        /// # Errors
        ///
        /// Returns [`EngineError::NoRuntime`] when called outside a Tokio runtime.
        pub fn new(
            machine: M,
            projector: P,
            middleware: Middleware<M::Event>,
            request: Request<M::State, M::Event>,
        ) -> Result<Self, EngineError> {
            Self::builder(machine, projector)
                .middleware(middleware)
                .request(request)
                .build()
        }

        /// Interpret a command and enqueue its event
        ///
        /// Returns as soon as the event is queued; reduction happens on the
        /// driver. Commands are interpreted and queued in call order.
        ///
        /// # Errors
        ///
        /// Returns [`EngineError::Stopped`] once the engine has been shut down.
        #[tracing::instrument(skip_all, name = "engine_handle", fields(engine = %self.config.name))]
        pub fn handle(&self, command: C) -> Result<(), EngineError> {
            let event = command.interpret();
            tracing::trace!(?event, "Command interpreted");
            EngineMetrics::command_received();

            self.events.unbounded_send(event).map_err(|_| {
                tracing::warn!("Rejected command: engine is shut down");
                EngineError::Stopped
            })
        }

        /// Observe projected actions
        ///
        /// The stream starts with the projection of the current state (if it
        /// has one), then yields every published action in order.
        #[must_use]
        pub fn subscribe(&self) -> ActionStream<P::Action> {
            let (current, receiver) = {
                let _guard = self
                    .publish_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let current = self.projector.transform(&self.state.borrow());
                (current, self.actions.subscribe())
            };
            ActionStream::new(current, receiver)
        }

        /// A receiver for the published state cell
        #[must_use]
        pub fn watch_state(&self) -> watch::Receiver<M::State> {
            self.state.clone()
        }

        /// Read the latest published state via a closure
        ///
        /// ```ignore
        /// let digits = engine.state(|s| s.digits().len());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&M::State) -> T,
        {
            f(&self.state.borrow())
        }

        /// The configuration the engine was built with
        #[must_use]
        pub const fn config(&self) -> &EngineConfig {
            &self.config
        }

        /// Whether the engine still accepts commands
        #[must_use]
        pub fn is_running(&self) -> bool {
            !self.events.is_closed() && !self.driver.is_finished()
        }

        /// Stop the engine
        ///
        /// Closes the intake and aborts the driver, dropping every in-flight
        /// middleware and request stream. Results that arrive later are
        /// discarded. Idempotent.
        pub fn shutdown(&self) {
            if self.is_running() {
                tracing::info!(engine = %self.config.name, "Engine shutting down");
            }
            self.events.close_channel();
            self.driver.abort();
        }
    }

    impl<M, P, C> Drop for Engine<M, P, C>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
    {
        fn drop(&mut self) {
            self.events.close_channel();
            self.driver.abort();
        }
    }

    impl<M, P, C> std::fmt::Debug for Engine<M, P, C>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Engine")
                .field("name", &self.config.name)
                .field("state", &*self.state.borrow())
                .field("closed", &self.events.is_closed())
                .finish_non_exhaustive()
        }
    }

    /// Single writer of the state cell
    struct Driver<M, P>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
    {
        machine: M,
        projector: Arc<P>,
        middleware: Middleware<M::Event>,
        request: Request<M::State, M::Event>,
        state: watch::Sender<M::State>,
        actions: broadcast::Sender<P::Action>,
        events: mpsc::UnboundedSender<M::Event>,
        publish_lock: Arc<Mutex<()>>,
        policy: PublishPolicy,
    }

    impl<M, P> Driver<M, P>
    where
        M: StateMachine,
        P: ActionProjector<M::State>,
    {
        async fn run(
            self,
            intake: mpsc::UnboundedReceiver<EventOf<M>>,
            bootstrap: EventStream<EventOf<M>>,
        ) {
            let middleware = self.middleware.clone();
            let mut settled = intake
                .flat_map_unordered(None, move |event| {
                    invoke("middleware", || middleware.call(event))
                })
                .boxed();

            let mut requests: SelectAll<EventStream<EventOf<M>>> = SelectAll::new();
            requests.push(bootstrap);

            loop {
                tokio::select! {
                    Some(event) = settled.next() => {
                        if let Some(requested) = self.settle(event) {
                            requests.push(requested);
                        }
                    }
                    Some(event) = requests.next(), if !requests.is_empty() => {
                        tracing::trace!(?event, "Request emitted event");
                        if self.events.unbounded_send(event).is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }

            tracing::debug!("Driver stopped");
        }

        /// Reduce one settled event against the latest published state and
        /// publish the result. Returns the request stream for the new state.
        #[tracing::instrument(skip_all, name = "engine_settle")]
        fn settle(&self, event: EventOf<M>) -> Option<EventStream<EventOf<M>>> {
            tracing::trace!(?event, "Event settled");

            let current: StateOf<M> = self.state.borrow().clone();
            let start = Instant::now();
            let next = self.machine.reduce(current, event);
            EngineMetrics::event_settled(start.elapsed());

            if self.policy == PublishPolicy::SkipUnchanged && *self.state.borrow() == next {
                tracing::trace!("State unchanged, publication skipped");
                EngineMetrics::state_skipped();
                return None;
            }

            let action = self.projector.transform(&next);
            {
                let _guard = self
                    .publish_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                tracing::debug!(state = ?next, "Publishing state");
                self.state.send_replace(next);
                if let Some(action) = action {
                    // No receivers is fine: nobody is observing yet
                    let _ = self.actions.send(action);
                }
            }
            EngineMetrics::state_published();

            Some(invoke("request", || self.request.call(&self.state.borrow())))
        }
    }

    /// Call a pipeline and guard the resulting stream so a panic, either in
    /// the call itself or while the stream is polled, ends only this invocation.
    fn invoke<E, F>(pipeline: &'static str, call: F) -> EventStream<E>
    where
        E: Send + 'static,
        F: FnOnce() -> EventStream<E>,
    {
        match std::panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(events) => effect::isolate(events, pipeline),
            Err(_) => {
                tracing::error!(pipeline, "Pipeline invocation panicked before producing a stream");
                EngineMetrics::effect_panicked(pipeline);
                effect::empty()
            },
        }
    }

    /// Stream of projected actions returned by [`Engine::subscribe`]
    ///
    /// Never ends while the engine is alive. An observer that falls more than
    /// the configured capacity behind skips the actions it missed.
    pub struct ActionStream<A> {
        inner: BoxStream<'static, A>,
    }

    impl<A> ActionStream<A>
    where
        A: Clone + Send + 'static,
    {
        fn new(current: Option<A>, mut receiver: broadcast::Receiver<A>) -> Self {
            let inner = async_stream::stream! {
                if let Some(action) = current {
                    yield action;
                }
                loop {
                    match receiver.recv().await {
                        Ok(action) => {
                            yield action;
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action observer lagged, skipping missed actions");
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Self {
                inner: inner.boxed(),
            }
        }
    }

    impl<A> Stream for ActionStream<A> {
        type Item = A;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<A>> {
            self.inner.poll_next_unpin(cx)
        }
    }

    impl<A> std::fmt::Debug for ActionStream<A> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("ActionStream")
        }
    }
}

pub use engine::{ActionStream, Engine, EngineBuilder};
