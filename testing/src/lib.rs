//! # Automata Testing
//!
//! Testing utilities and helpers for `automata` state machines and engines.
//!
//! This crate provides:
//! - [`MachineTest`]: Given-When-Then harness for pure machines
//! - Controllable effect-provider mocks ([`mocks::Gate`], [`mocks::CallCounter`], [`mocks::Recorder`])
//! - Stream helpers with timeouts for engine tests
//! - Property checks for the machine and command contracts
//!
//! ## Example
//!
//! ```ignore
//! use automata_testing::{helpers, mocks::Gate};
//!
//! #[tokio::test]
//! async fn slow_validation_settles_last() {
//!     let gate = Gate::new();
//!     let engine = lock_engine_with_validator(gated_validator(gate.clone()))?;
//!     let mut actions = engine.subscribe();
//!
//!     engine.handle(LockCommand::Digit(1))?;
//!     gate.open();
//!
//!     let seen = helpers::collect_for(&mut actions, Duration::from_millis(100)).await;
//!     assert_eq!(seen.len(), 2);
//! }
//! ```

pub mod machine_test;

pub use machine_test::MachineTest;

/// Mock effect providers for engine tests
pub mod mocks {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};
    use tokio::sync::watch;

    /// A one-shot barrier that holds effects until the test opens it
    ///
    /// Effects call [`Gate::wait`]; the test decides when they settle by
    /// calling [`Gate::open`]. This is how race tests force a specific
    /// completion order.
    ///
    /// # Example
    ///
    /// ```
    /// use automata_testing::mocks::Gate;
    ///
    /// # tokio_test::block_on(async {
    /// let gate = Gate::new();
    /// let waiter = gate.clone();
    /// gate.open();
    /// waiter.wait().await; // returns immediately once open
    /// assert!(waiter.is_open());
    /// # });
    /// ```
    #[derive(Debug, Clone)]
    pub struct Gate {
        open: Arc<watch::Sender<bool>>,
    }

    impl Gate {
        /// Create a closed gate
        #[must_use]
        pub fn new() -> Self {
            let (open, _) = watch::channel(false);
            Self {
                open: Arc::new(open),
            }
        }

        /// Open the gate, releasing current and future waiters
        pub fn open(&self) {
            self.open.send_replace(true);
        }

        /// Whether the gate has been opened
        #[must_use]
        pub fn is_open(&self) -> bool {
            *self.open.borrow()
        }

        /// Wait until the gate is open
        pub async fn wait(&self) {
            let mut receiver = self.open.subscribe();
            // The sender lives in `self`, so the channel cannot close here
            let _ = receiver.wait_for(|open| *open).await;
        }
    }

    impl Default for Gate {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Counts invocations of a provider, middleware or request
    #[derive(Debug, Clone, Default)]
    pub struct CallCounter {
        calls: Arc<AtomicUsize>,
    }

    impl CallCounter {
        /// Create a counter at zero
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record one call
        pub fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }

        /// Calls recorded so far
        #[must_use]
        pub fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    /// Records values seen by an effect, in arrival order
    #[derive(Debug)]
    pub struct Recorder<T> {
        seen: Arc<Mutex<Vec<T>>>,
    }

    impl<T> Clone for Recorder<T> {
        fn clone(&self) -> Self {
            Self {
                seen: Arc::clone(&self.seen),
            }
        }
    }

    impl<T> Default for Recorder<T> {
        fn default() -> Self {
            Self {
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl<T: Clone> Recorder<T> {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Record a value
        pub fn record(&self, value: T) {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value);
        }

        /// Everything recorded so far
        #[must_use]
        pub fn snapshot(&self) -> Vec<T> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }
}

/// Stream helpers with timeouts
///
/// Engine tests observe asynchronous output; every helper here is bounded
/// by a timeout so a missing event fails the test instead of hanging it.
pub mod helpers {
    use futures::{Stream, StreamExt};
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::time::{Instant, timeout, timeout_at};

    /// Default timeout used by the `*_default` helpers
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

    // Upper bound on preallocation; callers pass `usize::MAX` for "no limit".
    const PREALLOCATE: usize = 64;

    /// The next item, or `None` if nothing arrives within `limit`
    pub async fn next_within<S>(stream: &mut S, limit: Duration) -> Option<S::Item>
    where
        S: Stream + Unpin,
    {
        timeout(limit, stream.next()).await.ok().flatten()
    }

    /// Up to `count` items, stopping early when `limit` elapses
    pub async fn take_within<S>(stream: &mut S, count: usize, limit: Duration) -> Vec<S::Item>
    where
        S: Stream + Unpin,
    {
        let deadline = Instant::now() + limit;
        let mut items = Vec::with_capacity(count.min(PREALLOCATE));
        while items.len() < count {
            match timeout_at(deadline, stream.next()).await {
                Ok(Some(item)) => items.push(item),
                Ok(None) | Err(_) => break,
            }
        }
        items
    }

    /// Every item that arrives during `window`
    pub async fn collect_for<S>(stream: &mut S, window: Duration) -> Vec<S::Item>
    where
        S: Stream + Unpin,
    {
        take_within(stream, usize::MAX, window).await
    }

    /// Drain a finite stream, giving up after [`DEFAULT_TIMEOUT`]
    pub async fn collect_default<S>(stream: S) -> Vec<S::Item>
    where
        S: Stream + Unpin,
    {
        let mut stream = stream;
        take_within(&mut stream, usize::MAX, DEFAULT_TIMEOUT).await
    }

    /// Wait until the published state satisfies `predicate`
    ///
    /// Returns the matching state, or `None` on timeout.
    pub async fn wait_for_state<S, F>(
        state: &mut watch::Receiver<S>,
        limit: Duration,
        mut predicate: F,
    ) -> Option<S>
    where
        S: Clone,
        F: FnMut(&S) -> bool,
    {
        match timeout(limit, state.wait_for(|s| predicate(s))).await {
            Ok(Ok(matched)) => Some(matched.clone()),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Install a test-friendly tracing subscriber honouring `RUST_LOG`
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property checks for machine and command contracts
///
/// Thin wrappers around a proptest [`TestRunner`](proptest::test_runner::TestRunner)
/// so demo crates can state a contract in one call.
pub mod properties {
    use automata_core::{Command, StateMachine};
    use proptest::prelude::*;
    use proptest::test_runner::TestRunner;
    use std::fmt::Debug;

    /// Unhandled `(state, event)` pairs leave the state unchanged
    ///
    /// `handles` tells which pairs the machine's transition table matches;
    /// every other generated pair must reduce to the original state.
    ///
    /// # Panics
    ///
    /// Panics with the minimal failing case if the property does not hold.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_identity_on_unknown<M, SS, ES, H>(machine: &M, states: SS, events: ES, handles: H)
    where
        M: StateMachine,
        SS: Strategy<Value = M::State>,
        ES: Strategy<Value = M::Event>,
        H: Fn(&M::State, &M::Event) -> bool,
    {
        let mut runner = TestRunner::default();
        let result = runner.run(&(states, events), |(state, event)| {
            if !handles(&state, &event) {
                prop_assert_eq!(machine.reduce(state.clone(), event), state);
            }
            Ok(())
        });
        if let Err(error) = result {
            panic!("identity-on-unknown violated: {error}");
        }
    }

    /// Interpreting equal commands yields equal events
    ///
    /// # Panics
    ///
    /// Panics with the minimal failing case if the property does not hold.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_interpret_deterministic<C, CS>(commands: CS)
    where
        C: Command + Clone + Debug,
        C::Event: PartialEq + Debug,
        CS: Strategy<Value = C>,
    {
        let mut runner = TestRunner::default();
        let result = runner.run(&commands, |command| {
            prop_assert_eq!(command.clone().interpret(), command.interpret());
            Ok(())
        });
        if let Err(error) = result {
            panic!("interpret is not deterministic: {error}");
        }
    }

    /// Applying the same input twice equals applying it once
    ///
    /// # Panics
    ///
    /// Panics with the minimal failing case if the property does not hold.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_idempotent<T, V, TS, VS, F>(targets: TS, values: VS, apply: F)
    where
        T: Clone + PartialEq + Debug,
        V: Clone + Debug,
        TS: Strategy<Value = T>,
        VS: Strategy<Value = V>,
        F: Fn(T, V) -> T,
    {
        let mut runner = TestRunner::default();
        let result = runner.run(&(targets, values), |(target, value)| {
            let once = apply(target, value.clone());
            let twice = apply(once.clone(), value);
            prop_assert_eq!(twice, once);
            Ok(())
        });
        if let Err(error) = result {
            panic!("operation is not idempotent: {error}");
        }
    }
}
