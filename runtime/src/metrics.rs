//! Metrics emitted by the engine.
//!
//! The engine records through the `metrics` facade and ships no exporter;
//! install whatever recorder the host application uses, then call
//! [`describe_metrics`] once so the descriptions reach it.
//!
//! | Metric | Kind | Meaning |
//! |--------|------|---------|
//! | `automata.commands.total` | counter | Commands accepted by `handle` |
//! | `automata.events.settled` | counter | Events that left the middleware and were reduced |
//! | `automata.states.published` | counter | States published to observers |
//! | `automata.states.skipped` | counter | Reductions suppressed as unchanged |
//! | `automata.effects.failed` | counter | Fallible effects that ended with an unhandled error |
//! | `automata.effects.panicked` | counter | Middleware/request invocations that panicked |
//! | `automata.reduce.duration_seconds` | histogram | Time spent in `reduce` |
//! | `automata.retry.attempts` | counter | Provider calls retried after a transient failure |
//! | `automata.retry.exhausted` | counter | Provider calls that ran out of retries |

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Duration;

/// Register descriptions for every metric the engine emits.
///
/// Safe to call more than once; without an installed recorder it does nothing.
pub fn describe_metrics() {
    describe_counter!(
        "automata.commands.total",
        "Total number of commands accepted by engines"
    );
    describe_counter!(
        "automata.events.settled",
        "Total number of events reduced after leaving the middleware"
    );
    describe_counter!(
        "automata.states.published",
        "Total number of states published to observers"
    );
    describe_counter!(
        "automata.states.skipped",
        "Total number of reductions suppressed because the state did not change"
    );
    describe_counter!(
        "automata.effects.failed",
        "Total number of fallible effects that ended with an unhandled error"
    );
    describe_counter!(
        "automata.effects.panicked",
        "Total number of middleware or request invocations that panicked"
    );
    describe_histogram!(
        "automata.reduce.duration_seconds",
        "Time taken to reduce one event"
    );
    describe_counter!(
        "automata.retry.attempts",
        "Total number of provider calls retried after a transient failure"
    );
    describe_counter!(
        "automata.retry.exhausted",
        "Total number of provider calls that failed after the last retry"
    );
}

/// Engine metrics recorder.
pub struct EngineMetrics;

impl EngineMetrics {
    /// Record a command accepted at intake.
    pub fn command_received() {
        counter!("automata.commands.total").increment(1);
    }

    /// Record one reduction and how long it took.
    pub fn event_settled(duration: Duration) {
        counter!("automata.events.settled").increment(1);
        histogram!("automata.reduce.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a published state.
    pub fn state_published() {
        counter!("automata.states.published").increment(1);
    }

    /// Record a reduction whose publication was skipped.
    pub fn state_skipped() {
        counter!("automata.states.skipped").increment(1);
    }

    /// Record a panicking pipeline invocation.
    pub fn effect_panicked(pipeline: &'static str) {
        counter!("automata.effects.panicked", "pipeline" => pipeline).increment(1);
    }

    /// Record a retried provider call.
    pub fn retry_attempted() {
        counter!("automata.retry.attempts").increment(1);
    }

    /// Record a provider call that exhausted its retries.
    pub fn retry_exhausted() {
        counter!("automata.retry.exhausted").increment(1);
    }
}
