use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use super::state_machine::{Instrument, Metrics, State, StateMachine};

/// A circuit breaker's public interface, as consumed by a [`DecoratedCall`](crate::DecoratedCall).
///
/// A breaker is usually shared by many calls on many threads, so every method takes `&self` and
/// must be individually atomic. Nothing is assumed across methods: between a permit check and
/// the report for the same call another thread may move the breaker to another state.
pub trait CircuitBreaker {
    /// The breaker's name, used for diagnostics.
    fn name(&self) -> &str;

    /// Requests permission to call.
    ///
    /// It returns `true` if a call is allowed, or `false` if prohibited.
    fn is_call_permitted(&self) -> bool;

    /// Records a successful call which took `elapsed`.
    fn on_success(&self, elapsed: Duration);

    /// Records a failed call which took `elapsed` and failed because of `cause`.
    fn on_error(&self, elapsed: Duration, cause: &(dyn StdError + 'static));

    /// Returns the current state.
    fn state(&self) -> State;

    /// Returns a snapshot of the current statistics.
    fn metrics(&self) -> Metrics;
}

impl<INSTRUMENT> CircuitBreaker for StateMachine<INSTRUMENT>
where
    INSTRUMENT: Instrument,
{
    #[inline]
    fn name(&self) -> &str {
        StateMachine::name(self)
    }

    #[inline]
    fn is_call_permitted(&self) -> bool {
        StateMachine::is_call_permitted(self)
    }

    fn on_success(&self, elapsed: Duration) {
        tracing::trace!(breaker = %StateMachine::name(self), ?elapsed, "call succeeded");
        StateMachine::on_success(self)
    }

    fn on_error(&self, elapsed: Duration, cause: &(dyn StdError + 'static)) {
        tracing::trace!(breaker = %StateMachine::name(self), ?elapsed, %cause, "call failed");
        StateMachine::on_error(self)
    }

    #[inline]
    fn state(&self) -> State {
        StateMachine::state(self)
    }

    #[inline]
    fn metrics(&self) -> Metrics {
        StateMachine::metrics(self)
    }
}

impl<'a, B> CircuitBreaker for &'a B
where
    B: CircuitBreaker + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_call_permitted(&self) -> bool {
        (**self).is_call_permitted()
    }

    fn on_success(&self, elapsed: Duration) {
        (**self).on_success(elapsed)
    }

    fn on_error(&self, elapsed: Duration, cause: &(dyn StdError + 'static)) {
        (**self).on_error(elapsed, cause)
    }

    fn state(&self) -> State {
        (**self).state()
    }

    fn metrics(&self) -> Metrics {
        (**self).metrics()
    }
}

impl<B> CircuitBreaker for Arc<B>
where
    B: CircuitBreaker + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_call_permitted(&self) -> bool {
        (**self).is_call_permitted()
    }

    fn on_success(&self, elapsed: Duration) {
        (**self).on_success(elapsed)
    }

    fn on_error(&self, elapsed: Duration, cause: &(dyn StdError + 'static)) {
        (**self).on_error(elapsed, cause)
    }

    fn state(&self) -> State {
        (**self).state()
    }

    fn metrics(&self) -> Metrics {
        (**self).metrics()
    }
}
