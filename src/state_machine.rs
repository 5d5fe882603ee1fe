use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::clock;
use super::config::Config;
use super::ring_buffer::RingBuffer;

/// States of the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// A closed breaker is operating normally and allowing calls.
    Closed,
    /// An open breaker has tripped and will not allow calls through until the wait duration
    /// expired.
    Open,
    /// A half open breaker has completed its wait duration and allows probe calls.
    HalfOpen,
}

impl State {
    /// Returns a string value for the state identifier.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "closed",
            State::HalfOpen => "half_open",
        }
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

/// A snapshot of the breaker's statistics for the current state.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    failure_rate: Option<f32>,
    buffered_calls: usize,
    failed_calls: usize,
    successful_calls: usize,
    max_buffered_calls: usize,
    not_permitted_calls: u64,
}

impl Metrics {
    /// The failure rate in percent, `None` until the ring buffer is full.
    pub fn failure_rate(&self) -> Option<f32> {
        self.failure_rate
    }

    /// The number of outcomes currently stored in the ring buffer.
    pub fn buffered_calls(&self) -> usize {
        self.buffered_calls
    }

    /// The number of failed calls in the ring buffer.
    pub fn failed_calls(&self) -> usize {
        self.failed_calls
    }

    /// The number of successful calls in the ring buffer.
    pub fn successful_calls(&self) -> usize {
        self.successful_calls
    }

    /// The ring buffer's capacity.
    pub fn max_buffered_calls(&self) -> usize {
        self.max_buffered_calls
    }

    /// The number of calls rejected since the breaker opened.
    pub fn not_permitted_calls(&self) -> u64 {
        self.not_permitted_calls
    }
}

/// Consumes the state machine events. May used for metrics and/or logs.
pub trait Instrument {
    /// Calls when state machine reject a call.
    fn on_call_rejected(&self);

    /// Calls when the circuit breaker become to open state.
    fn on_open(&self, duration: &Duration);

    /// Calls when the circuit breaker become to half open state.
    fn on_half_open(&self);

    /// Calls when the circuit breaker become to closed state.
    fn on_closed(&self);
}

impl Instrument for () {
    fn on_call_rejected(&self) {}

    fn on_open(&self, _: &Duration) {}

    fn on_half_open(&self) {}

    fn on_closed(&self) {}
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Closed,
    // `None` when the deadline is not representable; only `reset` closes the breaker then.
    Open(Option<Instant>),
    HalfOpen,
}

#[derive(Debug)]
struct Shared {
    phase: Phase,
    buffer: RingBuffer,
    not_permitted_calls: u64,
}

#[derive(Debug)]
struct Inner<INSTRUMENT> {
    name: String,
    failure_rate_threshold: f32,
    ring_buffer_size_in_closed_state: usize,
    ring_buffer_size_in_half_open_state: usize,
    wait_duration_in_open_state: Duration,
    instrument: INSTRUMENT,
    shared: Mutex<Shared>,
}

/// A circuit breaker's state machine.
///
/// It is implemented via a finite state machine with three states: `Closed`, `Open` and
/// `HalfOpen`. The state machine does not know anything about the backend's state by itself, but
/// uses the information provided via `on_success` and `on_error` events. Before communicating
/// with the backend, the permission to do so must be obtained via `is_call_permitted`.
///
/// While `Closed`, outcomes are kept in a ring buffer. Once it is full and the failure rate is
/// at or above the configured threshold, the state changes to `Open` and all access to the
/// backend is blocked for the configured wait duration.
///
/// After the wait duration has elapsed, the state changes from `Open` to `HalfOpen` and calls
/// are allowed again, recorded in a smaller ring buffer. When that buffer is full its failure
/// rate decides between going back to `Open` or to `Closed`.
///
/// Cloning is cheap; all clones share the same state.
#[derive(Debug)]
pub struct StateMachine<INSTRUMENT> {
    inner: Arc<Inner<INSTRUMENT>>,
}

impl<INSTRUMENT> Clone for StateMachine<INSTRUMENT> {
    fn clone(&self) -> Self {
        StateMachine {
            inner: self.inner.clone(),
        }
    }
}

impl<INSTRUMENT> StateMachine<INSTRUMENT>
where
    INSTRUMENT: Instrument,
{
    /// Creates a new state machine with given name and configuration.
    pub fn new(name: impl Into<String>, config: Config<INSTRUMENT>) -> Self {
        let shared = Shared {
            phase: Phase::Closed,
            buffer: RingBuffer::new(config.ring_buffer_size_in_closed_state),
            not_permitted_calls: 0,
        };

        StateMachine {
            inner: Arc::new(Inner {
                name: name.into(),
                failure_rate_threshold: config.failure_rate_threshold,
                ring_buffer_size_in_closed_state: config.ring_buffer_size_in_closed_state,
                ring_buffer_size_in_half_open_state: config.ring_buffer_size_in_half_open_state,
                wait_duration_in_open_state: config.wait_duration_in_open_state,
                instrument: config.instrument,
                shared: Mutex::new(shared),
            }),
        }
    }

    /// Returns the circuit breaker's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Requests permission to call this circuit breaker's backend.
    pub fn is_call_permitted(&self) -> bool {
        let mut shared = self.inner.shared.lock();
        let phase = shared.phase;
        match phase {
            Phase::Closed | Phase::HalfOpen => true,
            Phase::Open(until) => {
                if until.map_or(false, |until| clock::now() >= until) {
                    self.transit_to_half_open(&mut shared);
                    return true;
                }
                shared.not_permitted_calls += 1;
                tracing::debug!(breaker = %self.inner.name, "call rejected");
                self.inner.instrument.on_call_rejected();
                false
            }
        }
    }

    /// Records a successful call.
    ///
    /// This method must be invoked when a call was success.
    pub fn on_success(&self) {
        let mut shared = self.inner.shared.lock();
        self.record(&mut shared, false);
    }

    /// Records a failed call.
    ///
    /// This method must be invoked when a call failed.
    pub fn on_error(&self) {
        let mut shared = self.inner.shared.lock();
        self.record(&mut shared, true);
    }

    /// Returns the current state.
    pub fn state(&self) -> State {
        match self.inner.shared.lock().phase {
            Phase::Closed => State::Closed,
            Phase::Open(_) => State::Open,
            Phase::HalfOpen => State::HalfOpen,
        }
    }

    /// Returns the statistics of the current state.
    pub fn metrics(&self) -> Metrics {
        let shared = self.inner.shared.lock();
        Metrics {
            failure_rate: shared.buffer.failure_rate(),
            buffered_calls: shared.buffer.len(),
            failed_calls: shared.buffer.failures(),
            successful_calls: shared.buffer.successes(),
            max_buffered_calls: shared.buffer.capacity(),
            not_permitted_calls: shared.not_permitted_calls,
        }
    }

    /// Returns the circuit breaker to its original closed state, losing statistics.
    pub fn reset(&self) {
        let mut shared = self.inner.shared.lock();
        self.transit_to_closed(&mut shared);
    }

    fn record(&self, shared: &mut Shared, failed: bool) {
        let phase = shared.phase;
        match phase {
            Phase::Closed => {
                push(&mut shared.buffer, failed);
                if self.is_over_threshold(shared) {
                    self.transit_to_open(shared);
                }
            }
            Phase::HalfOpen => {
                push(&mut shared.buffer, failed);
                if shared.buffer.is_full() {
                    if self.is_over_threshold(shared) {
                        self.transit_to_open(shared);
                    } else {
                        self.transit_to_closed(shared);
                    }
                }
            }
            // A call admitted before the breaker opened; its outcome no longer matters.
            Phase::Open(_) => {}
        }
    }

    fn is_over_threshold(&self, shared: &Shared) -> bool {
        shared
            .buffer
            .failure_rate()
            .map_or(false, |rate| rate >= self.inner.failure_rate_threshold)
    }

    fn transit_to_open(&self, shared: &mut Shared) {
        let delay = self.inner.wait_duration_in_open_state;
        // The ring buffer is kept so that the metrics explain why the breaker opened.
        shared.phase = Phase::Open(clock::now().checked_add(delay));
        shared.not_permitted_calls = 0;
        tracing::warn!(
            breaker = %self.inner.name,
            failure_rate = ?shared.buffer.failure_rate(),
            ?delay,
            "circuit breaker opened"
        );
        self.inner.instrument.on_open(&delay);
    }

    fn transit_to_half_open(&self, shared: &mut Shared) {
        shared.phase = Phase::HalfOpen;
        shared.buffer = RingBuffer::new(self.inner.ring_buffer_size_in_half_open_state);
        shared.not_permitted_calls = 0;
        tracing::info!(breaker = %self.inner.name, "circuit breaker half open");
        self.inner.instrument.on_half_open();
    }

    fn transit_to_closed(&self, shared: &mut Shared) {
        shared.phase = Phase::Closed;
        shared.buffer = RingBuffer::new(self.inner.ring_buffer_size_in_closed_state);
        shared.not_permitted_calls = 0;
        tracing::info!(breaker = %self.inner.name, "circuit breaker closed");
        self.inner.instrument.on_closed();
    }
}

fn push(buffer: &mut RingBuffer, failed: bool) {
    if failed {
        buffer.record_failure()
    } else {
        buffer.record_success()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Perform `Closed` -> `Open` -> `HalfOpen` -> `Open` -> `HalfOpen` -> `Closed` transitions.
    #[test]
    fn state_machine() {
        clock::freeze(move |time| {
            let observe = Observer::new();
            let state_machine = Config::new()
                .ring_buffer_size_in_closed_state(4)
                .ring_buffer_size_in_half_open_state(2)
                .wait_duration_in_open_state(5.seconds())
                .instrument(observe.clone())
                .build("backend");

            // Perform success requests. the circuit breaker must be closed.
            for _i in 0..10 {
                assert!(state_machine.is_call_permitted());
                state_machine.on_success();
                assert!(observe.is_closed());
            }

            // Two failures out of the last four calls is a 50% failure rate.
            assert!(state_machine.is_call_permitted());
            state_machine.on_error();
            assert_eq!(State::Closed, state_machine.state());
            assert!(state_machine.is_call_permitted());
            state_machine.on_error();
            assert_eq!(State::Open, state_machine.state());
            assert!(observe.is_open());
            assert_eq!(2, state_machine.metrics().failed_calls());

            // Reject call attempts, the circuit breaker in open state.
            for i in 0..10 {
                assert!(!state_machine.is_call_permitted());
                assert_eq!(i + 1, observe.rejected_calls());
            }
            assert_eq!(10, state_machine.metrics().not_permitted_calls());

            // Wait 2s, the circuit breaker still open.
            time.advance(2.seconds());
            assert!(!state_machine.is_call_permitted());
            assert!(observe.is_open());

            // Wait 4s (6s total), the circuit breaker now in the half open state.
            time.advance(4.seconds());
            assert!(state_machine.is_call_permitted());
            assert!(observe.is_half_open());
            assert_eq!(2, state_machine.metrics().max_buffered_calls());

            // One failed probe out of two is enough to open again.
            state_machine.on_success();
            assert_eq!(State::HalfOpen, state_machine.state());
            state_machine.on_error();
            assert!(!state_machine.is_call_permitted());
            assert!(observe.is_open());

            // Wait 5s, the circuit breaker now in the half open state.
            time.advance(5.seconds());
            assert!(state_machine.is_call_permitted());
            assert!(observe.is_half_open());

            // Perform successful probes and transit to the closed state.
            state_machine.on_success();
            state_machine.on_success();
            assert!(state_machine.is_call_permitted());
            assert!(observe.is_closed());
            assert_eq!(0, state_machine.metrics().buffered_calls());
            assert_eq!(4, state_machine.metrics().max_buffered_calls());
        });
    }

    #[test]
    fn outcomes_while_open_are_ignored() {
        clock::freeze(|_| {
            let state_machine = Config::new()
                .ring_buffer_size_in_closed_state(1)
                .build("backend");

            state_machine.on_error();
            assert_eq!(State::Open, state_machine.state());

            state_machine.on_success();
            state_machine.on_error();
            let metrics = state_machine.metrics();
            assert_eq!(1, metrics.failed_calls());
            assert_eq!(0, metrics.successful_calls());
        });
    }

    #[test]
    fn unbounded_wait_duration_stays_open_until_reset() {
        clock::freeze(|time| {
            let state_machine = Config::new()
                .ring_buffer_size_in_closed_state(1)
                .wait_duration_in_open_state(Duration::MAX)
                .build("backend");

            state_machine.on_error();
            assert_eq!(State::Open, state_machine.state());

            time.advance((365 * 24 * 60 * 60).seconds());
            assert!(!state_machine.is_call_permitted());
            assert_eq!(1, state_machine.metrics().not_permitted_calls());

            state_machine.reset();
            assert!(state_machine.is_call_permitted());
            assert_eq!(State::Closed, state_machine.state());
        });
    }

    #[test]
    fn reset() {
        let state_machine = Config::new()
            .ring_buffer_size_in_closed_state(1)
            .build("backend");

        state_machine.on_error();
        assert_eq!(State::Open, state_machine.state());

        state_machine.reset();
        assert_eq!(State::Closed, state_machine.state());
        assert_eq!(0, state_machine.metrics().failed_calls());
        assert!(state_machine.is_call_permitted());
    }

    #[test]
    fn clones_share_state() {
        let state_machine = Config::new()
            .ring_buffer_size_in_closed_state(2)
            .build("backend");
        let other = state_machine.clone();

        state_machine.on_error();
        other.on_error();

        assert_eq!(State::Open, state_machine.state());
        assert_eq!("backend", other.name());
        assert_eq!(Some(100.0), other.metrics().failure_rate());
    }

    #[test]
    fn state_names() {
        assert_eq!("closed", State::Closed.to_string());
        assert_eq!("open", State::Open.to_string());
        assert_eq!("half_open", State::HalfOpen.to_string());
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Observed {
        Open,
        HalfOpen,
        Closed,
    }

    #[derive(Clone, Debug)]
    struct Observer {
        state: Arc<Mutex<Observed>>,
        rejected_calls: Arc<AtomicUsize>,
    }

    impl Observer {
        fn new() -> Self {
            Observer {
                state: Arc::new(Mutex::new(Observed::Closed)),
                rejected_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn is_closed(&self) -> bool {
            *self.state.lock() == Observed::Closed
        }

        fn is_open(&self) -> bool {
            *self.state.lock() == Observed::Open
        }

        fn is_half_open(&self) -> bool {
            *self.state.lock() == Observed::HalfOpen
        }

        fn rejected_calls(&self) -> usize {
            self.rejected_calls.load(Ordering::SeqCst)
        }
    }

    impl Instrument for Observer {
        fn on_call_rejected(&self) {
            self.rejected_calls.fetch_add(1, Ordering::SeqCst);
        }

        fn on_open(&self, _: &Duration) {
            *self.state.lock() = Observed::Open
        }

        fn on_half_open(&self) {
            *self.state.lock() = Observed::HalfOpen
        }

        fn on_closed(&self) {
            *self.state.lock() = Observed::Closed
        }
    }

    trait IntoDuration {
        fn seconds(self) -> Duration;
    }

    impl IntoDuration for u64 {
        fn seconds(self) -> Duration {
            Duration::from_secs(self)
        }
    }
}
