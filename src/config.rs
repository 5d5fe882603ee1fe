use std::time::Duration;

use super::state_machine::{Instrument, StateMachine};

const DEFAULT_FAILURE_RATE_THRESHOLD: f32 = 50.0;
const DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE: usize = 100;
const DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE: usize = 10;
const DEFAULT_WAIT_DURATION_IN_OPEN_STATE: Duration = Duration::from_secs(60);

/// A circuit breaker's configuration.
#[derive(Debug, Clone)]
pub struct Config<INSTRUMENT> {
    pub(crate) failure_rate_threshold: f32,
    pub(crate) ring_buffer_size_in_closed_state: usize,
    pub(crate) ring_buffer_size_in_half_open_state: usize,
    pub(crate) wait_duration_in_open_state: Duration,
    pub(crate) instrument: INSTRUMENT,
}

impl Config<()> {
    /// Creates a new circuit breaker's default configuration.
    ///
    /// A 50% failure rate over the last 100 calls opens the breaker for 60 seconds, after which
    /// 10 probe calls decide whether it closes again.
    pub fn new() -> Config<()> {
        Config {
            failure_rate_threshold: DEFAULT_FAILURE_RATE_THRESHOLD,
            ring_buffer_size_in_closed_state: DEFAULT_RING_BUFFER_SIZE_IN_CLOSED_STATE,
            ring_buffer_size_in_half_open_state: DEFAULT_RING_BUFFER_SIZE_IN_HALF_OPEN_STATE,
            wait_duration_in_open_state: DEFAULT_WAIT_DURATION_IN_OPEN_STATE,
            instrument: (),
        }
    }
}

impl Default for Config<()> {
    fn default() -> Self {
        Config::new()
    }
}

impl<INSTRUMENT> Config<INSTRUMENT> {
    /// Configures the failure rate, in percent, at or above which the breaker opens.
    ///
    /// # Panics
    ///
    /// * When `threshold` isn't in range (0;100].
    pub fn failure_rate_threshold(mut self, threshold: f32) -> Self {
        assert!(
            threshold > 0.0 && threshold <= 100.0,
            "failure rate threshold must be in (0;100]"
        );
        self.failure_rate_threshold = threshold;
        self
    }

    /// Configures how many outcomes are kept while closed.
    ///
    /// # Panics
    ///
    /// * When `size` is zero.
    pub fn ring_buffer_size_in_closed_state(mut self, size: usize) -> Self {
        assert!(size > 0, "ring buffer size in closed state must be positive");
        self.ring_buffer_size_in_closed_state = size;
        self
    }

    /// Configures how many probe outcomes decide the next state while half open.
    ///
    /// # Panics
    ///
    /// * When `size` is zero.
    pub fn ring_buffer_size_in_half_open_state(mut self, size: usize) -> Self {
        assert!(size > 0, "ring buffer size in half open state must be positive");
        self.ring_buffer_size_in_half_open_state = size;
        self
    }

    /// Configures how long the breaker rejects calls before moving to half open.
    ///
    /// A duration too large to add to the current instant, e.g. `Duration::MAX`, keeps an opened
    /// breaker open until [`StateMachine::reset`].
    ///
    /// # Panics
    ///
    /// * When `duration` is shorter than one millisecond.
    pub fn wait_duration_in_open_state(mut self, duration: Duration) -> Self {
        assert!(
            duration >= Duration::from_millis(1),
            "wait duration in open state must be at least 1ms"
        );
        self.wait_duration_in_open_state = duration;
        self
    }

    /// Configures `Instrument` for a circuit breaker.
    pub fn instrument<T>(self, instrument: T) -> Config<T>
    where
        T: Instrument,
    {
        Config {
            failure_rate_threshold: self.failure_rate_threshold,
            ring_buffer_size_in_closed_state: self.ring_buffer_size_in_closed_state,
            ring_buffer_size_in_half_open_state: self.ring_buffer_size_in_half_open_state,
            wait_duration_in_open_state: self.wait_duration_in_open_state,
            instrument,
        }
    }

    /// Builds a new circuit breaker instance with the given name.
    pub fn build(self, name: impl Into<String>) -> StateMachine<INSTRUMENT>
    where
        INSTRUMENT: Instrument,
    {
        StateMachine::new(name, self)
    }
}
