use std::time::{Duration, Instant};

use super::clock;

/// Measures the processing duration of a single call.
#[derive(Debug)]
pub struct StopWatch {
    name: String,
    started: Instant,
}

impl StopWatch {
    /// Starts measuring, labelled with the circuit breaker's name.
    pub fn start(name: impl Into<String>) -> Self {
        StopWatch {
            name: name.into(),
            started: clock::now(),
        }
    }

    /// The label given at start.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops measuring and returns the elapsed duration.
    pub fn stop(self) -> Duration {
        let elapsed = clock::now().saturating_duration_since(self.started);
        tracing::trace!(breaker = %self.name, ?elapsed, "stopwatch stopped");
        elapsed
    }
}
