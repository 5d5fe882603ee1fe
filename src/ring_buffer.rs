/// A fixed-size record of the most recent call outcomes.
///
/// Once full, each new outcome overwrites the oldest one.
#[derive(Debug, Clone)]
pub(crate) struct RingBuffer {
    // `true` marks a failed call.
    slots: Vec<bool>,
    index: usize,
    len: usize,
    failures: usize,
}

impl RingBuffer {
    /// Creates an empty buffer.
    ///
    /// # Panics
    ///
    /// * When `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");

        RingBuffer {
            slots: vec![false; capacity],
            index: 0,
            len: 0,
            failures: 0,
        }
    }

    /// Records a successful call.
    pub fn record_success(&mut self) {
        self.push(false)
    }

    /// Records a failed call.
    pub fn record_failure(&mut self) {
        self.push(true)
    }

    /// Returns the failure rate in percent, or `None` while the buffer is not yet full.
    pub fn failure_rate(&self) -> Option<f32> {
        if !self.is_full() {
            return None;
        }
        Some(self.failures as f32 * 100.0 / self.len as f32)
    }

    pub fn is_full(&self) -> bool {
        self.len == self.slots.len()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    pub fn successes(&self) -> usize {
        self.len - self.failures
    }

    fn push(&mut self, failed: bool) {
        if self.is_full() {
            if self.slots[self.index] {
                self.failures -= 1;
            }
        } else {
            self.len += 1;
        }

        self.slots[self.index] = failed;
        if failed {
            self.failures += 1;
        }
        self.index = (self.index + 1) % self.slots.len();
    }
}
