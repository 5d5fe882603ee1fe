//! A mockable source of monotonic time.
//!
//! Stopwatches and the circuit breaker's open-state deadline read time through [`now`], which
//! normally returns `Instant::now()`. Inside [`freeze`] the current thread observes a frozen
//! instant instead, moved forward only via [`MockClock::advance`].

use std::cell::Cell;
use std::marker::PhantomData;
use std::time::{Duration, Instant};

thread_local!(static FROZEN: Cell<Option<Instant>> = Cell::new(None));

/// A handle to the frozen clock of the current thread.
#[derive(Debug)]
pub struct MockClock {
    // Tied to the thread which froze the clock.
    _not_send: PhantomData<*const ()>,
}

impl MockClock {
    /// Returns the frozen instant.
    pub fn now(&self) -> Instant {
        now()
    }

    /// Moves the frozen instant forward.
    pub fn advance(&mut self, diff: Duration) {
        FROZEN.with(|cell| {
            if let Some(instant) = cell.get() {
                cell.set(Some(instant + diff));
            }
        })
    }
}

/// Freezes the time of the current thread for the duration of `f`.
///
/// # Panics
///
/// * When the clock is already frozen on this thread.
pub fn freeze<F, R>(f: F) -> R
where
    F: FnOnce(&mut MockClock) -> R,
{
    FROZEN.with(|cell| {
        assert!(
            cell.get().is_none(),
            "clock already frozen for this thread"
        );

        // Unfreeze on the way out, including unwinding.
        struct Thaw<'a>(&'a Cell<Option<Instant>>);

        impl<'a> Drop for Thaw<'a> {
            fn drop(&mut self) {
                self.0.set(None);
            }
        }

        cell.set(Some(Instant::now()));
        let _thaw = Thaw(cell);

        let mut clock = MockClock {
            _not_send: PhantomData,
        };
        f(&mut clock)
    })
}

/// Returns the current instant, honoring a frozen clock.
pub fn now() -> Instant {
    FROZEN.with(|cell| cell.get()).unwrap_or_else(Instant::now)
}
