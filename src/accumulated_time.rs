//! Measure accumulated time for various operations.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Accumulated times for different clocks.
///
/// The caller defines a clock type, usually an enum.
/// `AccumulatedTime` accumulates time for each possible clock.
/// Conceptually, every type of clock exists. If a type of clock
/// never gets any time added, it measures at 0 accumulated time.
///
/// Time can be added from several threads at once. Concurrent spans on
/// the same clock all count, so with several workers a clock can
/// accumulate more than the wall clock time of the run.
#[derive(Debug)]
pub struct AccumulatedTime<T> {
    accumulated: Mutex<HashMap<T, Duration>>,
}

impl<T: Eq + PartialEq + Hash + Copy> AccumulatedTime<T> {
    /// Create a new accumulated time collector.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            accumulated: Mutex::new(HashMap::new()),
        }
    }

    /// Add a span of time to a clock.
    pub fn add(&self, clock: T, span: Duration) {
        let mut map = self.accumulated.lock().unwrap();
        *map.entry(clock).or_insert(Duration::ZERO) += span;
    }

    /// Run a function, adding the time it takes to a clock.
    pub fn measure<R>(&self, clock: T, f: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = f();
        self.add(clock, started.elapsed());
        result
    }

    /// Return the accumulated time for a type of clock.
    pub fn duration(&self, clock: T) -> Duration {
        let map = self.accumulated.lock().unwrap();
        map.get(&clock).copied().unwrap_or(Duration::ZERO)
    }
}
