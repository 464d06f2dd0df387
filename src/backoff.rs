//! Exponential backoff for waiting on the object store.

use std::time::Duration;

/// How long to wait between attempts, and for how long in total.
///
/// The delay starts at `initial` and doubles after every attempt, up to
/// `max_delay`. The sum of all delays never exceeds `max_wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max_delay: Duration,
    max_wait: Duration,
}

impl Backoff {
    /// Create a new backoff policy.
    pub fn new(initial: Duration, max_delay: Duration, max_wait: Duration) -> Self {
        Self {
            initial,
            max_delay: max_delay.max(initial),
            max_wait,
        }
    }

    /// The first delay.
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// The longest total time the delays add up to.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// The sequence of delays to sleep between attempts.
    pub fn delays(&self) -> Delays {
        Delays {
            next: self.initial,
            max_delay: self.max_delay,
            remaining: self.max_wait,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(100),
            Duration::from_secs(5),
            Duration::from_secs(120),
        )
    }
}

/// Iterator over the delays of a [`Backoff`].
#[derive(Debug, Clone)]
pub struct Delays {
    next: Duration,
    max_delay: Duration,
    remaining: Duration,
}

impl Iterator for Delays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining.is_zero() || self.next.is_zero() {
            return None;
        }
        let delay = self.next.min(self.remaining);
        self.remaining -= delay;
        self.next = (self.next * 2).min(self.max_delay);
        Some(delay)
    }
}

#[cfg(test)]
mod test {
    use super::Backoff;
    use std::time::Duration;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn doubles_up_to_max_delay() {
        let backoff = Backoff::new(ms(100), ms(500), ms(10_000));
        let delays: Vec<Duration> = backoff.delays().take(5).collect();
        assert_eq!(delays, vec![ms(100), ms(200), ms(400), ms(500), ms(500)]);
    }

    #[test]
    fn total_is_bounded() {
        let backoff = Backoff::new(ms(100), ms(1000), ms(1000));
        let delays: Vec<Duration> = backoff.delays().collect();
        assert_eq!(delays, vec![ms(100), ms(200), ms(400), ms(300)]);
        assert_eq!(delays.iter().sum::<Duration>(), backoff.max_wait());
    }

    #[test]
    fn zero_wait_gives_no_delays() {
        let backoff = Backoff::new(ms(100), ms(1000), Duration::ZERO);
        assert_eq!(backoff.delays().count(), 0);
    }
}
