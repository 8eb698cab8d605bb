//! Host frame clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::constants::*;

/// Clock frequency, in hertz (per second)
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Hz(pub u64);

impl From<Hz> for Duration {
    fn from(freq: Hz) -> Self {
        if freq.0 == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(NANOS_IN_SECOND / freq.0)
        }
    }
}

/// Timer to synchronize a host loop with the 60 Hz frame rate of the machine.
///
/// The machine itself has no notion of time. Hosts use this clock to decide
/// when to run the next frame of instructions and count down the timers.
pub struct Clock {
    interval: Duration,
    last_tick: Instant,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(freq: Hz) -> Self {
        Self {
            interval: freq.into(),
            last_tick: Instant::now(),
        }
    }

    /// Clock running at the rate the delay and sound timers count down.
    pub fn timers() -> Self {
        Self::new(Hz(DELAY_FREQUENCY))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last_tick = Instant::now()
    }

    /// Check whether a clock cycle has elapsed, without blocking.
    pub fn tick(&mut self) -> bool {
        if self.last_tick.elapsed() >= self.interval {
            self.last_tick += self.interval;
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        loop {
            let elapsed = self.last_tick.elapsed();
            if elapsed < self.interval {
                // Sleep does not have enough resolution, and causes
                // the clock to run at 30 FPS.
                //
                // Yielding in a loop is the best alternative.
                thread::yield_now();
            } else {
                // Reset back to zero, rather than trying to catch up.
                //
                // If the host was paused, and a large amount of time has
                // elapsed until it is resumed, it should simply continue
                // at the next cycle running at its usual speed.
                self.reset();
                return;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_hz() {
        let interval: Duration = Hz(60).into();
        assert_eq!(interval.as_millis(), 16);

        let interval: Duration = Hz(0).into();
        assert_eq!(interval, Duration::ZERO);
    }

    #[test]
    fn test_unbounded_clock_always_ticks() {
        let mut clock = Clock::new(Hz(0));
        assert!(clock.tick());
        assert!(clock.tick());
        clock.wait();
    }

    #[test]
    fn test_clock_waits_for_interval() {
        let start = Instant::now();
        let mut clock = Clock::new(Hz(1000));
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(1));
    }
}
