use std::time::{Duration, Instant};

/// Microsecond clock used by the RC pulse-timing loop.
///
/// - now_us(): free-running counter that wraps at 2^32
/// - delay_us(): waits for the given number of microseconds (implementations may simulate)
/// - us_since(): elapsed microseconds from a previous `now_us()` value, wrap-safe
pub trait MicrosClock {
    fn now_us(&self) -> u32;
    fn delay_us(&self, us: u32);

    /// Microseconds elapsed since `start`. Correct across a single wrap of the counter.
    #[inline]
    fn us_since(&self, start: u32) -> u32 {
        self.now_us().wrapping_sub(start)
    }
}

impl<C: MicrosClock + ?Sized> MicrosClock for Box<C> {
    #[inline]
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }

    #[inline]
    fn delay_us(&self, us: u32) {
        (**self).delay_us(us);
    }
}

/// Real-time clock backed by `std::time::Instant`, counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl MicrosClock for MonotonicClock {
    #[inline]
    fn now_us(&self) -> u32 {
        // Truncation is the wrap.
        self.origin.elapsed().as_micros() as u32
    }

    /// Busy-waits; a 10 µs charge pulse is far below scheduler granularity.
    fn delay_us(&self, us: u32) {
        if us == 0 {
            return;
        }
        let start = Instant::now();
        let d = Duration::from_micros(u64::from(us));
        while start.elapsed() < d {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Clock pinned to a fixed counter value.
    struct FixedClock(Cell<u32>);

    impl MicrosClock for FixedClock {
        fn now_us(&self) -> u32 {
            self.0.get()
        }
        fn delay_us(&self, us: u32) {
            self.0.set(self.0.get().wrapping_add(us));
        }
    }

    #[test]
    fn us_since_survives_counter_wrap() {
        let clock = FixedClock(Cell::new(u32::MAX - 9));
        let start = clock.now_us();
        clock.delay_us(25);
        assert_eq!(clock.us_since(start), 25);
    }

    #[test]
    fn monotonic_clock_delay_waits_at_least_requested() {
        let clock = MonotonicClock::new();
        let start = clock.now_us();
        clock.delay_us(200);
        assert!(clock.us_since(start) >= 200);
    }

    #[test]
    fn boxed_clock_forwards() {
        let clock: Box<dyn MicrosClock> = Box::new(FixedClock(Cell::new(7)));
        assert_eq!(clock.now_us(), 7);
        clock.delay_us(3);
        assert_eq!(clock.now_us(), 10);
    }
}
