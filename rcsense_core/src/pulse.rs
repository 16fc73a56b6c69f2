//! RC discharge timing.
//!
//! One pass charges every channel, releases them together and polls until
//! each has discharged or the timeout elapses. All channels share one start
//! time. A channel that never reads low reports exactly the timeout.

use rcsense_traits::{InterruptHold, MicrosClock, RcPins};
use tracing::trace;

use crate::config::{DEFAULT_CHARGE_US, DEFAULT_TIMEOUT_US, MAX_TIMEOUT_US, TimingCfg};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseTimer {
    timeout_us: u16,
    charge_us: u16,
}

impl Default for PulseTimer {
    fn default() -> Self {
        Self {
            timeout_us: DEFAULT_TIMEOUT_US,
            charge_us: DEFAULT_CHARGE_US,
        }
    }
}

impl From<TimingCfg> for PulseTimer {
    fn from(c: TimingCfg) -> Self {
        Self::new(c.timeout_us, c.charge_us)
    }
}

impl PulseTimer {
    /// The timeout is clamped to 32767 µs.
    pub fn new(timeout_us: u16, charge_us: u16) -> Self {
        Self {
            timeout_us: timeout_us.min(MAX_TIMEOUT_US),
            charge_us,
        }
    }

    #[inline]
    pub fn timeout(&self) -> u16 {
        self.timeout_us
    }

    #[inline]
    pub fn charge_us(&self) -> u16 {
        self.charge_us
    }

    /// Returns the stored (clamped) timeout.
    pub fn set_timeout(&mut self, timeout_us: u16) -> u16 {
        self.timeout_us = timeout_us.min(MAX_TIMEOUT_US);
        self.timeout_us
    }

    /// Time one pass over the first `out.len()` channels of `pins`.
    ///
    /// Every slot of `out` ends in `[0, timeout]`.
    pub fn measure<P, C>(&self, pins: &mut P, clock: &C, out: &mut [u16])
    where
        P: RcPins + ?Sized,
        C: MicrosClock + ?Sized,
    {
        let n = out.len().min(pins.channel_count());
        let out = &mut out[..n];
        let timeout = self.timeout_us;

        for ch in 0..n {
            pins.drive_high(ch);
        }
        clock.delay_us(u32::from(self.charge_us));
        out.fill(timeout);

        let start = {
            let mut held = InterruptHold::new(pins);
            let start = clock.now_us();
            for ch in 0..n {
                held.set_input(ch);
            }
            start
        };

        loop {
            let mut held = InterruptHold::new(pins);
            let elapsed = clock.us_since(start);
            if elapsed >= u32::from(timeout) {
                break;
            }
            // elapsed < timeout <= u16::MAX here
            let elapsed = elapsed as u16;
            let mut pending = false;
            for (ch, slot) in out.iter_mut().enumerate() {
                if elapsed < *slot && !held.is_high(ch) {
                    *slot = elapsed;
                }
                pending |= *slot == timeout;
            }
            if !pending {
                break;
            }
            drop(held);
            core::hint::spin_loop();
        }

        trace!(channels = n, timeout_us = timeout, values = ?out, "pulse pass");
    }
}
