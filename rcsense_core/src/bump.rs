//! Two-channel bump sensors.
//!
//! The bump contacts are timed like reflectance channels; pressing one slows
//! its discharge. A side counts as pressed once its reading reaches a
//! threshold set a margin above the calibrated resting baseline.

use rcsense_traits::{Emitter, MicrosClock, MonotonicClock, RcPins};
use tracing::{debug, warn};

use crate::config::BumpCfg;
use crate::error::{BuildError, Result};
use crate::pulse::PulseTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BumpSide {
    Left = 0,
    Right = 1,
}

impl BumpSide {
    pub const ALL: [Self; 2] = [Self::Left, Self::Right];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this side in the field returned by `BumpSensors::read`.
    #[inline]
    pub const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

pub struct BumpSensors<P, E, C = MonotonicClock> {
    pins: P,
    emitter: E,
    clock: C,
    timer: PulseTimer,
    margin_percentage: u16,
    raw: [u16; 2],
    baseline: [u16; 2],
    threshold: [u16; 2],
    pressed: u8,
    last: u8,
}

impl<P, E, C> core::fmt::Debug for BumpSensors<P, E, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BumpSensors")
            .field("baseline", &self.baseline)
            .field("threshold", &self.threshold)
            .field("pressed", &self.pressed)
            .finish_non_exhaustive()
    }
}

impl<P, E, C> BumpSensors<P, E, C>
where
    P: RcPins,
    E: Emitter,
    C: MicrosClock,
{
    /// `pins` must expose exactly two channels: left, then right.
    ///
    /// Until `calibrate` runs, the baseline is 0 and the threshold equals the
    /// timeout, so only a timed-out reading counts as pressed.
    pub fn new(pins: P, emitter: E, clock: C, cfg: BumpCfg) -> Result<Self> {
        let actual = pins.channel_count();
        if actual != 2 {
            return Err(eyre::Report::new(BuildError::ChannelCountMismatch {
                expected: 2,
                actual,
            }));
        }
        let timer = PulseTimer::from(cfg.timing.clamped());
        Ok(Self {
            pins,
            emitter,
            clock,
            timer,
            margin_percentage: cfg.margin_percentage,
            raw: [0; 2],
            baseline: [0; 2],
            threshold: [timer.timeout(); 2],
            pressed: 0,
            last: 0,
        })
    }

    fn read_raw(&mut self) {
        self.emitter.activate();
        self.timer
            .measure(&mut self.pins, &self.clock, &mut self.raw);
        self.emitter.deactivate();
    }

    /// Average `count` resting reads per side into the baseline and derive
    /// the thresholds. `count == 0` does nothing.
    pub fn calibrate(&mut self, count: u8) {
        if count == 0 {
            return;
        }
        let mut sum = [0u32; 2];
        for _ in 0..count {
            self.read_raw();
            for (s, v) in sum.iter_mut().zip(self.raw) {
                *s += u32::from(v);
            }
        }

        let count = u32::from(count);
        let timeout = u32::from(self.timer.timeout());
        let margin = u32::from(self.margin_percentage);
        for side in BumpSide::ALL {
            let i = side.index();
            // averages of u16 readings fit in u16
            let baseline = (sum[i] + count / 2) / count;
            let threshold = (baseline + baseline * margin / 100).min(timeout);
            self.baseline[i] = baseline as u16;
            self.threshold[i] = threshold as u16;
        }
        debug!(
            baseline = ?self.baseline,
            threshold = ?self.threshold,
            samples = count,
            "bump sensors calibrated"
        );
    }

    /// One timed read. Returns the pressed bit field (bit 0 left, bit 1 right).
    pub fn read(&mut self) -> u8 {
        self.read_raw();
        self.last = self.pressed;
        let mut bits = 0u8;
        for side in BumpSide::ALL {
            if self.raw[side.index()] >= self.threshold[side.index()] {
                bits |= side.bit();
            }
        }
        self.pressed = bits;
        bits
    }

    #[inline]
    pub fn is_pressed(&self, side: BumpSide) -> bool {
        self.pressed & side.bit() != 0
    }

    /// Whether `side` changed between the last two reads.
    #[inline]
    pub fn changed(&self, side: BumpSide) -> bool {
        (self.pressed ^ self.last) & side.bit() != 0
    }

    pub fn baseline(&self, side: BumpSide) -> u16 {
        self.baseline[side.index()]
    }

    pub fn threshold(&self, side: BumpSide) -> u16 {
        self.threshold[side.index()]
    }

    /// Reading from the most recent pass.
    pub fn raw(&self, side: BumpSide) -> u16 {
        self.raw[side.index()]
    }

    pub fn margin_percentage(&self) -> u16 {
        self.margin_percentage
    }

    /// Takes effect at the next `calibrate`.
    pub fn set_margin_percentage(&mut self, margin: u16) {
        self.margin_percentage = margin;
    }

    pub fn timeout(&self) -> u16 {
        self.timer.timeout()
    }

    /// Clamped to 32767 µs. Thresholds above the new timeout drop to it so a
    /// timed-out read still counts as pressed; `calibrate` recomputes them.
    pub fn set_timeout(&mut self, timeout_us: u16) {
        let stored = self.timer.set_timeout(timeout_us);
        if stored != timeout_us {
            warn!(requested = timeout_us, stored, "bump timeout clamped");
        }
        self.threshold = self.threshold.map(|t| t.min(stored));
    }

    pub fn into_parts(self) -> (P, E, C) {
        (self.pins, self.emitter, self.clock)
    }
}
