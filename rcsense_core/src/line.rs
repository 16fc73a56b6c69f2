//! Reflectance line sensor array.
//!
//! `LineSensors` owns its pins, emitter and clock. Sensor operations never
//! fail: timeouts are data, and reads that need a missing calibration leave
//! the caller's buffer untouched.

use rcsense_traits::{Emitter, MicrosClock, MonotonicClock, RcPins};
use tracing::{debug, warn};

use crate::builder::LineSensorsBuilder;
use crate::calibration::{CALIBRATION_BATCH, CalibrationBounds, CalibrationStore};
use crate::mode::ReadMode;
use crate::position::LinePositionEstimator;
use crate::pulse::PulseTimer;

pub struct LineSensors<P, E, C = MonotonicClock> {
    pub(crate) pins: P,
    pub(crate) emitter: E,
    pub(crate) clock: C,
    pub(crate) timer: PulseTimer,
    pub(crate) calibration: CalibrationStore,
    pub(crate) estimator: LinePositionEstimator,
    // reserved at build time, one slot per channel
    pub(crate) scratch: Box<[u16]>,
    pub(crate) batch_min: Box<[u16]>,
    pub(crate) batch_max: Box<[u16]>,
}

impl<P, E, C> core::fmt::Debug for LineSensors<P, E, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LineSensors")
            .field("channels", &self.calibration.channels())
            .field("timeout_us", &self.timer.timeout())
            .field("last_position", &self.estimator.last_position())
            .finish_non_exhaustive()
    }
}

impl<P, E> LineSensors<P, E, MonotonicClock> {
    /// Start building a sensor array.
    pub fn builder() -> LineSensorsBuilder<P, E, MonotonicClock> {
        LineSensorsBuilder::default()
    }
}

impl<P, E, C> LineSensors<P, E, C>
where
    P: RcPins,
    E: Emitter,
    C: MicrosClock,
{
    pub fn channel_count(&self) -> usize {
        self.calibration.channels()
    }

    pub fn timeout(&self) -> u16 {
        self.timer.timeout()
    }

    /// Values above 32767 µs are clamped. Existing calibration is kept.
    pub fn set_timeout(&mut self, timeout_us: u16) {
        let stored = self.timer.set_timeout(timeout_us);
        if stored != timeout_us {
            warn!(requested = timeout_us, stored, "line timeout clamped");
        }
    }

    /// Light the emitters for `Manual` reads.
    pub fn emitters_on(&mut self) {
        self.emitter.activate();
    }

    pub fn emitters_off(&mut self) {
        self.emitter.deactivate();
    }

    fn read_raw(
        timer: &PulseTimer,
        pins: &mut P,
        emitter: &mut E,
        clock: &C,
        out: &mut [u16],
        mode: ReadMode,
    ) {
        match mode {
            ReadMode::On => {
                emitter.activate();
                timer.measure(pins, clock, out);
                emitter.deactivate();
            }
            ReadMode::Off => {
                emitter.deactivate();
                timer.measure(pins, clock, out);
            }
            ReadMode::Manual => timer.measure(pins, clock, out),
        }
    }

    /// Raw discharge times, one per channel, each in `[0, timeout]`.
    pub fn read(&mut self, out: &mut [u16], mode: ReadMode) {
        Self::read_raw(
            &self.timer,
            &mut self.pins,
            &mut self.emitter,
            &self.clock,
            out,
            mode,
        );
    }

    /// Run one calibration batch for `mode`. No-op for `Manual`.
    pub fn calibrate(&mut self, mode: ReadMode) {
        let Self {
            pins,
            emitter,
            clock,
            timer,
            calibration,
            scratch,
            batch_min,
            batch_max,
            ..
        } = self;
        let timeout = timer.timeout();
        let Some(bounds) = calibration.ensure_initialized(mode, timeout) else {
            return;
        };

        batch_min.fill(timeout);
        batch_max.fill(0);
        for _ in 0..CALIBRATION_BATCH {
            Self::read_raw(timer, pins, emitter, clock, scratch, mode);
            for ((v, lo), hi) in scratch.iter().zip(batch_min.iter_mut()).zip(batch_max.iter_mut()) {
                *lo = (*lo).min(*v);
                *hi = (*hi).max(*v);
            }
        }

        if bounds.fold_batch(batch_min, batch_max) {
            debug!(
                %mode,
                minimum = ?bounds.minimum(),
                maximum = ?bounds.maximum(),
                "calibration bounds moved"
            );
        }
    }

    /// Reseed every calibration set (`maximum = 0`, `minimum = timeout`).
    pub fn reset_calibration(&mut self) {
        self.calibration.reset(self.timer.timeout());
    }

    /// Calibrated values in `[0, 1000]`.
    ///
    /// `Manual`, or a mode that has never been calibrated, leaves `out`
    /// untouched.
    pub fn read_calibrated(&mut self, out: &mut [u16], mode: ReadMode) {
        let Self {
            pins,
            emitter,
            clock,
            timer,
            calibration,
            ..
        } = self;
        let Some(bounds) = calibration.get(mode) else {
            return;
        };
        Self::read_raw(timer, pins, emitter, clock, out, mode);
        for (ch, v) in out.iter_mut().enumerate().take(bounds.len()) {
            *v = bounds.normalize(ch, *v);
        }
    }

    /// Line position in `[0, 1000 * (channels - 1)]`; `Manual` returns 0
    /// without reading.
    ///
    /// `out` receives the calibrated values. If `mode` was never calibrated
    /// the estimate is computed from whatever `out` already holds.
    pub fn read_line(&mut self, out: &mut [u16], mode: ReadMode, invert: bool) -> u16 {
        if !mode.is_automatic() {
            return 0;
        }
        self.read_calibrated(out, mode);
        let n = out.len().min(self.channel_count());
        self.estimator.estimate(&out[..n], invert)
    }

    /// Dark line on a light surface.
    pub fn read_line_black(&mut self, out: &mut [u16], mode: ReadMode) -> u16 {
        self.read_line(out, mode, false)
    }

    /// Light line on a dark surface.
    pub fn read_line_white(&mut self, out: &mut [u16], mode: ReadMode) -> u16 {
        self.read_line(out, mode, true)
    }

    pub fn last_position(&self) -> u16 {
        self.estimator.last_position()
    }

    /// Bounds for `mode`; `None` until that mode is calibrated or installed.
    pub fn calibration(&self, mode: ReadMode) -> Option<&CalibrationBounds> {
        self.calibration.get(mode)
    }

    /// Install persisted bounds. Ignored for `Manual` or a channel count mismatch.
    pub fn set_calibration(&mut self, mode: ReadMode, bounds: CalibrationBounds) -> bool {
        self.calibration.install(mode, bounds)
    }

    /// Give back the hardware handles.
    pub fn into_parts(self) -> (P, E, C) {
        (self.pins, self.emitter, self.clock)
    }
}
