//! Type-state builder for `LineSensors`.
//!
//! The builder enforces at compile time that pins and an emitter are provided
//! before `build()` is available. `try_build()` is always available for
//! dynamic checks. All calibration storage is reserved here, so a failed
//! reservation surfaces from the builder and never from a sensor operation.

use std::marker::PhantomData;

use rcsense_traits::{Emitter, MicrosClock, MonotonicClock, RcPins};
use tracing::info;

use crate::calibration::{CalibrationBounds, CalibrationStore, reserve_filled};
use crate::config::{MAX_CHANNELS, TimingCfg};
use crate::error::{BuildError, Result};
use crate::line::LineSensors;
use crate::mode::ReadMode;
use crate::position::LinePositionEstimator;
use crate::pulse::PulseTimer;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `LineSensors`. All fields are validated on `build()`.
pub struct LineSensorsBuilder<P, E, C, Sp = Missing, Se = Missing> {
    pins: Option<P>,
    emitter: Option<E>,
    clock: C,
    timing: TimingCfg,
    expected_channels: Option<usize>,
    calibration: Vec<(ReadMode, CalibrationBounds)>,
    _state: PhantomData<(Sp, Se)>,
}

impl<P, E> Default for LineSensorsBuilder<P, E, MonotonicClock> {
    fn default() -> Self {
        Self {
            pins: None,
            emitter: None,
            clock: MonotonicClock::new(),
            timing: TimingCfg::default(),
            expected_channels: None,
            calibration: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl<P, E, C, Sp, Se> LineSensorsBuilder<P, E, C, Sp, Se> {
    fn retype<Sp2, Se2>(self) -> LineSensorsBuilder<P, E, C, Sp2, Se2> {
        LineSensorsBuilder {
            pins: self.pins,
            emitter: self.emitter,
            clock: self.clock,
            timing: self.timing,
            expected_channels: self.expected_channels,
            calibration: self.calibration,
            _state: PhantomData,
        }
    }

    pub fn with_pins(mut self, pins: P) -> LineSensorsBuilder<P, E, C, Set, Se> {
        self.pins = Some(pins);
        self.retype()
    }

    pub fn with_emitter(mut self, emitter: E) -> LineSensorsBuilder<P, E, C, Sp, Set> {
        self.emitter = Some(emitter);
        self.retype()
    }

    /// Swap the time source (defaults to `MonotonicClock`).
    pub fn with_clock<C2>(self, clock: C2) -> LineSensorsBuilder<P, E, C2, Sp, Se> {
        LineSensorsBuilder {
            pins: self.pins,
            emitter: self.emitter,
            clock,
            timing: self.timing,
            expected_channels: self.expected_channels,
            calibration: self.calibration,
            _state: PhantomData,
        }
    }

    #[must_use]
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = timing;
        self
    }

    /// Clamped to 32767 µs at build time.
    #[must_use]
    pub fn with_timeout_us(mut self, timeout_us: u16) -> Self {
        self.timing.timeout_us = timeout_us;
        self
    }

    /// Require the pins to provide exactly `n` channels.
    #[must_use]
    pub fn with_channels(mut self, n: usize) -> Self {
        self.expected_channels = Some(n);
        self
    }

    /// Start with persisted bounds for `mode` already installed.
    #[must_use]
    pub fn with_calibration(mut self, mode: ReadMode, bounds: CalibrationBounds) -> Self {
        self.calibration.push((mode, bounds));
        self
    }
}

impl<P, E, C, Sp, Se> LineSensorsBuilder<P, E, C, Sp, Se>
where
    P: RcPins,
    E: Emitter,
    C: MicrosClock,
{
    pub fn try_build(self) -> Result<LineSensors<P, E, C>> {
        let pins = self
            .pins
            .ok_or_else(|| eyre::Report::new(BuildError::MissingPins))?;
        let emitter = self
            .emitter
            .ok_or_else(|| eyre::Report::new(BuildError::MissingEmitter))?;

        let channels = pins.channel_count();
        if channels == 0 {
            return Err(eyre::Report::new(BuildError::NoChannels));
        }
        if channels > MAX_CHANNELS {
            return Err(eyre::Report::new(BuildError::TooManyChannels(channels)));
        }
        if let Some(expected) = self.expected_channels
            && expected != channels
        {
            return Err(eyre::Report::new(BuildError::ChannelCountMismatch {
                expected,
                actual: channels,
            }));
        }

        let timer = PulseTimer::from(self.timing.clamped());
        let mut calibration = CalibrationStore::try_new(channels, timer.timeout())?;
        for (mode, bounds) in self.calibration {
            if !mode.is_automatic() {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "calibration cannot be installed for manual mode",
                )));
            }
            if bounds.len() != channels {
                return Err(eyre::Report::new(BuildError::ChannelCountMismatch {
                    expected: channels,
                    actual: bounds.len(),
                }));
            }
            calibration.install(mode, bounds);
        }

        let sensors = LineSensors {
            pins,
            emitter,
            clock: self.clock,
            timer,
            calibration,
            estimator: LinePositionEstimator::new(),
            scratch: reserve_filled(channels, 0)?,
            batch_min: reserve_filled(channels, 0)?,
            batch_max: reserve_filled(channels, 0)?,
        };
        info!(
            channels,
            timeout_us = timer.timeout(),
            charge_us = timer.charge_us(),
            "line sensors ready"
        );
        Ok(sensors)
    }
}

impl<P, E, C> LineSensorsBuilder<P, E, C, Set, Set>
where
    P: RcPins,
    E: Emitter,
    C: MicrosClock,
{
    pub fn build(self) -> Result<LineSensors<P, E, C>> {
        self.try_build()
    }
}
