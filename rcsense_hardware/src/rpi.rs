//! Raspberry Pi GPIO backend (rppal).
//!
//! Timing runs in userspace, so there is nothing to mask in
//! `suspend_interrupts`; pair this backend with the CLI's `--rt` mode for
//! stable readings.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rcsense_traits::{Emitter, RcPins};
use rppal::gpio::{Gpio, IoPin, Mode};
use tracing::debug;

use crate::EmitterCfg;
use crate::error::{HwError, Result};

pub struct RpiPins {
    pins: Vec<IoPin>,
}

impl RpiPins {
    /// Claim `bcm_pins` (one per channel, in channel order) as released inputs.
    pub fn new(gpio: &Gpio, bcm_pins: &[u8]) -> Result<Self> {
        if bcm_pins.is_empty() {
            return Err(HwError::NoChannels);
        }
        for (i, p) in bcm_pins.iter().enumerate() {
            if bcm_pins[..i].contains(p) {
                return Err(HwError::DuplicatePin(*p));
            }
        }
        let pins = bcm_pins
            .iter()
            .map(|p| gpio.get(*p).map(|pin| pin.into_io(Mode::Input)))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(pins = ?bcm_pins, "rc sensor pins claimed");
        Ok(Self { pins })
    }
}

impl RcPins for RpiPins {
    fn channel_count(&self) -> usize {
        self.pins.len()
    }

    fn drive_high(&mut self, channel: usize) {
        if let Some(p) = self.pins.get_mut(channel) {
            // level first so the pin never glitches low when it becomes an output
            p.set_high();
            p.set_mode(Mode::Output);
        }
    }

    fn set_input(&mut self, channel: usize) {
        if let Some(p) = self.pins.get_mut(channel) {
            p.set_mode(Mode::Input);
        }
    }

    fn is_high(&mut self, channel: usize) -> bool {
        self.pins.get(channel).is_some_and(IoPin::is_high)
    }
}

/// One side of the shared emitter control pin.
///
/// The line and bump emitters hang off the same pin: driving it one way
/// lights one bank, driving it the other way lights the other, and releasing
/// it to input turns both off.
pub struct RpiEmitter {
    pin: Arc<Mutex<IoPin>>,
    active_high: bool,
}

impl RpiEmitter {
    fn lock(&self) -> MutexGuard<'_, IoPin> {
        self.pin.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Emitter for RpiEmitter {
    fn activate(&mut self) {
        let high = self.active_high;
        let mut p = self.lock();
        if high {
            p.set_high();
        } else {
            p.set_low();
        }
        p.set_mode(Mode::Output);
    }

    fn deactivate(&mut self) {
        self.lock().set_mode(Mode::Input);
    }
}

/// Claim the emitter pin and split it into (line, bump) emitters.
pub fn shared_emitters(
    gpio: &Gpio,
    bcm_pin: u8,
    cfg: EmitterCfg,
) -> Result<(RpiEmitter, RpiEmitter)> {
    let pin = Arc::new(Mutex::new(gpio.get(bcm_pin)?.into_io(Mode::Input)));
    debug!(
        pin = bcm_pin,
        line_active_high = cfg.line_active_high,
        bump_active_high = cfg.bump_active_high,
        "emitter pin claimed"
    );
    Ok((
        RpiEmitter {
            pin: Arc::clone(&pin),
            active_high: cfg.line_active_high,
        },
        RpiEmitter {
            pin,
            active_high: cfg.bump_active_high,
        },
    ))
}

pub fn open_gpio() -> Result<Gpio> {
    Ok(Gpio::new()?)
}
