//! Per-channel calibration bounds.
//!
//! Bounds are learned from batches of raw reads with a hysteresis rule: the
//! stored `maximum` only rises when every read of a batch exceeds it, and the
//! stored `minimum` only drops when every read of a batch is below it. A
//! single noisy read therefore never moves a bound.
//!
//! Storage for both automatic modes is reserved once when the sensors are
//! built; nothing here allocates afterwards.

use tracing::{debug, warn};

use crate::config::MAX_CHANNELS;
use crate::error::BuildError;
use crate::mode::ReadMode;

/// Reads per calibration batch.
pub const CALIBRATION_BATCH: usize = 10;
/// Top of the calibrated scale.
pub const CALIBRATED_MAX: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationBounds {
    minimum: Box<[u16]>,
    maximum: Box<[u16]>,
}

pub(crate) fn reserve_filled(channels: usize, value: u16) -> Result<Box<[u16]>, BuildError> {
    let mut v: Vec<u16> = Vec::new();
    v.try_reserve_exact(channels)
        .map_err(|_| BuildError::Allocation(channels))?;
    v.resize(channels, value);
    Ok(v.into_boxed_slice())
}

impl CalibrationBounds {
    /// Bounds from explicit per-channel values (e.g. loaded from disk).
    pub fn new(minimum: Vec<u16>, maximum: Vec<u16>) -> Result<Self, BuildError> {
        if minimum.is_empty() {
            return Err(BuildError::NoChannels);
        }
        if minimum.len() > MAX_CHANNELS {
            return Err(BuildError::TooManyChannels(minimum.len()));
        }
        if minimum.len() != maximum.len() {
            return Err(BuildError::ChannelCountMismatch {
                expected: minimum.len(),
                actual: maximum.len(),
            });
        }
        Ok(Self {
            minimum: minimum.into_boxed_slice(),
            maximum: maximum.into_boxed_slice(),
        })
    }

    /// Fresh bounds: `maximum = 0`, `minimum = timeout`.
    pub(crate) fn try_seeded(channels: usize, timeout_us: u16) -> Result<Self, BuildError> {
        Ok(Self {
            minimum: reserve_filled(channels, timeout_us)?,
            maximum: reserve_filled(channels, 0)?,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.minimum.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.minimum.is_empty()
    }

    pub fn minimum(&self) -> &[u16] {
        &self.minimum
    }

    pub fn maximum(&self) -> &[u16] {
        &self.maximum
    }

    /// False when the channel has no usable dynamic range (`maximum <= minimum`).
    pub fn has_range(&self, channel: usize) -> bool {
        match (self.minimum.get(channel), self.maximum.get(channel)) {
            (Some(lo), Some(hi)) => hi > lo,
            _ => false,
        }
    }

    pub fn reset(&mut self, timeout_us: u16) {
        self.minimum.fill(timeout_us);
        self.maximum.fill(0);
    }

    /// Project `raw` onto `[0, 1000]`.
    ///
    /// The span is the 16-bit modular difference `maximum - minimum`; an equal
    /// pair maps to 0 and an inverted pair yields values at or near 0.
    #[inline]
    pub fn normalize(&self, channel: usize, raw: u16) -> u16 {
        let (Some(&lo), Some(&hi)) = (self.minimum.get(channel), self.maximum.get(channel)) else {
            return 0;
        };
        let span = hi.wrapping_sub(lo);
        if span == 0 {
            return 0;
        }
        let v = (i32::from(raw) - i32::from(lo)) * i32::from(CALIBRATED_MAX) / i32::from(span);
        // clamped into 0..=1000
        v.clamp(0, i32::from(CALIBRATED_MAX)) as u16
    }

    /// Fold one batch's per-channel extremes into the bounds.
    ///
    /// `maximum` rises to the batch minimum only if the whole batch sat above
    /// it; `minimum` drops to the batch maximum only if the whole batch sat
    /// below it. Returns whether any bound moved.
    pub fn fold_batch(&mut self, batch_min: &[u16], batch_max: &[u16]) -> bool {
        let mut moved = false;
        for (ch, (lo, hi)) in batch_min.iter().zip(batch_max).enumerate() {
            let (Some(stored_min), Some(stored_max)) =
                (self.minimum.get_mut(ch), self.maximum.get_mut(ch))
            else {
                break;
            };
            if *lo > *stored_max {
                *stored_max = *lo;
                moved = true;
            }
            if *hi < *stored_min {
                *stored_min = *hi;
                moved = true;
            }
        }
        moved
    }
}

#[derive(Debug, Clone)]
struct ModeSlot {
    bounds: CalibrationBounds,
    initialized: bool,
}

/// Calibration sets for the two automatic read modes.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    on: ModeSlot,
    off: ModeSlot,
}

impl CalibrationStore {
    /// Reserve both sets up front. Neither is initialized yet.
    pub fn try_new(channels: usize, timeout_us: u16) -> Result<Self, BuildError> {
        let slot = || -> Result<ModeSlot, BuildError> {
            Ok(ModeSlot {
                bounds: CalibrationBounds::try_seeded(channels, timeout_us)?,
                initialized: false,
            })
        };
        Ok(Self {
            on: slot()?,
            off: slot()?,
        })
    }

    pub fn channels(&self) -> usize {
        self.on.bounds.len()
    }

    fn slot(&self, mode: ReadMode) -> Option<&ModeSlot> {
        match mode {
            ReadMode::On => Some(&self.on),
            ReadMode::Off => Some(&self.off),
            ReadMode::Manual => None,
        }
    }

    fn slot_mut(&mut self, mode: ReadMode) -> Option<&mut ModeSlot> {
        match mode {
            ReadMode::On => Some(&mut self.on),
            ReadMode::Off => Some(&mut self.off),
            ReadMode::Manual => None,
        }
    }

    /// Bounds for `mode`, if that set has been initialized.
    pub fn get(&self, mode: ReadMode) -> Option<&CalibrationBounds> {
        self.slot(mode)
            .filter(|s| s.initialized)
            .map(|s| &s.bounds)
    }

    pub fn is_initialized(&self, mode: ReadMode) -> bool {
        self.get(mode).is_some()
    }

    /// First use seeds `maximum = 0`, `minimum = timeout`. `None` for `Manual`.
    pub fn ensure_initialized(
        &mut self,
        mode: ReadMode,
        timeout_us: u16,
    ) -> Option<&mut CalibrationBounds> {
        let slot = self.slot_mut(mode)?;
        if !slot.initialized {
            slot.bounds.reset(timeout_us);
            slot.initialized = true;
            debug!(%mode, timeout_us, "calibration set initialized");
        }
        Some(&mut slot.bounds)
    }

    /// Reseed both sets; whether each is initialized is left unchanged.
    pub fn reset(&mut self, timeout_us: u16) {
        self.on.bounds.reset(timeout_us);
        self.off.bounds.reset(timeout_us);
        debug!(timeout_us, "calibration reset");
    }

    /// Install previously persisted bounds and mark the set initialized.
    ///
    /// Ignored for `Manual` or when the channel count differs.
    pub fn install(&mut self, mode: ReadMode, bounds: CalibrationBounds) -> bool {
        let channels = self.channels();
        let Some(slot) = self.slot_mut(mode) else {
            return false;
        };
        if bounds.len() != channels {
            warn!(
                %mode,
                expected = channels,
                actual = bounds.len(),
                "calibration channel count mismatch, ignored"
            );
            return false;
        }
        // copy into the reserved storage
        slot.bounds.minimum.copy_from_slice(&bounds.minimum);
        slot.bounds.maximum.copy_from_slice(&bounds.maximum);
        slot.initialized = true;
        debug!(%mode, "calibration installed");
        true
    }
}
