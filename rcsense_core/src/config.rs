//! Runtime configuration for the sensor arrays.
//!
//! These are separate from the TOML-deserialized config in `rcsense_config`;
//! see `conversions` for the bridge.

use crate::mode::ReadMode;

/// Timeout used when none is configured, in µs.
pub const DEFAULT_TIMEOUT_US: u16 = 4000;
/// Largest timeout the pulse timer accepts, in µs.
pub const MAX_TIMEOUT_US: u16 = 32_767;
/// Charge time before release, in µs.
pub const DEFAULT_CHARGE_US: u16 = 10;
/// Most channels one line array may have.
pub const MAX_CHANNELS: usize = 16;
/// Default bump threshold margin above baseline.
pub const DEFAULT_MARGIN_PERCENTAGE: u16 = 50;
/// Default number of reads averaged by a bump calibration.
pub const DEFAULT_BUMP_SAMPLES: u8 = 50;

/// Pulse timing parameters shared by both sensor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCfg {
    /// A channel still high after this long reads exactly this value.
    pub timeout_us: u16,
    pub charge_us: u16,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            timeout_us: DEFAULT_TIMEOUT_US,
            charge_us: DEFAULT_CHARGE_US,
        }
    }
}

impl TimingCfg {
    /// Copy with the timeout clamped to the accepted range.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            timeout_us: self.timeout_us.min(MAX_TIMEOUT_US),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BumpCfg {
    pub timing: TimingCfg,
    pub margin_percentage: u16,
}

impl Default for BumpCfg {
    fn default() -> Self {
        Self {
            timing: TimingCfg::default(),
            margin_percentage: DEFAULT_MARGIN_PERCENTAGE,
        }
    }
}

/// Background line sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerCfg {
    pub rate_hz: u32,
    pub mode: ReadMode,
    /// Track a white line on a dark background.
    pub invert: bool,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            rate_hz: 100,
            mode: ReadMode::On,
            invert: false,
        }
    }
}
