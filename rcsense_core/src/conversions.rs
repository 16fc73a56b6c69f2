//! `From` implementations bridging `rcsense_config` types to `rcsense_core` types.

use crate::calibration::CalibrationBounds;
use crate::config::{BumpCfg, SamplerCfg, TimingCfg};
use crate::error::BuildError;
use crate::mode::ReadMode;

// ── ReadMode ─────────────────────────────────────────────────────────────────

impl From<rcsense_config::ReadModeCfg> for ReadMode {
    fn from(m: rcsense_config::ReadModeCfg) -> Self {
        match m {
            rcsense_config::ReadModeCfg::Off => Self::Off,
            rcsense_config::ReadModeCfg::On => Self::On,
            rcsense_config::ReadModeCfg::Manual => Self::Manual,
        }
    }
}

impl From<ReadMode> for rcsense_config::ReadModeCfg {
    fn from(m: ReadMode) -> Self {
        match m {
            ReadMode::Off => Self::Off,
            ReadMode::On => Self::On,
            ReadMode::Manual => Self::Manual,
        }
    }
}

// ── Timing ───────────────────────────────────────────────────────────────────

impl From<&rcsense_config::LineCfg> for TimingCfg {
    fn from(c: &rcsense_config::LineCfg) -> Self {
        Self {
            timeout_us: c.timeout_us,
            charge_us: c.charge_us,
        }
    }
}

// ── BumpCfg ──────────────────────────────────────────────────────────────────

/// Bump pins share the line array's charge time.
impl From<&rcsense_config::Config> for BumpCfg {
    fn from(c: &rcsense_config::Config) -> Self {
        Self {
            timing: TimingCfg {
                timeout_us: c.bump.timeout_us,
                charge_us: c.line.charge_us,
            },
            margin_percentage: c.bump.margin_percentage,
        }
    }
}

// ── SamplerCfg ───────────────────────────────────────────────────────────────

impl From<&rcsense_config::Config> for SamplerCfg {
    fn from(c: &rcsense_config::Config) -> Self {
        Self {
            rate_hz: c.sampler.rate_hz,
            mode: c.line.mode.into(),
            invert: false,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl TryFrom<&rcsense_config::PersistedBounds> for CalibrationBounds {
    type Error = BuildError;
    fn try_from(p: &rcsense_config::PersistedBounds) -> Result<Self, Self::Error> {
        Self::new(p.minimum.clone(), p.maximum.clone())
    }
}

impl From<&CalibrationBounds> for rcsense_config::PersistedBounds {
    fn from(b: &CalibrationBounds) -> Self {
        Self {
            minimum: b.minimum().to_vec(),
            maximum: b.maximum().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_maps_to_runtime() {
        let cfg = rcsense_config::load_toml(
            r#"
[pins]
line = [1, 2, 3]
emitter = 4

[line]
timeout_us = 2500
charge_us = 12
mode = "off"

[bump]
timeout_us = 3000
margin_percentage = 40

[sampler]
rate_hz = 200
"#,
        )
        .unwrap();
        let t = TimingCfg::from(&cfg.line);
        assert_eq!((t.timeout_us, t.charge_us), (2500, 12));
        let b = BumpCfg::from(&cfg);
        assert_eq!(b.timing.timeout_us, 3000);
        assert_eq!(b.timing.charge_us, 12);
        assert_eq!(b.margin_percentage, 40);
        let s = SamplerCfg::from(&cfg);
        assert_eq!(s.rate_hz, 200);
        assert_eq!(s.mode, ReadMode::Off);
    }

    #[test]
    fn persisted_bounds_convert_both_ways() {
        let p = rcsense_config::PersistedBounds {
            minimum: vec![100, 200],
            maximum: vec![3000, 3100],
        };
        let b = CalibrationBounds::try_from(&p).unwrap();
        assert_eq!(rcsense_config::PersistedBounds::from(&b), p);

        let bad = rcsense_config::PersistedBounds {
            minimum: vec![1, 2],
            maximum: vec![3],
        };
        assert!(CalibrationBounds::try_from(&bad).is_err());
    }
}
