#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration persistence for the RC sensor arrays.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Calibration bounds persist to CSV with a strict header; the loader
//!   rejects unknown modes and duplicate or missing channels.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Largest timeout the pulse timer accepts, in µs.
pub const MAX_TIMEOUT_US: u16 = 32_767;
/// Most channels one line array may have.
pub const MAX_LINE_CHANNELS: usize = 16;

/// Calibration CSV schema.
///
/// Expected headers:
/// mode,channel,minimum,maximum
///
/// Example:
/// mode,channel,minimum,maximum
/// on,0,212,3650
/// on,1,198,3712
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRow {
    pub mode: ReadModeCfg,
    pub channel: usize,
    pub minimum: u16,
    pub maximum: u16,
}

const CSV_HEADERS: [&str; 4] = ["mode", "channel", "minimum", "maximum"];

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadModeCfg {
    Off,
    #[default]
    On,
    Manual,
}

#[derive(Debug, Deserialize)]
pub struct Pins {
    /// Line sensor pins, left to right.
    pub line: Vec<u8>,
    /// Shared emitter control pin.
    pub emitter: u8,
    pub bump_left: Option<u8>,
    pub bump_right: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LineCfg {
    pub timeout_us: u16,
    pub charge_us: u16,
    pub mode: ReadModeCfg,
    /// Batches run by `calibrate` when the CLI flag is absent.
    pub calibration_batches: u32,
}

impl Default for LineCfg {
    fn default() -> Self {
        Self {
            timeout_us: 4000,
            charge_us: 10,
            mode: ReadModeCfg::On,
            calibration_batches: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BumpCfg {
    pub timeout_us: u16,
    /// Threshold sits this many percent above the baseline.
    pub margin_percentage: u16,
    pub calibration_samples: u8,
}

impl Default for BumpCfg {
    fn default() -> Self {
        Self {
            timeout_us: 4000,
            margin_percentage: 50,
            calibration_samples: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EmitterCfg {
    pub line_active_high: bool,
    pub bump_active_high: bool,
}

impl Default for EmitterCfg {
    fn default() -> Self {
        Self {
            line_active_high: true,
            bump_active_high: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplerCfg {
    pub rate_hz: u32,
    /// Report a stall when no sample arrived for this long.
    pub stall_ms: u64,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            rate_hz: 100,
            stall_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Per-channel bounds for one read mode.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PersistedBounds {
    pub minimum: Vec<u16>,
    pub maximum: Vec<u16>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct PersistedCalibration {
    #[serde(default)]
    pub on: Option<PersistedBounds>,
    #[serde(default)]
    pub off: Option<PersistedBounds>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub line: LineCfg,
    #[serde(default)]
    pub bump: BumpCfg,
    #[serde(default)]
    pub emitter: EmitterCfg,
    #[serde(default)]
    pub sampler: SamplerCfg,
    #[serde(default)]
    pub logging: Logging,
    /// Optional inline calibration; a CSV passed on the command line wins.
    #[serde(default)]
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl PersistedCalibration {
    pub fn get(&self, mode: ReadModeCfg) -> Option<&PersistedBounds> {
        match mode {
            ReadModeCfg::On => self.on.as_ref(),
            ReadModeCfg::Off => self.off.as_ref(),
            ReadModeCfg::Manual => None,
        }
    }

    /// Rebuild per-mode bounds from CSV rows.
    ///
    /// Every mode present must list channels `0..n` exactly once each.
    pub fn from_rows(rows: Vec<CalibrationRow>) -> eyre::Result<Self> {
        if rows.is_empty() {
            eyre::bail!("calibration requires at least one row");
        }
        let mut on: BTreeMap<usize, (u16, u16)> = BTreeMap::new();
        let mut off: BTreeMap<usize, (u16, u16)> = BTreeMap::new();
        for (i, r) in rows.iter().enumerate() {
            let table = match r.mode {
                ReadModeCfg::On => &mut on,
                ReadModeCfg::Off => &mut off,
                ReadModeCfg::Manual => {
                    eyre::bail!("calibration row {} uses mode 'manual', which has no bounds", i);
                }
            };
            if r.channel >= MAX_LINE_CHANNELS {
                eyre::bail!(
                    "calibration row {} channel {} exceeds the {}-channel limit",
                    i,
                    r.channel,
                    MAX_LINE_CHANNELS
                );
            }
            if table.insert(r.channel, (r.minimum, r.maximum)).is_some() {
                eyre::bail!(
                    "calibration lists channel {} twice for mode {:?}",
                    r.channel,
                    r.mode
                );
            }
        }
        let on = collect_bounds(&on, "on")?;
        let off = collect_bounds(&off, "off")?;
        if let (Some(a), Some(b)) = (&on, &off)
            && a.minimum.len() != b.minimum.len()
        {
            eyre::bail!(
                "calibration modes disagree on channel count ({} vs {})",
                a.minimum.len(),
                b.minimum.len()
            );
        }
        Ok(Self { on, off })
    }

    /// Flatten into CSV rows, `on` first, channels ascending.
    pub fn to_rows(&self) -> Vec<CalibrationRow> {
        let mut rows = Vec::new();
        for (mode, bounds) in [(ReadModeCfg::On, &self.on), (ReadModeCfg::Off, &self.off)] {
            if let Some(b) = bounds {
                for (channel, (minimum, maximum)) in
                    b.minimum.iter().zip(b.maximum.iter()).enumerate()
                {
                    rows.push(CalibrationRow {
                        mode,
                        channel,
                        minimum: *minimum,
                        maximum: *maximum,
                    });
                }
            }
        }
        rows
    }
}

fn collect_bounds(
    table: &BTreeMap<usize, (u16, u16)>,
    mode: &str,
) -> eyre::Result<Option<PersistedBounds>> {
    if table.is_empty() {
        return Ok(None);
    }
    let mut minimum = Vec::with_capacity(table.len());
    let mut maximum = Vec::with_capacity(table.len());
    for (expected, (channel, (lo, hi))) in table.iter().enumerate() {
        if *channel != expected {
            eyre::bail!("calibration for mode {} is missing channel {}", mode, expected);
        }
        minimum.push(*lo);
        maximum.push(*hi);
    }
    Ok(Some(PersistedBounds { minimum, maximum }))
}

impl TryFrom<Vec<CalibrationRow>> for PersistedCalibration {
    type Error = eyre::Report;
    fn try_from(rows: Vec<CalibrationRow>) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<PersistedCalibration> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != CSV_HEADERS {
        eyre::bail!(
            "calibration CSV must have headers '{}', got: {}",
            CSV_HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    PersistedCalibration::try_from(rows)
}

pub fn write_calibration_csv(path: &Path, cal: &PersistedCalibration) -> eyre::Result<()> {
    let rows = cal.to_rows();
    if rows.is_empty() {
        eyre::bail!("no calibrated mode to write");
    }
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for r in &rows {
        wtr.serialize(r)
            .map_err(|e| eyre::eyre!("write calibration CSV {:?}: {}", path, e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush calibration CSV {:?}: {}", path, e))?;
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let n = self.pins.line.len();
        if n == 0 {
            eyre::bail!("pins.line must list at least one pin");
        }
        if n > MAX_LINE_CHANNELS {
            eyre::bail!("pins.line must list at most {} pins, got {}", MAX_LINE_CHANNELS, n);
        }
        if self.pins.bump_left.is_some() != self.pins.bump_right.is_some() {
            eyre::bail!("pins.bump_left and pins.bump_right must be set together");
        }
        let mut all: Vec<u8> = self.pins.line.clone();
        all.push(self.pins.emitter);
        all.extend(self.pins.bump_left);
        all.extend(self.pins.bump_right);
        for (i, p) in all.iter().enumerate() {
            if all[..i].contains(p) {
                eyre::bail!("pin {} is assigned more than once", p);
            }
        }

        // Line
        if self.line.timeout_us == 0 || self.line.timeout_us > MAX_TIMEOUT_US {
            eyre::bail!("line.timeout_us must be in 1..={}", MAX_TIMEOUT_US);
        }
        if self.line.charge_us > 1000 {
            eyre::bail!("line.charge_us is unreasonably large (>1000us)");
        }
        if self.line.calibration_batches == 0 {
            eyre::bail!("line.calibration_batches must be >= 1");
        }

        // Bump
        if self.bump.timeout_us == 0 || self.bump.timeout_us > MAX_TIMEOUT_US {
            eyre::bail!("bump.timeout_us must be in 1..={}", MAX_TIMEOUT_US);
        }
        if self.bump.calibration_samples == 0 {
            eyre::bail!("bump.calibration_samples must be >= 1");
        }

        // Sampler
        if self.sampler.rate_hz == 0 {
            eyre::bail!("sampler.rate_hz must be > 0");
        }
        if self.sampler.stall_ms == 0 {
            eyre::bail!("sampler.stall_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{}'", r);
        }

        // Inline calibration
        if let Some(cal) = &self.calibration {
            for (name, bounds) in [("on", &cal.on), ("off", &cal.off)] {
                if let Some(b) = bounds
                    && (b.minimum.len() != n || b.maximum.len() != n)
                {
                    eyre::bail!(
                        "calibration.{} must list {} minimum and maximum values",
                        name,
                        n
                    );
                }
            }
        }

        Ok(())
    }
}
