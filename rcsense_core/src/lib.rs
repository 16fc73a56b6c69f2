#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! RC pulse-timing sensor core (hardware-agnostic).
//!
//! Turns GPIO discharge times into calibrated reflectance values, a line
//! position, and bump contact states. All hardware access goes through the
//! `rcsense_traits::{RcPins, Emitter, MicrosClock}` traits.
//!
//! ## Architecture
//!
//! - **Timing**: one charge/release/poll pass over all channels (`pulse`)
//! - **Calibration**: per-channel min/max learned in batches (`calibration`)
//! - **Line array**: read modes, normalization, position (`line`, `position`)
//! - **Bump**: two-channel threshold detection (`bump`)
//! - **Sampling**: background reader thread (`sampler`)
//!
//! ## Integer arithmetic
//!
//! Raw readings are `u16` microseconds bounded by the timeout (at most 32767).
//! Calibrated values live on a fixed `[0, 1000]` scale and positions on
//! `[0, 1000 * (channels - 1)]`; no floating point is used.

pub mod builder;
pub mod bump;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod error;
pub mod line;
pub mod mode;
pub mod position;
pub mod pulse;
pub mod sampler;
pub mod util;

pub use builder::{LineSensorsBuilder, Missing, Set};
pub use bump::{BumpSensors, BumpSide};
pub use calibration::{CALIBRATED_MAX, CALIBRATION_BATCH, CalibrationBounds, CalibrationStore};
pub use config::{BumpCfg, SamplerCfg, TimingCfg};
pub use error::{BuildError, Result, SenseError};
pub use line::LineSensors;
pub use mode::ReadMode;
pub use position::LinePositionEstimator;
pub use pulse::PulseTimer;
pub use sampler::{LineSample, Sampler};
