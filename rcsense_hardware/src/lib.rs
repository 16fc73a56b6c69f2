//! Pin backends for RC sensor banks.
//!
//! `sim` is always available and fully deterministic. `rpi` drives real
//! GPIO through rppal and is compiled only with the `hardware` feature on Linux.

pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

pub use error::HwError;
pub use sim::{SimClock, SimEmitter, SimPins};

/// Drive level that lights each emitter bank on a shared control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
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
