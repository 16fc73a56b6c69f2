//! Hardware capability traits shared by the sensing core and its backends.
//!
//! The core never touches a GPIO register directly: it drives pins through
//! `RcPins`, switches IR emitters through `Emitter`, and reads time through
//! `MicrosClock`. Backends live in `rcsense_hardware`.

pub mod clock;
pub mod pins;

pub use clock::{MicrosClock, MonotonicClock};
pub use pins::{Emitter, InterruptHold, RcPins};
