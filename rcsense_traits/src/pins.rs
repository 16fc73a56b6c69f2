use core::ops::{Deref, DerefMut};

/// A bank of RC sensor pins, addressed by 0-based channel index.
///
/// Each channel is charged by driving it high, then released to input so the
/// sensor's capacitor discharges through the phototransistor (or bump contact).
/// The time until the input reads low is the measurement.
///
/// Pin operations are infallible: backends resolve pin ownership when they are
/// constructed, and the timing loop has no way to recover mid-pass anyway.
pub trait RcPins {
    /// Number of channels in this bank.
    fn channel_count(&self) -> usize;

    /// Drive the channel's pin high as an output (charge the capacitor).
    fn drive_high(&mut self, channel: usize);

    /// Release the channel's pin to a high-impedance input.
    fn set_input(&mut self, channel: usize);

    /// Current logic level of the channel's pin.
    fn is_high(&mut self, channel: usize) -> bool;

    /// Mask interrupt sources that would disturb an elapsed-time read.
    /// Default: nothing to mask (e.g. a Linux userspace backend).
    fn suspend_interrupts(&mut self) {}

    /// Undo `suspend_interrupts`.
    fn resume_interrupts(&mut self) {}
}

impl<P: RcPins + ?Sized> RcPins for Box<P> {
    #[inline]
    fn channel_count(&self) -> usize {
        (**self).channel_count()
    }
    #[inline]
    fn drive_high(&mut self, channel: usize) {
        (**self).drive_high(channel);
    }
    #[inline]
    fn set_input(&mut self, channel: usize) {
        (**self).set_input(channel);
    }
    #[inline]
    fn is_high(&mut self, channel: usize) -> bool {
        (**self).is_high(channel)
    }
    #[inline]
    fn suspend_interrupts(&mut self) {
        (**self).suspend_interrupts();
    }
    #[inline]
    fn resume_interrupts(&mut self) {
        (**self).resume_interrupts();
    }
}

/// Scoped interrupt suspension over a pin bank.
///
/// Creating the hold suspends interrupts; dropping it resumes them, on every
/// exit path. The pins stay reachable through `Deref`/`DerefMut` while held.
pub struct InterruptHold<'a, P: RcPins + ?Sized> {
    pins: &'a mut P,
}

impl<'a, P: RcPins + ?Sized> InterruptHold<'a, P> {
    #[inline]
    pub fn new(pins: &'a mut P) -> Self {
        pins.suspend_interrupts();
        Self { pins }
    }
}

impl<P: RcPins + ?Sized> Deref for InterruptHold<'_, P> {
    type Target = P;
    #[inline]
    fn deref(&self) -> &P {
        self.pins
    }
}

impl<P: RcPins + ?Sized> DerefMut for InterruptHold<'_, P> {
    #[inline]
    fn deref_mut(&mut self) -> &mut P {
        self.pins
    }
}

impl<P: RcPins + ?Sized> Drop for InterruptHold<'_, P> {
    #[inline]
    fn drop(&mut self) {
        self.pins.resume_interrupts();
    }
}

/// IR emitter bank feeding a sensor array.
pub trait Emitter {
    /// Turn the emitters on.
    fn activate(&mut self);
    /// Turn the emitters off (pin released).
    fn deactivate(&mut self);
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    #[inline]
    fn activate(&mut self) {
        (**self).activate();
    }
    #[inline]
    fn deactivate(&mut self) {
        (**self).deactivate();
    }
}
