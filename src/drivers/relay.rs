//! Single-channel relay driver (pump contactor, relief solenoid).
//!
//! Generic over any `embedded_hal` output pin so the same driver runs on the
//! raw ESP-IDF GPIO wrapper ([`GpioOutput`]) and on test doubles.  Relays are
//! active-HIGH and start de-energised.

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use log::warn;

use crate::drivers::hw_init;
use crate::error::ActuatorError;

pub struct Relay<P: OutputPin> {
    pin: P,
    name: &'static str,
    energised: bool,
}

impl<P: OutputPin> Relay<P> {
    /// Wrap `pin` and drive it LOW.  A failing pin is logged; the relay is
    /// still returned so the next `set` can retry.
    pub fn new(name: &'static str, mut pin: P) -> Self {
        if pin.set_low().is_err() {
            warn!("Relay {}: initial de-energise failed", name);
        }
        Self {
            pin,
            name,
            energised: false,
        }
    }

    /// Energise (`true`) or release (`false`) the relay.
    ///
    /// The cached state only changes once the write succeeded.
    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let res = if on { self.pin.set_high() } else { self.pin.set_low() };
        match res {
            Ok(()) => {
                self.energised = on;
                Ok(())
            }
            Err(_) => Err(ActuatorError::GpioWriteFailed),
        }
    }

    pub fn is_energised(&self) -> bool {
        self.energised
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

// ── Raw GPIO output pin ───────────────────────────────────────

/// ESP-IDF error code from a failed `gpio_set_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl embedded_hal::digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Output pin configured by [`hw_init::init_peripherals`].
#[derive(Debug, Clone, Copy)]
pub struct GpioOutput {
    gpio: i32,
}

impl GpioOutput {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }
}

impl ErrorType for GpioOutput {
    type Error = GpioError;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false).map_err(GpioError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true).map_err(GpioError)
    }
}
