//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the pressure sensor and both relays, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  On non-espidf targets the
//! underlying drivers use the simulated ADC and GPIO levels.

use embedded_hal::digital::OutputPin;
use log::{error, info};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::relay::{GpioOutput, Relay};
use crate::error::{Error, SensorFault};
use crate::pins;
use crate::sensors::pressure::PressureSensor;

/// Sensor plus the two relays behind the port traits.
pub struct HardwareAdapter<P: OutputPin = GpioOutput> {
    sensor: PressureSensor,
    pump: Relay<P>,
    valve: Relay<P>,
    /// Relay write failures since boot.
    relay_errors: u32,
}

impl HardwareAdapter<GpioOutput> {
    /// Board wiring from [`pins`].
    pub fn from_board() -> Self {
        Self::new(
            PressureSensor::new(pins::PRESSURE_ADC_GPIO),
            GpioOutput::new(pins::PUMP_RELAY_GPIO),
            GpioOutput::new(pins::VALVE_RELAY_GPIO),
        )
    }
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(sensor: PressureSensor, pump_pin: P, valve_pin: P) -> Self {
        info!("HardwareAdapter: relays de-energised");
        Self {
            sensor,
            pump: Relay::new("pump", pump_pin),
            valve: Relay::new("valve", valve_pin),
            relay_errors: 0,
        }
    }

    pub fn pump_energised(&self) -> bool {
        self.pump.is_energised()
    }

    pub fn valve_energised(&self) -> bool {
        self.valve.is_energised()
    }

    pub fn relay_errors(&self) -> u32 {
        self.relay_errors
    }

    /// Raw ADC count of the last sample.
    pub fn last_raw(&self) -> u16 {
        self.sensor.last_raw()
    }

    /// Every tick re-asserts both relays, so a lost write heals itself.
    fn drive(relay: &mut Relay<P>, on: bool, errors: &mut u32) {
        if let Err(e) = relay.set(on) {
            *errors = errors.saturating_add(1);
            error!("{} relay: {}", relay.name(), Error::from(e));
        }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<P: OutputPin> SensorPort for HardwareAdapter<P> {
    fn read_pressure(&mut self) -> Result<f32, SensorFault> {
        self.sensor.read()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<P: OutputPin> ActuatorPort for HardwareAdapter<P> {
    fn set_pump(&mut self, on: bool) {
        Self::drive(&mut self.pump, on, &mut self.relay_errors);
    }

    fn set_valve(&mut self, open: bool) {
        Self::drive(&mut self.valve, open, &mut self.relay_errors);
    }
}
