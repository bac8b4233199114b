//! 0.5-4.5 V ratiometric pressure transducer driver.
//!
//! The transducer output reaches the ADC through a 2:3 resistive divider.
//! A reading is converted raw → pin voltage → sensor voltage, checked for
//! wiring faults and finally mapped linearly onto 0-12 bar.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1_CH4 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` for injection.

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
use core::sync::atomic::{AtomicU16, Ordering};

use crate::error::SensorFault;

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
static SIM_PRESSURE_ADC: AtomicU16 = AtomicU16::new(0);

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn sim_set_pressure_adc(raw: u16) {
    SIM_PRESSURE_ADC.store(raw, Ordering::Relaxed);
}

/// Conversion constants for the transducer and its front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSensorCalibration {
    /// Full-scale ADC count (12-bit).
    pub adc_max: u16,
    /// ADC reference voltage.
    pub adc_ref_v: f32,
    /// Sensor volts per pin volt (divider inverse).
    pub divider_ratio: f32,
    /// Below this the sensor is unpowered or unplugged.
    pub disconnected_below_v: f32,
    /// Above this the signal line is shorted to supply.
    pub short_above_v: f32,
    /// Sensor voltage at 0 bar.
    pub zero_v: f32,
    /// Sensor voltage swing across the full range.
    pub span_v: f32,
    /// Pressure at full span.
    pub span_bar: f32,
}

impl Default for PressureSensorCalibration {
    fn default() -> Self {
        Self {
            adc_max: 4095,
            adc_ref_v: 3.3,
            divider_ratio: 1.5,
            disconnected_below_v: 0.3,
            short_above_v: 4.8,
            zero_v: 0.5,
            span_v: 4.0,
            span_bar: 12.0,
        }
    }
}

/// Voltage at the sensor terminal for a raw ADC count.
pub fn raw_to_sensor_volts(raw: u16, cal: &PressureSensorCalibration) -> f32 {
    f32::from(raw) / f32::from(cal.adc_max) * cal.adc_ref_v * cal.divider_ratio
}

/// Convert a raw ADC count to bar, or classify the wiring fault.
///
/// Readings just below the live zero clamp to 0 bar.
pub fn raw_to_bar(raw: u16, cal: &PressureSensorCalibration) -> Result<f32, SensorFault> {
    let volts = raw_to_sensor_volts(raw, cal);
    if volts < cal.disconnected_below_v {
        return Err(SensorFault::Disconnected);
    }
    if volts > cal.short_above_v {
        return Err(SensorFault::ShortCircuit);
    }
    Ok(((volts - cal.zero_v) * cal.span_bar / cal.span_v).max(0.0))
}

pub struct PressureSensor {
    cal: PressureSensorCalibration,
    last_raw: u16,
    _adc_gpio: i32,
}

impl PressureSensor {
    pub fn new(adc_gpio: i32) -> Self {
        Self {
            cal: PressureSensorCalibration::default(),
            last_raw: 0,
            _adc_gpio: adc_gpio,
        }
    }

    /// Sample the ADC once.
    pub fn read(&mut self) -> Result<f32, SensorFault> {
        self.last_raw = self.read_adc();
        raw_to_bar(self.last_raw, &self.cal)
    }

    /// Raw count of the most recent sample, for diagnostics.
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn read_adc(&self) -> u16 {
        crate::drivers::hw_init::adc1_read(crate::pins::PRESSURE_ADC_CHANNEL)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn read_adc(&self) -> u16 {
        SIM_PRESSURE_ADC.load(Ordering::Relaxed)
    }
}
