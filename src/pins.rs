//! GPIO / peripheral pin assignments for the PressureGuard controller board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Relays (active HIGH, de-energised at boot)
// ---------------------------------------------------------------------------

/// Pump contactor relay.
pub const PUMP_RELAY_GPIO: i32 = 25;
/// Pressure-relief solenoid valve relay.  HIGH = open.
pub const VALVE_RELAY_GPIO: i32 = 26;

// ---------------------------------------------------------------------------
// Pressure transducer (ADC1)
// ---------------------------------------------------------------------------

/// 0.5-4.5 V pressure transducer behind a 2:3 divider.
/// ADC1 channel 4 (GPIO 32 on the classic ESP32).
pub const PRESSURE_ADC_GPIO: i32 = 32;
/// ADC1 channel number of [`PRESSURE_ADC_GPIO`].
pub const PRESSURE_ADC_CHANNEL: u32 = 4;

// ---------------------------------------------------------------------------
// User button (BOOT, active-low with internal pull-up)
// ---------------------------------------------------------------------------

/// Short press starts a calibration run.
pub const BUTTON_GPIO: i32 = 0;

// ---------------------------------------------------------------------------
// UART console
// ---------------------------------------------------------------------------

/// UART port used for the status line and single-key commands.
pub const CONSOLE_UART_PORT: i32 = 0;
