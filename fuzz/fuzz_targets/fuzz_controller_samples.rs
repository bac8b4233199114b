//! Fuzz target: pressure controller
//!
//! Interprets the input as a stream of 5-byte ticks
//! `[kind, reading_le_f32...]` and drives a calibrated controller with
//! them, checking:
//! - No panics for any reading, including NaN, infinities and negatives
//! - Pump and valve are never energised together
//! - A faulted or invalid tick always yields all-off
//!
//! cargo fuzz run fuzz_controller_samples

#![no_main]

use libfuzzer_sys::fuzz_target;
use pressureguard::config::SystemConfig;
use pressureguard::fsm::PressureController;
use pressureguard::fsm::context::ActuatorIntent;

fuzz_target!(|data: &[u8]| {
    let mut controller = PressureController::new(SystemConfig::default());
    controller.restore_reference(10.0, 0);

    let mut now = 0u64;
    for tick in data.chunks_exact(5) {
        now += 100 + u64::from(tick[0] & 0x3f) * 1_000;
        let reading = f32::from_le_bytes([tick[1], tick[2], tick[3], tick[4]]);

        let intent = match tick[0] >> 6 {
            0 => controller.sensor_fault(),
            1 => {
                controller.start_calibration(now);
                controller.intent()
            }
            _ => controller.evaluate(reading, now),
        };

        assert!(!(intent.pump_on && intent.valve_open));
        if tick[0] >> 6 >= 2 && !(reading.is_finite() && reading >= 0.0) {
            assert_eq!(intent, ActuatorIntent::all_off());
        }
        let _ = controller.drain_events();
    }
});
