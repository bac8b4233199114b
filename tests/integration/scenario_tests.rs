//! End-to-end regulation scenarios: scripted readings in, relay history out.
//!
//! Reference 10 bar, default 40/60 % band, 98 % usage stop, 5 s no-usage
//! delay, 60 s leak window.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use pressureguard::app::commands::{AppCommand, CalibrationSource};
use pressureguard::app::events::AppEvent;
use pressureguard::app::service::{AppService, REFERENCE_KEY};
use pressureguard::config::SystemConfig;
use pressureguard::error::SensorFault;
use pressureguard::fsm::StateId;
use pressureguard::fsm::context::{ActuatorIntent, ControlEvent};

const REF: f32 = 10.0;

struct Rig {
    app: AppService,
    hw: MockHardware,
    nvs: MockNvs,
    sink: RecordingSink,
}

impl Rig {
    fn calibrated() -> Self {
        Self::with_nvs(MockNvs::with_reference(REF))
    }

    fn with_nvs(nvs: MockNvs) -> Self {
        let mut app = AppService::new(SystemConfig::default());
        let mut sink = RecordingSink::new();
        app.start(&nvs, 0, &mut sink);
        Self {
            app,
            hw: MockHardware::new(),
            nvs,
            sink,
        }
    }

    /// Feed one reading at `now_ms` and return the applied intent.
    fn sample(&mut self, bar: f32, now_ms: u64) -> ActuatorIntent {
        self.hw.push_reading(bar);
        self.app
            .sample_tick(now_ms, &mut self.hw, &mut self.nvs, &mut self.sink)
    }

    fn fault(&mut self, fault: SensorFault, now_ms: u64) -> ActuatorIntent {
        self.hw.push_fault(fault);
        self.app
            .sample_tick(now_ms, &mut self.hw, &mut self.nvs, &mut self.sink)
    }
}

fn pressurise() -> ActuatorIntent {
    ActuatorIntent {
        pump_on: true,
        valve_open: false,
    }
}

fn relief() -> ActuatorIntent {
    ActuatorIntent {
        pump_on: false,
        valve_open: true,
    }
}

#[test]
fn relief_draw_recover_and_relief_again() {
    let mut rig = Rig::calibrated();
    assert_eq!(rig.app.state(), StateId::Standby);

    // 62 %: above the band with no recent draw.
    assert_eq!(rig.sample(6.2, 0), relief());
    assert_eq!(rig.app.state(), StateId::HighPressureRelief);

    // 35 %: a draw, pump on and valve shut.
    assert_eq!(rig.sample(3.5, 100), pressurise());
    assert_eq!(rig.app.state(), StateId::UsingWater);

    // 65 %: still refilling, even though we are above the band.
    assert_eq!(rig.sample(6.5, 200), pressurise());
    assert_eq!(rig.app.state(), StateId::UsingWater);

    // 99 %: draw over, pump off; relief waits for the no-usage delay.
    assert_eq!(rig.sample(9.9, 300), ActuatorIntent::all_off());
    assert_eq!(rig.app.state(), StateId::Standby);
    assert_eq!(rig.sample(9.9, 2_000), ActuatorIntent::all_off());

    // Delay elapsed: bleed down.
    assert_eq!(rig.sample(9.9, 5_200), relief());
    assert_eq!(rig.app.state(), StateId::HighPressureRelief);

    // Back inside the band: valve closes.
    assert_eq!(rig.sample(5.5, 5_300), ActuatorIntent::all_off());
    assert_eq!(rig.app.state(), StateId::Standby);

    let started = rig.sink.count(|e| {
        matches!(e, AppEvent::Control(ControlEvent::UsageStarted { .. }))
    });
    let stopped = rig.sink.count(|e| {
        matches!(e, AppEvent::Control(ControlEvent::UsageStopped { .. }))
    });
    assert_eq!((started, stopped), (1, 1));
}

#[test]
fn pump_and_valve_are_never_both_energised() {
    let mut rig = Rig::calibrated();
    let script = [6.2, 3.5, 6.5, 9.9, 9.9, 3.0, 7.0, 9.8, 9.9, 4.5, 5.0];
    for (i, bar) in script.into_iter().enumerate() {
        let intent = rig.sample(bar, i as u64 * 1_500);
        assert!(
            !(intent.pump_on && intent.valve_open),
            "both energised at step {i} ({bar} bar)"
        );
        assert!(!rig.hw.both_energised());
    }
}

#[test]
fn fault_mid_draw_forces_all_off_then_resumes() {
    let mut rig = Rig::calibrated();
    assert_eq!(rig.sample(3.5, 0), pressurise());

    assert_eq!(rig.fault(SensorFault::Disconnected, 100), ActuatorIntent::all_off());
    assert!(!rig.hw.pump_on());
    assert!(!rig.hw.valve_open());
    // State is held across the fault.
    assert_eq!(rig.app.state(), StateId::UsingWater);
    assert_ne!(rig.app.fault_flags(), 0);
    assert_eq!(rig.app.status().pressure_bar, None);

    // A second faulty tick does not re-announce the fault.
    rig.fault(SensorFault::Disconnected, 200);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::SensorFault(_))),
        1
    );

    // Recovered reading still below the band: pump back on.
    assert_eq!(rig.sample(3.6, 300), pressurise());
    assert_eq!(rig.app.fault_flags(), 0);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::SensorRecovered)),
        1
    );
}

#[test]
fn idle_pressure_loss_raises_leak_once() {
    let mut rig = Rig::calibrated();
    rig.sample(5.0, 0);
    rig.sample(5.0, 30_000);
    rig.sample(4.8, 60_000);
    assert_eq!(rig.app.state(), StateId::LeakSuspected);
    assert!(rig.app.status().leak_detected);

    // Keeps losing pressure: still one alert.
    rig.sample(4.6, 120_000);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Control(ControlEvent::LeakDetected { .. }))),
        1
    );
    // Detection only: nothing was energised.
    assert!(!rig.hw.pump_on());
    assert!(!rig.hw.valve_open());
}

#[test]
fn small_idle_drift_is_not_a_leak() {
    let mut rig = Rig::calibrated();
    rig.sample(5.0, 0);
    rig.sample(4.95, 60_000);
    rig.sample(4.9, 120_000);
    assert_eq!(rig.app.state(), StateId::Standby);
    assert!(!rig.app.status().leak_detected);
}

#[test]
fn water_usage_clears_leak() {
    let mut rig = Rig::calibrated();
    rig.sample(5.0, 0);
    rig.sample(4.8, 60_000);
    assert_eq!(rig.app.state(), StateId::LeakSuspected);

    rig.sample(3.0, 60_100);
    assert_eq!(rig.app.state(), StateId::UsingWater);
    assert!(!rig.app.status().leak_detected);
}

#[test]
fn calibration_persists_reference_and_survives_restart() {
    let mut rig = Rig::with_nvs(MockNvs::new());
    assert_eq!(rig.app.state(), StateId::Uncalibrated);

    // Uncalibrated: nothing moves.
    assert_eq!(rig.sample(3.0, 0), ActuatorIntent::all_off());

    rig.app.handle_command(
        AppCommand::StartCalibration(CalibrationSource::Console),
        100,
        &mut rig.hw,
        &mut rig.sink,
    );
    assert_eq!(rig.app.state(), StateId::Calibrating);
    assert!(rig.hw.pump_on());
    assert!(!rig.hw.valve_open());

    rig.sample(4.0, 200);
    rig.sample(8.0, 300);
    rig.sample(9.5, 400);
    rig.sample(9.5, 3_000);
    assert_eq!(rig.app.state(), StateId::Calibrating);

    // Plateau: no new peak for more than 5 s.
    assert_eq!(rig.sample(9.5, 5_500), ActuatorIntent::all_off());
    assert_eq!(rig.app.state(), StateId::Standby);

    let expected = 9.5 * 1.02;
    let stored = rig.nvs.stored(REFERENCE_KEY).unwrap();
    assert!((stored - expected).abs() < 1e-4);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::ReferencePersisted(_))),
        1
    );

    // Reboot on the same flash.
    let mut app = AppService::new(SystemConfig::default());
    let mut sink = RecordingSink::new();
    app.start(&rig.nvs, 0, &mut sink);
    assert_eq!(app.state(), StateId::Standby);
    assert!((app.status().reference_bar - expected).abs() < 1e-4);
}

#[test]
fn calibration_times_out_on_a_rising_line() {
    let mut rig = Rig::with_nvs(MockNvs::new());
    rig.app.handle_command(
        AppCommand::StartCalibration(CalibrationSource::Button),
        0,
        &mut rig.hw,
        &mut rig.sink,
    );

    // A fresh peak every second never plateaus.
    let mut t = 0;
    let mut bar = 1.0;
    while rig.app.state() == StateId::Calibrating {
        t += 1_000;
        bar += 0.1;
        rig.sample(bar, t);
        assert!(t <= 31_000, "calibration never ended");
    }
    assert!(t > 30_000);
    assert_eq!(rig.app.state(), StateId::Standby);
}

#[test]
fn failed_reference_write_keeps_reference_for_this_run() {
    let mut nvs = MockNvs::new();
    nvs.fail_writes = true;
    let mut rig = Rig::with_nvs(nvs);

    rig.app.handle_command(
        AppCommand::StartCalibration(CalibrationSource::Remote),
        0,
        &mut rig.hw,
        &mut rig.sink,
    );
    rig.sample(10.0, 100);
    rig.sample(10.0, 5_200);

    assert_eq!(rig.app.state(), StateId::Standby);
    assert!(rig.app.status().reference_bar > 0.0);
    assert_eq!(rig.nvs.stored(REFERENCE_KEY), None);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::PersistenceFailed(_))),
        1
    );
}

#[test]
fn calibration_during_fault_holds_relays_off() {
    let mut rig = Rig::calibrated();
    rig.fault(SensorFault::ShortCircuit, 0);
    rig.hw.calls.clear();

    rig.app.handle_command(
        AppCommand::StartCalibration(CalibrationSource::Console),
        100,
        &mut rig.hw,
        &mut rig.sink,
    );
    assert_eq!(rig.app.state(), StateId::Calibrating);
    assert!(rig.hw.calls.is_empty());
    // Published status agrees with the relays.
    let status = rig.app.status();
    assert!(!status.pump_on);
    assert!(!status.valve_open);

    assert_eq!(rig.fault(SensorFault::ShortCircuit, 200), ActuatorIntent::all_off());
    // Sensor back: calibration drives the pump.
    assert_eq!(rig.sample(2.0, 300), pressurise());
}

#[test]
fn second_calibration_request_is_ignored() {
    let mut rig = Rig::calibrated();
    for t in [0, 50] {
        rig.app.handle_command(
            AppCommand::StartCalibration(CalibrationSource::Console),
            t,
            &mut rig.hw,
            &mut rig.sink,
        );
    }
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::CalibrationRequested(_))),
        1
    );
}
