//! Integration tests for the settings → AppService → config pipeline.
//!
//! Covers remote threshold updates, rejection of bad payloads, the
//! debounced config auto-save and the remote calibration command.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use pressureguard::app::commands::{AppCommand, SettingsUpdate, ThresholdRequest};
use pressureguard::app::events::AppEvent;
use pressureguard::app::ports::ConfigPort;
use pressureguard::app::service::AppService;
use pressureguard::config::SystemConfig;
use pressureguard::fsm::StateId;
use pressureguard::fsm::context::ThresholdPair;
use pressureguard::wire;

fn make_app() -> (AppService, MockHardware, MockNvs, RecordingSink) {
    let nvs = MockNvs::with_reference(10.0);
    let mut app = AppService::new(SystemConfig::default());
    let mut sink = RecordingSink::new();
    app.start(&nvs, 0, &mut sink);
    (app, MockHardware::new(), nvs, sink)
}

fn thresholds(lower: u8, upper: u8) -> SettingsUpdate {
    SettingsUpdate {
        thresholds: ThresholdRequest::Valid(ThresholdPair::new(lower, upper).unwrap()),
        calibrate: false,
    }
}

#[test]
fn start_emits_started_with_restored_reference() {
    let (app, _hw, _nvs, sink) = make_app();
    assert_eq!(app.state(), StateId::Standby);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::Started { state: StateId::Standby, reference_bar } if *reference_bar == 10.0
    )));
}

#[test]
fn new_thresholds_take_effect_on_next_sample() {
    let (mut app, mut hw, mut nvs, mut sink) = make_app();

    // 65 % is above the default 60 % upper bound...
    app.handle_command(AppCommand::ApplySettings(thresholds(30, 70)), 0, &mut hw, &mut sink);
    assert_eq!(app.current_config().thresholds.upper_pct(), 70);

    // ...but inside the new 30-70 % band.
    hw.push_reading(6.5);
    app.sample_tick(100, &mut hw, &mut nvs, &mut sink);
    assert_eq!(app.state(), StateId::Standby);
    assert!(!hw.valve_open());

    // 35 % is now inside the band, not a draw.
    hw.push_reading(3.5);
    app.sample_tick(200, &mut hw, &mut nvs, &mut sink);
    assert_eq!(app.state(), StateId::Standby);
    assert!(!hw.pump_on());
}

#[test]
fn repeated_identical_thresholds_apply_once() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    for t in [0, 5_000, 10_000] {
        app.handle_command(AppCommand::ApplySettings(thresholds(35, 65)), t, &mut hw, &mut sink);
    }
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SettingsApplied(_))), 1);
}

#[test]
fn invalid_payload_keeps_previous_thresholds() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    app.handle_command(AppCommand::ApplySettings(thresholds(30, 70)), 0, &mut hw, &mut sink);

    for body in [
        &br#"{"lowerThresholdPct":80,"upperThresholdPct":20}"#[..],
        br#"{"lowerThresholdPct":-5,"upperThresholdPct":50}"#,
        br#"{"lowerThresholdPct":40}"#,
    ] {
        let update = wire::decode_settings(body).unwrap();
        app.handle_command(AppCommand::ApplySettings(update), 100, &mut hw, &mut sink);
    }

    let band = app.current_config().thresholds;
    assert_eq!((band.lower_pct(), band.upper_pct()), (30, 70));
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SettingsRejected(_))), 3);
}

#[test]
fn remote_calibrate_command_starts_calibration() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    let update = wire::decode_settings(
        br#"{"lowerThresholdPct":40,"upperThresholdPct":60,"command":"CALIBRATE"}"#,
    )
    .unwrap();
    assert!(update.calibrate);

    app.handle_command(AppCommand::ApplySettings(update), 0, &mut hw, &mut sink);
    assert_eq!(app.state(), StateId::Calibrating);
    assert!(hw.pump_on());
    assert!(!hw.valve_open());
}

#[test]
fn lowercase_calibrate_is_ignored() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    let update = wire::decode_settings(br#"{"command":"calibrate"}"#).unwrap();
    app.handle_command(AppCommand::ApplySettings(update), 0, &mut hw, &mut sink);
    assert_eq!(app.state(), StateId::Standby);
}

#[test]
fn threshold_change_is_auto_saved_after_quiet_period() {
    let (mut app, mut hw, nvs, mut sink) = make_app();
    assert!(!app.is_config_dirty());

    app.handle_command(AppCommand::ApplySettings(thresholds(25, 75)), 1_000, &mut hw, &mut sink);
    assert!(app.is_config_dirty());

    assert!(!app.auto_save_if_needed(3_000, &nvs));
    assert!(nvs.saved_config().is_none());

    assert!(app.auto_save_if_needed(6_000, &nvs));
    assert!(!app.is_config_dirty());
    let saved = nvs.load().unwrap();
    assert_eq!(saved.thresholds.lower_pct(), 25);
    assert_eq!(saved.thresholds.upper_pct(), 75);
}

#[test]
fn explicit_save_flushes_on_next_check() {
    let (mut app, mut hw, nvs, mut sink) = make_app();
    app.handle_command(AppCommand::SaveConfig, 0, &mut hw, &mut sink);
    assert!(app.auto_save_if_needed(1, &nvs));
    assert_eq!(*nvs.config_saves.borrow(), 1);
    // Nothing left to save.
    assert!(!app.auto_save_if_needed(10_000, &nvs));
}

#[test]
fn invalid_runtime_config_is_rejected() {
    let (mut app, mut hw, _nvs, mut sink) = make_app();
    let bad = SystemConfig {
        usage_stop_pct: 20.0,
        ..SystemConfig::default()
    };
    app.handle_command(AppCommand::UpdateConfig(bad), 0, &mut hw, &mut sink);
    assert!(!app.is_config_dirty());
    assert_eq!(app.current_config(), SystemConfig::default());
}

#[test]
fn force_save_writes_pending_change() {
    let (mut app, mut hw, nvs, mut sink) = make_app();
    app.handle_command(AppCommand::ApplySettings(thresholds(45, 55)), 0, &mut hw, &mut sink);
    app.force_save_if_dirty(&nvs);
    assert_eq!(nvs.saved_config().unwrap().thresholds.lower_pct(), 45);
}
