//! Network worker flow: main loop → NetBridge → HttpBackend (simulated
//! WiFi + HTTP) → outcome → AppService.

use crate::mock_hw::{MockHardware, MockNvs, RecordingSink};

use futures_lite::future::block_on;
use pressureguard::adapters::backend::HttpBackend;
use pressureguard::adapters::wifi::{ConnectivityPort, WifiAdapter};
use pressureguard::app::commands::AppCommand;
use pressureguard::app::events::AppEvent;
use pressureguard::app::ports::{EventSink, NetworkError};
use pressureguard::app::service::AppService;
use pressureguard::config::SystemConfig;
use pressureguard::fsm::StateId;
use pressureguard::net::{NetBridge, NetOutcome};

const URL: &str = "https://backend.invalid/exec";

fn online_backend() -> HttpBackend<WifiAdapter> {
    let mut wifi = WifiAdapter::new();
    wifi.set_credentials("PumpHouse", "hunter22").unwrap();
    wifi.connect(0).unwrap();
    HttpBackend::new(URL, wifi).unwrap()
}

/// Drain every outcome into the service, as the main loop does.
fn apply_outcomes(
    bridge: &NetBridge,
    app: &mut AppService,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
) {
    while let Some(outcome) = bridge.poll_outcome() {
        match outcome {
            NetOutcome::Settings(update) => {
                app.handle_command(AppCommand::ApplySettings(update), 0, hw, sink);
            }
            NetOutcome::Failed(e) => sink.emit(&AppEvent::NetworkFailed(e)),
        }
    }
}

fn make_app() -> (AppService, MockHardware, RecordingSink) {
    let nvs = MockNvs::with_reference(10.0);
    let mut app = AppService::new(SystemConfig::default());
    let mut sink = RecordingSink::new();
    app.start(&nvs, 0, &mut sink);
    (app, MockHardware::new(), sink)
}

#[test]
fn fetched_settings_reach_the_controller() {
    let bridge = NetBridge::new();
    let mut backend = online_backend();
    backend.sim_respond(Ok(br#"{"lowerThresholdPct":20,"upperThresholdPct":90,"command":""}"#));
    let (mut app, mut hw, mut sink) = make_app();

    assert!(bridge.request_settings());
    block_on(bridge.serve_one(&mut backend));
    apply_outcomes(&bridge, &mut app, &mut hw, &mut sink);

    let band = app.current_config().thresholds;
    assert_eq!((band.lower_pct(), band.upper_pct()), (20, 90));
}

#[test]
fn telemetry_is_sent_from_a_snapshot() {
    let bridge = NetBridge::new();
    let mut backend = online_backend();
    let (mut app, mut hw, mut sink) = make_app();
    let mut nvs = MockNvs::with_reference(10.0);

    hw.push_reading(6.2);
    app.sample_tick(0, &mut hw, &mut nvs, &mut sink);
    assert!(bridge.request_telemetry(app.status()));
    block_on(bridge.serve_one(&mut backend));

    assert_eq!(
        backend.sim_requests(),
        [format!("{URL}?action=update&pressure=6.20&pump=0&valve=1&leak=0")]
    );
    // Success produces no outcome.
    assert!(bridge.poll_outcome().is_none());
}

#[test]
fn link_down_is_reported_and_control_continues() {
    let bridge = NetBridge::new();
    let mut backend = online_backend();
    backend.link_mut().sim_drop_link();
    backend.link_mut().sim_fail_next_connects(10);
    let (mut app, mut hw, mut sink) = make_app();
    let mut nvs = MockNvs::with_reference(10.0);

    bridge.request_settings();
    block_on(bridge.serve_one(&mut backend));
    apply_outcomes(&bridge, &mut app, &mut hw, &mut sink);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::NetworkFailed(NetworkError::NotConnected))),
        1
    );

    // Regulation is unaffected.
    hw.push_reading(3.0);
    app.sample_tick(100, &mut hw, &mut nvs, &mut sink);
    assert_eq!(app.state(), StateId::UsingWater);
    assert!(hw.pump_on());
}

#[test]
fn http_error_keeps_previous_settings() {
    let bridge = NetBridge::new();
    let mut backend = online_backend();
    backend.sim_respond(Err(NetworkError::HttpStatus(503)));
    let (mut app, mut hw, mut sink) = make_app();

    bridge.request_settings();
    block_on(bridge.serve_one(&mut backend));
    apply_outcomes(&bridge, &mut app, &mut hw, &mut sink);

    assert_eq!(app.current_config(), SystemConfig::default());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::NetworkFailed(_))), 1);
}

#[test]
fn request_queue_is_bounded() {
    let bridge = NetBridge::new();
    let mut accepted = 0;
    for _ in 0..10 {
        if bridge.request_settings() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 4);
    assert_eq!(bridge.pending_requests(), 4);
}
