//! Fuzz target: settings response decoder
//!
//! Feeds arbitrary response bodies to `wire::decode_settings` and checks:
//! - No panics under arbitrary byte inputs
//! - Any accepted threshold pair satisfies `lower < upper <= 100`
//! - `calibrate` is set exactly when the decoded command is `CALIBRATE`
//!
//! cargo fuzz run fuzz_settings_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use pressureguard::app::commands::ThresholdRequest;
use pressureguard::wire;

fuzz_target!(|data: &[u8]| {
    let Ok(update) = wire::decode_settings(data) else {
        return;
    };

    if let ThresholdRequest::Valid(pair) = update.thresholds {
        assert!(pair.lower_pct() < pair.upper_pct());
        assert!(pair.upper_pct() <= 100);
    }

    let command = wire::SettingsPayload::parse(data)
        .ok()
        .and_then(|p| p.command);
    assert_eq!(
        update.calibrate,
        command.as_deref() == Some(wire::CALIBRATE_COMMAND)
    );
});
