//! Backend wire formats.
//!
//! The backend is a plain HTTP endpoint driven by query strings:
//!
//! | Direction | Request                                                      | Body          |
//! |-----------|--------------------------------------------------------------|---------------|
//! | Telemetry | `?action=update&pressure=6.20&pump=0&valve=1&leak=0`        | ignored       |
//! | Settings  | `?action=getSettings`                                        | JSON (below)  |
//!
//! ```json
//! {"lowerThresholdPct": 40, "upperThresholdPct": 60, "command": "CALIBRATE"}
//! ```
//!
//! `command` may be absent or empty.  A bad threshold pair is rejected on
//! its own; a valid command in the same payload is still honoured.

use core::fmt::Write;

use serde::Deserialize;

use crate::app::commands::{SettingsUpdate, ThresholdRequest};
use crate::app::ports::NetworkError;
use crate::fsm::context::{StatusSnapshot, ThresholdPair};

/// Query string for a settings fetch.
pub const SETTINGS_QUERY: &str = "?action=getSettings";

/// Command word that requests a calibration run.  Case-sensitive.
pub const CALIBRATE_COMMAND: &str = "CALIBRATE";

/// Pressure reported while the sensor is faulted.
pub const FAULT_PRESSURE: f32 = -1.0;

/// Longest telemetry query string ever produced.
pub const TELEMETRY_QUERY_CAP: usize = 96;

// ───────────────────────────────────────────────────────────────
// Settings (inbound)
// ───────────────────────────────────────────────────────────────

/// Raw JSON body of a settings response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    pub lower_threshold_pct: Option<f64>,
    pub upper_threshold_pct: Option<f64>,
    #[serde(default)]
    pub command: Option<String>,
}

impl SettingsPayload {
    /// Parse a response body.
    pub fn parse(body: &[u8]) -> Result<Self, NetworkError> {
        serde_json::from_slice(body).map_err(|_| NetworkError::MalformedResponse)
    }

    /// Validate into a [`SettingsUpdate`].
    pub fn into_update(self) -> SettingsUpdate {
        let thresholds = match (self.lower_threshold_pct, self.upper_threshold_pct) {
            (None, None) => ThresholdRequest::Absent,
            (Some(lower), Some(upper)) => match (whole_percent(lower), whole_percent(upper)) {
                (Some(lower), Some(upper)) => match ThresholdPair::new(lower, upper) {
                    Ok(pair) => ThresholdRequest::Valid(pair),
                    Err(_) => ThresholdRequest::Invalid("lower threshold must be below upper"),
                },
                _ => ThresholdRequest::Invalid("thresholds must be whole percentages 0-100"),
            },
            _ => ThresholdRequest::Invalid("both thresholds are required"),
        };

        SettingsUpdate {
            thresholds,
            calibrate: self.command.as_deref() == Some(CALIBRATE_COMMAND),
        }
    }
}

/// Decode a settings response body in one step.
pub fn decode_settings(body: &[u8]) -> Result<SettingsUpdate, NetworkError> {
    SettingsPayload::parse(body).map(SettingsPayload::into_update)
}

fn whole_percent(value: f64) -> Option<u8> {
    if value.is_finite() && value.fract() == 0.0 && (0.0..=100.0).contains(&value) {
        Some(value as u8)
    } else {
        None
    }
}

// ───────────────────────────────────────────────────────────────
// Telemetry (outbound)
// ───────────────────────────────────────────────────────────────

/// Build the telemetry query string for one snapshot.
pub fn telemetry_query(status: &StatusSnapshot) -> heapless::String<TELEMETRY_QUERY_CAP> {
    let pressure = status.pressure_bar.unwrap_or(FAULT_PRESSURE);
    let mut query = heapless::String::new();
    // Worst case ("-1.00" up to "12.00" plus flags) is well under capacity.
    let _ = write!(
        query,
        "?action=update&pressure={:.2}&pump={}&valve={}&leak={}",
        pressure,
        u8::from(status.pump_on),
        u8::from(status.valve_open),
        u8::from(status.leak_detected),
    );
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::StateId;

    fn snapshot(pressure_bar: Option<f32>) -> StatusSnapshot {
        StatusSnapshot {
            pressure_bar,
            percent: None,
            pump_on: true,
            valve_open: false,
            leak_detected: true,
            state: StateId::UsingWater,
            reference_bar: 10.0,
        }
    }

    #[test]
    fn full_payload_decodes() {
        let update =
            decode_settings(br#"{"lowerThresholdPct":30,"upperThresholdPct":70,"command":"CALIBRATE"}"#)
                .unwrap();
        assert_eq!(
            update.thresholds,
            ThresholdRequest::Valid(ThresholdPair::new(30, 70).unwrap())
        );
        assert!(update.calibrate);
    }

    #[test]
    fn empty_command_is_no_calibration() {
        let update =
            decode_settings(br#"{"lowerThresholdPct":40,"upperThresholdPct":60,"command":""}"#)
                .unwrap();
        assert!(!update.calibrate);
        let update = decode_settings(br#"{"lowerThresholdPct":40,"upperThresholdPct":60}"#).unwrap();
        assert!(!update.calibrate);
    }

    #[test]
    fn command_is_case_sensitive() {
        let update = decode_settings(br#"{"command":"calibrate"}"#).unwrap();
        assert!(!update.calibrate);
        assert_eq!(update.thresholds, ThresholdRequest::Absent);
    }

    #[test]
    fn inverted_pair_rejected_but_command_kept() {
        let update =
            decode_settings(br#"{"lowerThresholdPct":70,"upperThresholdPct":30,"command":"CALIBRATE"}"#)
                .unwrap();
        assert!(matches!(update.thresholds, ThresholdRequest::Invalid(_)));
        assert!(update.calibrate);
    }

    #[test]
    fn partial_or_out_of_range_pairs_rejected() {
        let bodies: [&[u8]; 4] = [
            br#"{"lowerThresholdPct":40}"#,
            br#"{"lowerThresholdPct":40,"upperThresholdPct":120}"#,
            br#"{"lowerThresholdPct":-5,"upperThresholdPct":60}"#,
            br#"{"lowerThresholdPct":40.5,"upperThresholdPct":60}"#,
        ];
        for body in bodies {
            let update = decode_settings(body).unwrap();
            assert!(
                matches!(update.thresholds, ThresholdRequest::Invalid(_)),
                "accepted {:?}",
                core::str::from_utf8(body)
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(
            decode_settings(b"<html>502</html>"),
            Err(NetworkError::MalformedResponse)
        );
        assert_eq!(
            decode_settings(br#"{"lowerThresholdPct":"forty"}"#),
            Err(NetworkError::MalformedResponse)
        );
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let update = decode_settings(br#"{"lowerThresholdPct":35,"upperThresholdPct":65,"note":"x"}"#)
            .unwrap();
        assert!(matches!(update.thresholds, ThresholdRequest::Valid(_)));
    }

    #[test]
    fn telemetry_query_format() {
        assert_eq!(
            telemetry_query(&snapshot(Some(6.2))).as_str(),
            "?action=update&pressure=6.20&pump=1&valve=0&leak=1"
        );
    }

    #[test]
    fn telemetry_reports_fault_as_negative() {
        assert_eq!(
            telemetry_query(&snapshot(None)).as_str(),
            "?action=update&pressure=-1.00&pump=1&valve=0&leak=1"
        );
    }
}
