//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (settings
//! backend, serial console, BOOT button) that the
//! [`AppService`](super::service::AppService) interprets and acts upon
//! between ticks.

use crate::config::SystemConfig;
use crate::fsm::context::ThresholdPair;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Begin auto-calibration (ignored if one is already running).
    StartCalibration(CalibrationSource),

    /// Apply a decoded settings payload from the backend.
    ApplySettings(SettingsUpdate),

    /// Hot-reload the whole configuration.
    UpdateConfig(SystemConfig),

    /// Explicitly persist the current config to NVS immediately.
    SaveConfig,
}

/// Who asked for a calibration.  Logged only; all sources are equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    Console,
    Button,
    Remote,
}

/// Threshold part of a settings payload, already range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdRequest {
    /// The payload carried no thresholds.
    Absent,
    /// A consistent pair to apply atomically.
    Valid(ThresholdPair),
    /// The payload carried thresholds that failed validation.
    Invalid(&'static str),
}

/// One decoded settings fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub thresholds: ThresholdRequest,
    /// The backend asked for a calibration run.
    pub calibrate: bool,
}

impl SettingsUpdate {
    /// A fetch that changes nothing.
    pub const fn empty() -> Self {
        Self {
            thresholds: ThresholdRequest::Absent,
            calibrate: false,
        }
    }
}
