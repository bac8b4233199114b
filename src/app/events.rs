//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to a display.

use crate::error::SensorFault;
use crate::fsm::StateId;
use crate::fsm::context::{ControlEvent, StatusSnapshot, ThresholdPair};

use super::commands::CalibrationSource;
use super::ports::{NetworkError, StorageError};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the initial state and reference).
    Started { state: StateId, reference_bar: f32 },

    /// Forwarded from the controller (transitions, usage, leak, calibration).
    Control(ControlEvent),

    /// A calibration request was accepted.
    CalibrationRequested(CalibrationSource),

    /// The sensor reported a fault; actuators were forced off.
    SensorFault(SensorFault),

    /// The sensor produced a valid reading again.
    SensorRecovered,

    /// A new calibration reference reached flash.
    ReferencePersisted(f32),

    /// A new calibration reference could NOT be stored.  It stays in effect
    /// for this run but will be lost on restart.
    PersistenceFailed(StorageError),

    /// New thresholds are in effect.
    SettingsApplied(ThresholdPair),

    /// A settings payload was rejected; the previous thresholds remain.
    SettingsRejected(&'static str),

    /// A backend call failed.  Retried on the next periodic tick.
    NetworkFailed(NetworkError),

    /// Periodic telemetry snapshot.
    Telemetry(StatusSnapshot),
}
