//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensor, relays, backend, storage, display, event sinks)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! or the network directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **PersistencePort** writes are synchronous: the calibration reference
//!   is on flash (or reported as failed) before the next tick runs.
//! - All port errors are typed; callers handle every variant explicitly.

use core::fmt;

use crate::config::SystemConfig;
use crate::error::SensorFault;
use crate::fsm::context::{ActuatorIntent, StatusSnapshot};

use super::commands::SettingsUpdate;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: one pressure sample per sampling tick.
pub trait SensorPort {
    /// A valid non-negative pressure in bar, or the fault that prevented it.
    fn read_pressure(&mut self) -> Result<f32, SensorFault>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: two independent level outputs.
pub trait ActuatorPort {
    /// Energise (`true`) or release the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Open (`true`) or close the relief valve.
    fn set_valve(&mut self, open: bool);

    /// Drive both outputs to match `intent`.
    fn apply(&mut self, intent: ActuatorIntent) {
        self.set_pump(intent.pump_on);
        self.set_valve(intent.valve_open);
    }
}

// ───────────────────────────────────────────────────────────────
// Backend ports (settings inbound, telemetry outbound)
// ───────────────────────────────────────────────────────────────

/// Pull-model settings source.
pub trait SettingsPort {
    /// Fetch the current thresholds and pending command.
    fn fetch_settings(&mut self) -> Result<SettingsUpdate, NetworkError>;
}

/// Push-model telemetry sink.
pub trait TelemetryPort {
    fn push_telemetry(&mut self, status: &StatusSnapshot) -> Result<(), NetworkError>;
}

// ───────────────────────────────────────────────────────────────
// Persistence port (calibration reference)
// ───────────────────────────────────────────────────────────────

/// Single-float persistence used for the calibration reference.
pub trait PersistencePort {
    /// Stored value for `key`, or `default` if absent or unreadable.
    fn load_float(&self, key: &str, default: f32) -> f32;

    /// Store `value` under `key`.  Returns once the write is durable.
    fn store_float(&mut self, key: &str, value: f32) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Display port (observational only)
// ───────────────────────────────────────────────────────────────

/// Renders a status snapshot.  Nothing flows back into the core.
pub trait DisplayPort {
    fn render(&mut self, status: &StatusSnapshot);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped, so a bad remote setting can never end up on flash.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Keys are namespaced to prevent collisions between subsystems.  Writes
/// MUST be atomic: no partial writes on power loss.  The ESP-IDF NVS API
/// guarantees this natively; the in-memory simulation trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the main loop)
// ───────────────────────────────────────────────────────────────

/// Periodic jobs driven by the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledTask {
    /// Read the sensor and evaluate the controller.
    Sample,
    /// Refresh the status line.
    Display,
    /// Push a telemetry snapshot.
    Telemetry,
    /// Pull thresholds and commands.
    Settings,
}

/// Callback trait that the scheduler invokes when a schedule fires.
///
/// The scheduler knows nothing about queues or the service; the main loop
/// implements this to enqueue the matching job.
pub trait SchedulerDelegate {
    /// * `label` - the human-readable label of the schedule that fired.
    /// * `task`  - the job bound to that schedule.
    fn on_schedule_fired(&mut self, label: &str, task: ScheduledTask);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] and [`PersistencePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`SettingsPort`] and [`TelemetryPort`] operations.
///
/// Always non-fatal: the next periodic tick simply retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Station is not associated.
    NotConnected,
    /// The request did not complete in time.
    Timeout,
    /// The backend answered with a non-success status.
    HttpStatus(u16),
    /// The response body could not be decoded.
    MalformedResponse,
    /// Transport-level failure (DNS, TLS, socket).
    RequestFailed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Timeout => write!(f, "request timed out"),
            Self::HttpStatus(code) => write!(f, "HTTP status {}", code),
            Self::MalformedResponse => write!(f, "malformed response"),
            Self::RequestFailed => write!(f, "request failed"),
        }
    }
}
