//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the pressure controller and the safety supervisor.
//! It exposes a hardware-agnostic API.  All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                 │         AppService          │
//! ActuatorPort ◀──│  Safety · PressureController │ ──▶ PersistencePort
//!                 └─────────────────────────────┘
//!        SettingsPort ──▶      ▲   │      ──▶ TelemetryPort / DisplayPort
//! ```

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::fsm::context::{ActuatorIntent, ControlEvent, StatusSnapshot};
use crate::fsm::{PressureController, StateId};
use crate::safety::{FaultEdge, SafetySupervisor};

use super::commands::{AppCommand, CalibrationSource, SettingsUpdate, ThresholdRequest};
use super::events::AppEvent;
use super::ports::{
    ActuatorPort, ConfigPort, DisplayPort, EventSink, PersistencePort, SensorPort, SettingsPort,
    TelemetryPort,
};

/// NVS namespace holding the calibration reference.
pub const REFERENCE_NAMESPACE: &str = "system_vars";
/// Key of the calibration reference inside [`REFERENCE_NAMESPACE`].
pub const REFERENCE_KEY: &str = "max_pressure";

/// Quiet time after the last config change before it is flushed to NVS.
const CONFIG_SAVE_DELAY_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    controller: PressureController,
    safety: SafetySupervisor,
    /// Time of the first unsaved config change.
    dirty_since_ms: Option<u64>,
    /// Explicit save requested; flush on the next check.
    save_requested: bool,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** restore the reference: call [`Self::start`] next.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            controller: PressureController::new(config),
            safety: SafetySupervisor::new(),
            dirty_since_ms: None,
            save_requested: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore the persisted reference and report the initial state.
    pub fn start(
        &mut self,
        persistence: &impl PersistencePort,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) {
        let stored = persistence.load_float(REFERENCE_KEY, 0.0);
        self.controller.restore_reference(stored, now_ms);
        self.forward_control_events(sink);

        let state = self.controller.state_id();
        let reference_bar = self.controller.reference_bar();
        sink.emit(&AppEvent::Started {
            state,
            reference_bar,
        });
        info!("AppService started in {:?} (reference {:.2} bar)", state, reference_bar);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one sampling cycle: read sensor → safety → controller → relays.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`]; this avoids a double mutable borrow while
    /// keeping the port boundary explicit.  Returns the intent applied.
    pub fn sample_tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl SensorPort + ActuatorPort),
        persistence: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) -> ActuatorIntent {
        // 1. Sample
        let sample = hw.read_pressure();

        // 2. Safety evaluation
        match self.safety.evaluate(&sample) {
            FaultEdge::Raised(fault) => sink.emit(&AppEvent::SensorFault(fault)),
            FaultEdge::Cleared => sink.emit(&AppEvent::SensorRecovered),
            FaultEdge::Steady => {}
        }

        // 3. Controller (skipped entirely on fault)
        let intent = match sample {
            Ok(bar) => self.controller.evaluate(bar, now_ms),
            Err(_) => self.controller.sensor_fault(),
        };

        // 4. Relays, gated by safety
        let applied = if self.safety.has_faults() {
            ActuatorIntent::all_off()
        } else {
            intent
        };
        hw.apply(applied);

        // 5. Events, persisting a fresh reference before the next tick
        if let Some(reference_bar) = self.forward_control_events(sink) {
            self.persist_reference(reference_bar, persistence, sink);
        }

        applied
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  Always runs between sample ticks.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::StartCalibration(source) => {
                if self.controller.start_calibration(now_ms) {
                    info!("calibration started by {:?}", source);
                    sink.emit(&AppEvent::CalibrationRequested(source));
                    // Relays stay off until the sensor is healthy again.
                    if !self.safety.has_faults() {
                        hw.apply(self.controller.intent());
                    }
                    self.forward_control_events(sink);
                }
            }
            AppCommand::ApplySettings(update) => {
                self.apply_settings(update, now_ms, hw, sink);
            }
            AppCommand::UpdateConfig(new_config) => match new_config.validate() {
                Ok(()) => {
                    self.controller.reconfigure(new_config);
                    self.mark_config_dirty(now_ms);
                    info!("Configuration updated at runtime");
                }
                Err(e) => {
                    warn!("Configuration rejected: {}", e);
                    sink.emit(&AppEvent::SettingsRejected("configuration failed validation"));
                }
            },
            AppCommand::SaveConfig => {
                self.mark_config_dirty(now_ms);
                self.save_requested = true;
                info!("Explicit config save requested (will flush on next auto-save check)");
            }
        }
    }

    /// Fetch settings synchronously and apply them.
    ///
    /// Used for the initial fetch at startup; the periodic path goes
    /// through the network worker instead.
    pub fn pull_settings(
        &mut self,
        backend: &mut impl SettingsPort,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> bool {
        match backend.fetch_settings() {
            Ok(update) => {
                self.apply_settings(update, now_ms, hw, sink);
                true
            }
            Err(e) => {
                warn!("settings fetch failed: {}", e);
                sink.emit(&AppEvent::NetworkFailed(e));
                false
            }
        }
    }

    /// Push one telemetry snapshot synchronously.
    pub fn push_telemetry(
        &mut self,
        backend: &mut impl TelemetryPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let status = self.status();
        sink.emit(&AppEvent::Telemetry(status));
        match backend.push_telemetry(&status) {
            Ok(()) => true,
            Err(e) => {
                warn!("telemetry push failed: {}", e);
                sink.emit(&AppEvent::NetworkFailed(e));
                false
            }
        }
    }

    /// Render the current status.
    pub fn render(&self, display: &mut impl DisplayPort) {
        display.render(&self.status());
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> StatusSnapshot {
        self.controller.status()
    }

    pub fn state(&self) -> StateId {
        self.controller.state_id()
    }

    pub fn controller(&self) -> &PressureController {
        &self.controller
    }

    /// Current sensor fault bitmask (0 = healthy).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> SystemConfig {
        self.controller.config().clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_settings(
        &mut self,
        update: SettingsUpdate,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        match update.thresholds {
            ThresholdRequest::Valid(pair) if pair != self.controller.thresholds() => {
                self.controller.apply_thresholds(pair);
                self.mark_config_dirty(now_ms);
                info!(
                    "thresholds set to {}-{}%",
                    pair.lower_pct(),
                    pair.upper_pct()
                );
                sink.emit(&AppEvent::SettingsApplied(pair));
            }
            ThresholdRequest::Valid(_) | ThresholdRequest::Absent => {}
            ThresholdRequest::Invalid(reason) => {
                warn!("settings rejected: {}", reason);
                sink.emit(&AppEvent::SettingsRejected(reason));
            }
        }

        if update.calibrate {
            self.handle_command(
                AppCommand::StartCalibration(CalibrationSource::Remote),
                now_ms,
                hw,
                sink,
            );
        }
    }

    /// Forward buffered controller events.  Returns a reference produced by
    /// a calibration that completed during this batch.
    fn forward_control_events(&mut self, sink: &mut impl EventSink) -> Option<f32> {
        let mut completed = None;
        for event in self.controller.drain_events() {
            if let ControlEvent::CalibrationComplete { reference_bar, .. } = event {
                completed = Some(reference_bar);
            }
            sink.emit(&AppEvent::Control(event));
        }
        completed
    }

    fn persist_reference(
        &mut self,
        reference_bar: f32,
        persistence: &mut impl PersistencePort,
        sink: &mut impl EventSink,
    ) {
        match persistence.store_float(REFERENCE_KEY, reference_bar) {
            Ok(()) => {
                info!("reference {:.2} bar saved", reference_bar);
                sink.emit(&AppEvent::ReferencePersisted(reference_bar));
            }
            Err(e) => {
                error!(
                    "reference {:.2} bar NOT saved ({}); it will be lost on restart",
                    reference_bar, e
                );
                sink.emit(&AppEvent::PersistenceFailed(e));
            }
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self, now_ms: u64) {
        if self.dirty_since_ms.is_none() {
            self.dirty_since_ms = Some(now_ms);
        }
    }

    /// Check if auto-save should trigger (5 seconds after the first change).
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, now_ms: u64, storage: &impl ConfigPort) -> bool {
        let Some(since) = self.dirty_since_ms else {
            return false;
        };
        if !self.save_requested && now_ms.saturating_sub(since) < CONFIG_SAVE_DELAY_MS {
            return false;
        }
        self.save_config(storage, "auto-saved")
    }

    /// Force-save if dirty (call before a planned restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if self.dirty_since_ms.is_some() {
            self.save_config(storage, "force-saved");
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.dirty_since_ms.is_some()
    }

    fn save_config(&mut self, storage: &impl ConfigPort, how: &str) -> bool {
        match storage.save(self.controller.config()) {
            Ok(()) => {
                self.dirty_since_ms = None;
                self.save_requested = false;
                info!("Config {} to NVS", how);
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                false
            }
        }
    }
}
