//! Shared mutable context threaded through every state handler and rule.
//!
//! `FsmContext` is the single struct that the controller's rules read from
//! and write to: configuration, the calibration reference, the held
//! actuator intent, usage/leak bookkeeping and the outbound event buffer.

use heapless::Vec;
use log::warn;
use serde::{Deserialize, Serialize};

use super::StateId;
use crate::app::ports::ConfigError;
use crate::config::SystemConfig;
use crate::control::calibration::CalibrationEngine;
use crate::control::leak::LeakMonitor;
use crate::control::usage::UsageDetector;

// ---------------------------------------------------------------------------
// Actuator intent (written by rules; consumed by the service)
// ---------------------------------------------------------------------------

/// Desired relay levels.  The controller decides, the service actuates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActuatorIntent {
    pub pump_on: bool,
    pub valve_open: bool,
}

impl ActuatorIntent {
    /// Both relays de-energised.
    pub const fn all_off() -> Self {
        Self {
            pump_on: false,
            valve_open: false,
        }
    }

    /// Pump running against a closed valve.
    pub const fn pressurise() -> Self {
        Self {
            pump_on: true,
            valve_open: false,
        }
    }

    /// Pump off, valve closed: the only state in which leaks are checked.
    pub fn is_idle(&self) -> bool {
        !self.pump_on && !self.valve_open
    }
}

// ---------------------------------------------------------------------------
// Threshold pair
// ---------------------------------------------------------------------------

/// Lower/upper regulation band in whole percent.
///
/// Fields are private so every instance satisfies
/// `lower < upper <= 100`; replacing the whole value is the only way to
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPair {
    lower_pct: u8,
    upper_pct: u8,
}

impl ThresholdPair {
    pub const DEFAULT: Self = Self {
        lower_pct: 40,
        upper_pct: 60,
    };

    pub fn new(lower_pct: u8, upper_pct: u8) -> Result<Self, ConfigError> {
        if upper_pct > 100 {
            return Err(ConfigError::ValidationFailed(
                "upper threshold must be at most 100%",
            ));
        }
        if lower_pct >= upper_pct {
            return Err(ConfigError::ValidationFailed(
                "lower threshold must be below upper threshold",
            ));
        }
        Ok(Self {
            lower_pct,
            upper_pct,
        })
    }

    pub fn lower_pct(&self) -> u8 {
        self.lower_pct
    }

    pub fn upper_pct(&self) -> u8 {
        self.upper_pct
    }
}

impl Default for ThresholdPair {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Status snapshot (read-only view for display and telemetry)
// ---------------------------------------------------------------------------

/// Point-in-time view of the controller for display and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Latest valid reading, `None` while the sensor is faulted or unread.
    pub pressure_bar: Option<f32>,
    /// Reading as percent of the reference, `None` when uncalibrated.
    pub percent: Option<f32>,
    pub pump_on: bool,
    pub valve_open: bool,
    pub leak_detected: bool,
    pub state: StateId,
    pub reference_bar: f32,
}

// ---------------------------------------------------------------------------
// Control events (buffered by the controller, drained by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    StateChanged { from: StateId, to: StateId },
    UsageStarted { pct: f32 },
    UsageStopped { pct: f32 },
    /// Rising edge of the leak flag.
    LeakDetected { baseline_bar: f32, current_bar: f32 },
    CalibrationStarted,
    CalibrationComplete { peak_bar: f32, reference_bar: f32 },
}

/// Events buffered per evaluation.  One tick produces at most a handful.
pub const EVENT_CAPACITY: usize = 8;

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler and rule.
pub struct FsmContext {
    // -- Configuration --
    pub config: SystemConfig,
    pub usage: UsageDetector,
    pub calibration: CalibrationEngine,

    // -- Reference --
    /// Pressure that defines 100 %.  `<= 0` means uncalibrated.
    pub reference_bar: f32,

    // -- Actuator outputs --
    /// Held intent; rules modify it in place.
    pub intent: ActuatorIntent,

    // -- Usage / leak --
    pub using_water: bool,
    /// Time of the most recent below-band sample, `None` before any draw.
    pub last_usage_at_ms: Option<u64>,
    pub leak_detected: bool,
    pub leak: LeakMonitor,

    events: Vec<ControlEvent, EVENT_CAPACITY>,
}

impl FsmContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            usage: UsageDetector::new(config.usage_stop_pct),
            calibration: CalibrationEngine::from_config(&config),
            leak: LeakMonitor::new(config.leak_window_ms, config.leak_drop_threshold_bar),
            config,
            reference_bar: 0.0,
            intent: ActuatorIntent::all_off(),
            using_water: false,
            last_usage_at_ms: None,
            leak_detected: false,
            events: Vec::new(),
        }
    }

    /// Swap in a new configuration, rebuilding the derived policies.
    ///
    /// An open leak window is discarded because its length may have changed.
    pub fn reconfigure(&mut self, config: SystemConfig) {
        self.usage = UsageDetector::new(config.usage_stop_pct);
        self.calibration = CalibrationEngine::from_config(&config);
        self.leak = LeakMonitor::new(config.leak_window_ms, config.leak_drop_threshold_bar);
        self.config = config;
    }

    /// Whether idle regulation may act at `now_ms`.
    pub fn usage_delay_elapsed(&self, now_ms: u64) -> bool {
        match self.last_usage_at_ms {
            Some(t) => now_ms.saturating_sub(t) >= u64::from(self.config.no_usage_delay_ms),
            None => true,
        }
    }

    /// Pump off, valve closed and no draw in progress.
    pub fn fully_idle(&self) -> bool {
        self.intent.is_idle() && !self.using_water
    }

    pub fn emit(&mut self, event: ControlEvent) {
        if self.events.push(event).is_err() {
            warn!("control event buffer full, dropping {:?}", event);
        }
    }

    pub fn take_events(&mut self) -> Vec<ControlEvent, EVENT_CAPACITY> {
        core::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_pair_rejects_inverted_band() {
        assert!(ThresholdPair::new(60, 40).is_err());
        assert!(ThresholdPair::new(50, 50).is_err());
        assert!(ThresholdPair::new(10, 101).is_err());
        assert!(ThresholdPair::new(0, 100).is_ok());
    }

    #[test]
    fn usage_delay_open_before_first_draw() {
        let ctx = FsmContext::new(SystemConfig::default());
        assert!(ctx.usage_delay_elapsed(0));
    }

    #[test]
    fn usage_delay_measured_from_last_draw() {
        let mut ctx = FsmContext::new(SystemConfig::default());
        ctx.last_usage_at_ms = Some(10_000);
        assert!(!ctx.usage_delay_elapsed(14_999));
        assert!(ctx.usage_delay_elapsed(15_000));
    }

    #[test]
    fn event_buffer_drops_on_overflow() {
        let mut ctx = FsmContext::new(SystemConfig::default());
        for _ in 0..EVENT_CAPACITY + 3 {
            ctx.emit(ControlEvent::CalibrationStarted);
        }
        assert_eq!(ctx.take_events().len(), EVENT_CAPACITY);
        assert!(ctx.take_events().is_empty());
    }
}
