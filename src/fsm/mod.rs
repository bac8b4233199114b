//! Pressure controller state machine.
//!
//! Table-driven FSM in the classic embedded style: each state has an
//! optional `on_enter` / `on_exit` action stored as a plain `fn` pointer.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌────────────────────┬───────────┬───────────┐          │
//! │  │ StateId            │ on_enter  │ on_exit   │          │
//! │  ├────────────────────┼───────────┼───────────┤          │
//! │  │ Uncalibrated       │ fn(ctx)   │    -      │          │
//! │  │ Calibrating        │ fn(ctx)   │ fn(ctx)   │          │
//! │  │ Standby            │ fn(ctx)   │    -      │          │
//! │  │ UsingWater         │ fn(ctx)   │ fn(ctx)   │          │
//! │  │ HighPressureRelief │ fn(ctx)   │ fn(ctx)   │          │
//! │  │ LeakSuspected      │ fn(ctx)   │ fn(ctx)   │          │
//! │  └────────────────────┴───────────┴───────────┘          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a per-state `on_update` design, the regulation rules are ordered
//! and shared by every calibrated state (see [`states::apply_rules`]).  After
//! the rules run the controller derives its resting state from the context
//! and performs the `on_exit` → `on_enter` transition when the state id
//! changes.

pub mod context;
pub mod states;

use heapless::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::control::calibration::CalibrationRun;
use crate::control::percent_of_reference;
use context::{
    ActuatorIntent, ControlEvent, EVENT_CAPACITY, FsmContext, StatusSnapshot, ThresholdPair,
};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StateId {
    Uncalibrated = 0,
    Calibrating = 1,
    Standby = 2,
    UsingWater = 3,
    HighPressureRelief = 4,
    LeakSuspected = 5,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Operator-facing label shown on the status line.
    pub fn label(self) -> &'static str {
        match self {
            Self::Uncalibrated => "Uncalibrated",
            Self::Calibrating => "Calibrating...",
            Self::Standby => "Standby",
            Self::UsingWater => "Using Water",
            Self::HighPressureRelief => "High Pressure Relief",
            Self::LeakSuspected => "!!! LEAK DETECTED !!!",
        }
    }
}

/// The active state with its per-state data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerState {
    Uncalibrated,
    Calibrating(CalibrationRun),
    Standby { idle_since_ms: u64 },
    UsingWater,
    HighPressureRelief,
    LeakSuspected { idle_since_ms: u64 },
}

impl ControllerState {
    pub fn id(&self) -> StateId {
        match self {
            Self::Uncalibrated => StateId::Uncalibrated,
            Self::Calibrating(_) => StateId::Calibrating,
            Self::Standby { .. } => StateId::Standby,
            Self::UsingWater => StateId::UsingWater,
            Self::HighPressureRelief => StateId::HighPressureRelief,
            Self::LeakSuspected { .. } => StateId::LeakSuspected,
        }
    }
}

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Static descriptor for a single state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// The pressure controller.
///
/// Owns the state table, the active [`ControllerState`] and the
/// [`FsmContext`].  It only decides: every operation returns the
/// [`ActuatorIntent`] the caller should apply.
pub struct PressureController {
    table: [StateDescriptor; StateId::COUNT],
    state: ControllerState,
    ctx: FsmContext,
    /// Latest valid reading, cleared on sensor fault.
    last_reading_bar: Option<f32>,
    /// Set by a faulted tick, cleared by the next valid reading.
    sensor_faulted: bool,
}

impl PressureController {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            table: states::build_state_table(),
            state: ControllerState::Uncalibrated,
            ctx: FsmContext::new(config),
            last_reading_bar: None,
            sensor_faulted: false,
        }
    }

    /// Restore a persisted reference at startup.
    ///
    /// A positive finite reference moves the controller straight to
    /// `Standby`; anything else leaves it uncalibrated.  Ignored while a
    /// calibration is running.
    pub fn restore_reference(&mut self, reference_bar: f32, now_ms: u64) -> bool {
        if matches!(self.state, ControllerState::Calibrating(_)) {
            return false;
        }
        if !(reference_bar.is_finite() && reference_bar > 0.0) {
            info!("no stored reference ({reference_bar}), waiting for calibration");
            self.ctx.reference_bar = 0.0;
            return false;
        }
        self.ctx.reference_bar = reference_bar;
        info!("restored reference {reference_bar:.2} bar");
        self.transition(ControllerState::Standby {
            idle_since_ms: now_ms,
        });
        true
    }

    /// Evaluate one valid pressure sample.
    ///
    /// Total for every input: a negative or non-finite reading is handled
    /// exactly like [`Self::sensor_fault`].
    pub fn evaluate(&mut self, reading_bar: f32, now_ms: u64) -> ActuatorIntent {
        if !(reading_bar.is_finite() && reading_bar >= 0.0) {
            warn!("rejecting invalid reading {reading_bar}");
            return self.sensor_fault();
        }
        self.last_reading_bar = Some(reading_bar);
        self.sensor_faulted = false;

        // 1. Calibration owns the tick.
        let calibration = match &mut self.state {
            ControllerState::Calibrating(run) => Some((
                self.ctx.calibration.step(run, reading_bar, now_ms),
                *run,
            )),
            _ => None,
        };
        if let Some((result, run)) = calibration {
            return self.calibration_tick(result, run, reading_bar, now_ms);
        }

        // 2. No reference, no control.
        let Some(pct) = percent_of_reference(reading_bar, self.ctx.reference_bar) else {
            return self.ctx.intent;
        };

        // 3. Ordered rules, then settle into the resulting state.
        states::apply_rules(
            &mut self.ctx,
            states::Sample {
                reading_bar,
                pct,
                now_ms,
            },
        );
        self.settle(now_ms);
        self.ctx.intent
    }

    /// Begin a calibration run.  Returns `false` if one is already running.
    pub fn start_calibration(&mut self, now_ms: u64) -> bool {
        if matches!(self.state, ControllerState::Calibrating(_)) {
            info!("calibration already running, ignoring request");
            return false;
        }
        self.ctx.using_water = false;
        if self.ctx.config.clear_leak_on_calibration {
            self.ctx.leak_detected = false;
        }
        let run = self.ctx.calibration.start(now_ms);
        self.transition(ControllerState::Calibrating(run));
        if self.sensor_faulted {
            // The first valid reading re-asserts the pump.
            warn!("calibration started during sensor fault, pump held off");
            self.ctx.intent = ActuatorIntent::all_off();
        }
        true
    }

    /// Sensor fault for this tick: force everything off, change nothing else.
    pub fn sensor_fault(&mut self) -> ActuatorIntent {
        self.last_reading_bar = None;
        self.sensor_faulted = true;
        self.ctx.intent = ActuatorIntent::all_off();
        self.ctx.intent
    }

    /// Replace the regulation band.  Takes effect on the next evaluation.
    pub fn apply_thresholds(&mut self, thresholds: ThresholdPair) {
        self.ctx.config.thresholds = thresholds;
    }

    /// Replace the whole configuration.  Callers validate first.
    pub fn reconfigure(&mut self, config: SystemConfig) {
        self.ctx.reconfigure(config);
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            pressure_bar: self.last_reading_bar,
            percent: self
                .last_reading_bar
                .and_then(|r| percent_of_reference(r, self.ctx.reference_bar)),
            pump_on: self.ctx.intent.pump_on,
            valve_open: self.ctx.intent.valve_open,
            leak_detected: self.ctx.leak_detected,
            state: self.state.id(),
            reference_bar: self.ctx.reference_bar,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ControlEvent, EVENT_CAPACITY> {
        self.ctx.take_events()
    }

    // -- Accessors --

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn state_id(&self) -> StateId {
        self.state.id()
    }

    pub fn intent(&self) -> ActuatorIntent {
        self.ctx.intent
    }

    pub fn reference_bar(&self) -> f32 {
        self.ctx.reference_bar
    }

    pub fn thresholds(&self) -> ThresholdPair {
        self.ctx.config.thresholds
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    pub fn is_leak_detected(&self) -> bool {
        self.ctx.leak_detected
    }

    pub fn is_using_water(&self) -> bool {
        self.ctx.using_water
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.state, ControllerState::Calibrating(_))
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn calibration_tick(
        &mut self,
        result: Option<f32>,
        run: CalibrationRun,
        reading_bar: f32,
        now_ms: u64,
    ) -> ActuatorIntent {
        // Calibration is never idle: keep the leak window fresh.
        self.ctx.leak.reset(reading_bar, now_ms);
        self.ctx.intent = ActuatorIntent::pressurise();

        let Some(reference) = result else {
            return self.ctx.intent;
        };

        let reference_bar = if reference.is_finite() { reference } else { 0.0 };
        self.ctx.reference_bar = reference_bar;
        self.ctx.emit(ControlEvent::CalibrationComplete {
            peak_bar: run.peak_so_far_bar,
            reference_bar,
        });

        if reference_bar > 0.0 {
            info!(
                "calibration complete: peak {:.2} bar, reference {:.2} bar after {} ms",
                run.peak_so_far_bar,
                reference_bar,
                now_ms.saturating_sub(run.started_at_ms)
            );
            self.transition(ControllerState::Standby {
                idle_since_ms: now_ms,
            });
        } else {
            warn!("calibration saw no pressure, controller stays uncalibrated");
            self.transition(ControllerState::Uncalibrated);
        }
        self.ctx.intent
    }

    /// Derive the resting state from the context after the rules ran.
    fn settle(&mut self, now_ms: u64) {
        let next = if self.ctx.using_water {
            ControllerState::UsingWater
        } else if self.ctx.intent.valve_open {
            ControllerState::HighPressureRelief
        } else {
            let idle_since_ms = match self.state {
                ControllerState::Standby { idle_since_ms }
                | ControllerState::LeakSuspected { idle_since_ms } => idle_since_ms,
                _ => now_ms,
            };
            if self.ctx.leak_detected {
                ControllerState::LeakSuspected { idle_since_ms }
            } else {
                ControllerState::Standby { idle_since_ms }
            }
        };
        self.transition(next);
    }

    fn transition(&mut self, next: ControllerState) {
        let from = self.state.id();
        let to = next.id();
        if from == to {
            self.state = next;
            return;
        }

        info!(
            "FSM transition: {} -> {}",
            self.table[from as usize].name, self.table[to as usize].name
        );

        if let Some(exit) = self.table[from as usize].on_exit {
            exit(&mut self.ctx);
        }

        self.state = next;

        if let Some(enter) = self.table[to as usize].on_enter {
            enter(&mut self.ctx);
        }

        self.ctx.emit(ControlEvent::StateChanged { from, to });
    }
}
