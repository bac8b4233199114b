//! State actions, the table builder and the ordered regulation rules.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  UNCALIBRATED ──[calibrate]──▶ CALIBRATING ──[plateau | timeout]──▶ STANDBY
//!                                      ▲                                │ ▲
//!            any state ──[calibrate]───┘              [pct < lower]     │ │ [pct >= 98]
//!                                                                       ▼ │
//!                                                                   USING WATER
//!
//!  STANDBY ──[pct >= upper]──▶ HIGH PRESSURE RELIEF ──[lower <= pct < upper]──▶ STANDBY
//!  STANDBY ──[idle drop > threshold over one window]──▶ LEAK SUSPECTED ──[draw]──▶ USING WATER
//! ```
//!
//! Rules run in a fixed order every calibrated tick; a draw always wins
//! over regulation and leak checks in the same tick.

use log::{debug, info, warn};

use super::context::{ActuatorIntent, ControlEvent, FsmContext};
use super::{StateDescriptor, StateId};
use crate::control::leak::LeakObservation;
use crate::control::usage::UsageTransition;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once per controller.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 - Uncalibrated
        StateDescriptor {
            id: StateId::Uncalibrated,
            name: "Uncalibrated",
            on_enter: Some(uncalibrated_enter),
            on_exit: None,
        },
        // Index 1 - Calibrating
        StateDescriptor {
            id: StateId::Calibrating,
            name: "Calibrating",
            on_enter: Some(calibrating_enter),
            on_exit: Some(calibrating_exit),
        },
        // Index 2 - Standby
        StateDescriptor {
            id: StateId::Standby,
            name: "Standby",
            on_enter: Some(standby_enter),
            on_exit: None,
        },
        // Index 3 - UsingWater
        StateDescriptor {
            id: StateId::UsingWater,
            name: "UsingWater",
            on_enter: Some(using_water_enter),
            on_exit: Some(using_water_exit),
        },
        // Index 4 - HighPressureRelief
        StateDescriptor {
            id: StateId::HighPressureRelief,
            name: "HighPressureRelief",
            on_enter: Some(relief_enter),
            on_exit: Some(relief_exit),
        },
        // Index 5 - LeakSuspected
        StateDescriptor {
            id: StateId::LeakSuspected,
            name: "LeakSuspected",
            on_enter: Some(leak_enter),
            on_exit: Some(leak_exit),
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  State actions
// ═══════════════════════════════════════════════════════════════════════════

fn uncalibrated_enter(ctx: &mut FsmContext) {
    info!(
        "UNCALIBRATED: reference {:.2} bar, regulation disabled until calibrated",
        ctx.reference_bar
    );
}

fn calibrating_enter(ctx: &mut FsmContext) {
    // Pump flat out against a closed valve.
    ctx.intent = ActuatorIntent::pressurise();
    ctx.emit(ControlEvent::CalibrationStarted);
    info!(
        "CALIBRATING: pump on, valve closed (plateau {} ms, timeout {} ms)",
        ctx.config.calibration_plateau_ms, ctx.config.calibration_timeout_ms
    );
}

fn calibrating_exit(ctx: &mut FsmContext) {
    ctx.intent.pump_on = false;
    info!("CALIBRATING: pump stopped");
}

fn standby_enter(ctx: &mut FsmContext) {
    debug!(
        "STANDBY: band {}-{}%",
        ctx.config.thresholds.lower_pct(),
        ctx.config.thresholds.upper_pct()
    );
}

fn using_water_enter(_ctx: &mut FsmContext) {
    info!("USING WATER: pump on to follow the draw");
}

fn using_water_exit(ctx: &mut FsmContext) {
    info!("USING WATER: draw finished, pump={}", ctx.intent.pump_on);
}

fn relief_enter(_ctx: &mut FsmContext) {
    info!("RELIEF: valve open, bleeding down");
}

fn relief_exit(ctx: &mut FsmContext) {
    info!("RELIEF: valve {}", if ctx.intent.valve_open { "open" } else { "closed" });
}

fn leak_enter(ctx: &mut FsmContext) {
    warn!(
        "LEAK SUSPECTED: pressure decaying while idle ({:.2} bar reference)",
        ctx.reference_bar
    );
}

fn leak_exit(ctx: &mut FsmContext) {
    info!("LEAK SUSPECTED: cleared, leak flag={}", ctx.leak_detected);
}

// ═══════════════════════════════════════════════════════════════════════════
//  Regulation rules
// ═══════════════════════════════════════════════════════════════════════════

/// One valid, calibrated sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub reading_bar: f32,
    /// `reading_bar` as percent of the reference.
    pub pct: f32,
    pub now_ms: u64,
}

/// Apply rules a-d in order.
pub fn apply_rules(ctx: &mut FsmContext, s: Sample) {
    let was_idle = ctx.fully_idle();
    if s.pct < f32::from(ctx.config.thresholds.lower_pct()) {
        usage_rule(ctx, s);
    } else {
        usage_stop_rule(ctx, s);
    }
    idle_regulation_rule(ctx, s);
    leak_rule(ctx, s, was_idle);
}

/// (a) Below the band: a draw is in progress.
pub fn usage_rule(ctx: &mut FsmContext, s: Sample) {
    if !ctx.using_water {
        info!("usage started at {:.1}%", s.pct);
        ctx.emit(ControlEvent::UsageStarted { pct: s.pct });
    }
    if ctx.leak_detected {
        info!("leak flag cleared by water usage");
    }
    ctx.using_water = true;
    ctx.last_usage_at_ms = Some(s.now_ms);
    ctx.leak_detected = false;
    ctx.intent = ActuatorIntent::pressurise();
}

/// (b) Inside or above the band: end a draw once pressure has recovered.
pub fn usage_stop_rule(ctx: &mut FsmContext, s: Sample) {
    match ctx
        .usage
        .classify(s.pct, ctx.config.thresholds, ctx.using_water)
    {
        UsageTransition::Stopped => {
            info!("usage stopped at {:.1}%", s.pct);
            ctx.using_water = false;
            ctx.intent.pump_on = false;
            ctx.emit(ControlEvent::UsageStopped { pct: s.pct });
        }
        // Recovering: keep refilling even if a fault tick dropped the pump.
        UsageTransition::Continuing => ctx.intent = ActuatorIntent::pressurise(),
        UsageTransition::Started | UsageTransition::Idle => {}
    }
}

/// (c) Idle regulation: bleed down above the band, hold inside it.
pub fn idle_regulation_rule(ctx: &mut FsmContext, s: Sample) {
    if ctx.using_water || !ctx.usage_delay_elapsed(s.now_ms) {
        return;
    }
    let lower = f32::from(ctx.config.thresholds.lower_pct());
    let upper = f32::from(ctx.config.thresholds.upper_pct());

    if s.pct >= upper {
        if !ctx.intent.valve_open {
            info!("valve open at {:.1}% (upper {:.0}%)", s.pct, upper);
            ctx.intent.pump_on = false;
            ctx.intent.valve_open = true;
        }
    } else if s.pct >= lower && ctx.intent.valve_open {
        info!("valve closed at {:.1}%", s.pct);
        ctx.intent.valve_open = false;
    }
}

/// (d) Leak check while fully idle; any activity restarts the window.
///
/// A tick that only just became idle also restarts it, so the window
/// baseline is always an idle reading.
pub fn leak_rule(ctx: &mut FsmContext, s: Sample, was_idle: bool) {
    if !(was_idle && ctx.fully_idle()) {
        ctx.leak.reset(s.reading_bar, s.now_ms);
        return;
    }
    if let LeakObservation::Leak {
        baseline_bar,
        current_bar,
    } = ctx.leak.observe(s.reading_bar, s.now_ms)
    {
        if !ctx.leak_detected {
            warn!(
                "LEAK: pressure fell {:.2} -> {:.2} bar while idle",
                baseline_bar, current_bar
            );
            ctx.leak_detected = true;
            ctx.emit(ControlEvent::LeakDetected {
                baseline_bar,
                current_bar,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SystemConfig;

    fn ctx() -> FsmContext {
        let mut c = FsmContext::new(SystemConfig::default());
        c.reference_bar = 10.0;
        c
    }

    fn sample(reading_bar: f32, now_ms: u64) -> Sample {
        Sample {
            reading_bar,
            pct: reading_bar * 10.0,
            now_ms,
        }
    }

    #[test]
    fn usage_overrides_open_valve() {
        let mut c = ctx();
        c.intent.valve_open = true;
        apply_rules(&mut c, sample(3.0, 1_000));
        assert_eq!(c.intent, ActuatorIntent::pressurise());
        assert!(c.using_water);
        assert_eq!(c.last_usage_at_ms, Some(1_000));
    }

    #[test]
    fn stop_needs_prior_usage() {
        let mut c = ctx();
        usage_stop_rule(&mut c, sample(9.9, 0));
        assert!(!c.using_water);
        assert!(c.take_events().is_empty());
    }

    #[test]
    fn stop_turns_pump_off() {
        let mut c = ctx();
        apply_rules(&mut c, sample(3.0, 0));
        apply_rules(&mut c, sample(9.8, 100));
        assert!(!c.using_water);
        assert!(!c.intent.pump_on);
    }

    #[test]
    fn recovering_draw_reasserts_pump() {
        let mut c = ctx();
        apply_rules(&mut c, sample(3.0, 0));
        c.intent = ActuatorIntent::all_off();
        apply_rules(&mut c, sample(7.0, 100));
        assert!(c.intent.pump_on);
        assert!(c.using_water);
    }

    #[test]
    fn regulation_waits_for_quiet_period() {
        let mut c = ctx();
        apply_rules(&mut c, sample(3.0, 0));
        apply_rules(&mut c, sample(9.9, 1_000));
        // Usage just ended: relief valve must stay shut until the delay passes.
        assert!(!c.intent.valve_open);
        apply_rules(&mut c, sample(9.9, 4_999));
        assert!(!c.intent.valve_open);
        apply_rules(&mut c, sample(9.9, 5_000));
        assert!(c.intent.valve_open);
    }

    #[test]
    fn valve_hysteresis() {
        let mut c = ctx();
        apply_rules(&mut c, sample(7.0, 0));
        assert!(c.intent.valve_open);
        apply_rules(&mut c, sample(6.1, 100));
        assert!(c.intent.valve_open);
        apply_rules(&mut c, sample(5.0, 200));
        assert!(!c.intent.valve_open);
    }

    #[test]
    fn leak_alert_fires_once() {
        let mut c = ctx();
        apply_rules(&mut c, sample(5.0, 0));
        apply_rules(&mut c, sample(4.8, 60_000));
        assert!(c.leak_detected);
        apply_rules(&mut c, sample(4.6, 120_000));
        assert!(c.leak_detected);
        let leaks = c
            .take_events()
            .iter()
            .filter(|e| matches!(e, ControlEvent::LeakDetected { .. }))
            .count();
        assert_eq!(leaks, 1);
    }

    #[test]
    fn activity_restarts_leak_window() {
        let mut c = ctx();
        apply_rules(&mut c, sample(5.0, 0));
        apply_rules(&mut c, sample(7.0, 30_000)); // valve opens
        apply_rules(&mut c, sample(5.0, 40_000)); // valve closes, window restarts
        apply_rules(&mut c, sample(4.95, 60_000));
        assert!(!c.leak_detected);
        let w = c.leak.window().unwrap();
        assert_eq!(w.started_at_ms, 40_000);
    }

    #[test]
    fn usage_clears_leak_flag() {
        let mut c = ctx();
        c.leak_detected = true;
        usage_rule(&mut c, sample(1.0, 0));
        assert!(!c.leak_detected);
    }
}
