//! Auto-calibration of the 100 % pressure reference.
//!
//! With the valve closed the pump is run flat out while the peak pressure
//! is tracked.  The run ends when the peak has not risen for the plateau
//! period, or unconditionally at the hard timeout so a stuck sensor can
//! never keep the pump running.  The reference is the peak plus a small
//! headroom margin.
//!
//! ```text
//!  bar
//!   │            ┌───────────────────  peak
//!   │         ╱──┘
//!   │      ╱─╯        ◀── plateau ──▶
//!   │   ╱─╯
//!   │╱─╯
//!   └──┬─────────────┬───────────────┬──▶ t
//!    start      last rise        complete
//! ```

use crate::config::SystemConfig;

/// Progress of one calibration run.  Lives inside the controller state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRun {
    pub peak_so_far_bar: f32,
    pub started_at_ms: u64,
    pub last_peak_at_ms: u64,
}

/// Plateau/timeout calibration policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationEngine {
    plateau_ms: u64,
    timeout_ms: u64,
    headroom: f32,
}

impl CalibrationEngine {
    pub fn new(plateau_ms: u32, timeout_ms: u32, headroom: f32) -> Self {
        Self {
            plateau_ms: u64::from(plateau_ms),
            timeout_ms: u64::from(timeout_ms),
            headroom,
        }
    }

    pub fn from_config(config: &SystemConfig) -> Self {
        Self::new(
            config.calibration_plateau_ms,
            config.calibration_timeout_ms,
            config.calibration_headroom,
        )
    }

    /// Open a fresh run at `now_ms`.
    pub fn start(&self, now_ms: u64) -> CalibrationRun {
        CalibrationRun {
            peak_so_far_bar: 0.0,
            started_at_ms: now_ms,
            last_peak_at_ms: now_ms,
        }
    }

    /// Feed one sample.  Returns the new reference once the run completes.
    pub fn step(&self, run: &mut CalibrationRun, reading_bar: f32, now_ms: u64) -> Option<f32> {
        if reading_bar > run.peak_so_far_bar {
            run.peak_so_far_bar = reading_bar;
            run.last_peak_at_ms = now_ms;
        }

        let plateaued = now_ms.saturating_sub(run.last_peak_at_ms) > self.plateau_ms;
        let timed_out = now_ms > self.deadline_ms(run);

        if plateaued || timed_out {
            Some(run.peak_so_far_bar * self.headroom)
        } else {
            None
        }
    }

    /// Time at which `run` is forced to complete regardless of readings.
    pub fn deadline_ms(&self, run: &CalibrationRun) -> u64 {
        run.started_at_ms.saturating_add(self.timeout_ms)
    }
}
