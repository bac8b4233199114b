//! Named interval timers.
//!
//! The main loop owns one [`Scheduler`] and calls [`Scheduler::tick`] once
//! per pass.  Each schedule declares its own interval and the job it
//! triggers; when a schedule is due the [`SchedulerDelegate`] is notified.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        Scheduler                          │
//! │                                                           │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌──────────┐  │
//! │  │ sample   │  │ display  │  │ telemetry │  │ settings │  │
//! │  │ 100 ms   │  │ 500 ms   │  │ 3000 ms   │  │ 5000 ms  │  │
//! │  └────┬─────┘  └────┬─────┘  └─────┬─────┘  └────┬─────┘  │
//! │       ▼             ▼              ▼             ▼        │
//! │  ┌─────────────────────────────────────────────────────┐  │
//! │  │                 SchedulerDelegate                   │  │
//! │  │          (main loop queues the matching job)        │  │
//! │  └─────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────┘
//! ```

use crate::app::ports::{ScheduledTask, SchedulerDelegate};
use crate::config::SystemConfig;
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// A single schedule entry.
#[derive(Debug, Clone)]
pub struct Schedule {
    /// Human-readable label (e.g., "telemetry").
    pub label: &'static str,
    /// The job triggered when the schedule fires.
    pub task: ScheduledTask,
    /// Minimum time between two fires.
    pub interval_ms: u32,
    /// Whether this schedule is currently enabled.
    pub enabled: bool,
}

impl Schedule {
    pub const fn every(label: &'static str, task: ScheduledTask, interval_ms: u32) -> Self {
        Self {
            label,
            task,
            interval_ms,
            enabled: true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of concurrent schedules (stack-allocated).
const MAX_SCHEDULES: usize = 4;

/// The scheduler engine.
///
/// Decoupled from the service and the job queue: when a schedule fires it
/// invokes the [`SchedulerDelegate`] callback, which makes the intervals
/// independently testable.
pub struct Scheduler {
    schedules: [Option<ScheduleEntry>; MAX_SCHEDULES],
}

/// Internal bookkeeping for a live schedule.
#[derive(Debug, Clone)]
struct ScheduleEntry {
    schedule: Schedule,
    /// Time of the last fire (or of registration).
    last_fired_ms: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            schedules: [None, None, None, None],
        }
    }

    /// The four standard schedules, anchored at `now_ms`.
    pub fn from_config(config: &SystemConfig, now_ms: u64) -> Self {
        let mut sched = Self::new();
        for schedule in [
            Schedule::every("sample", ScheduledTask::Sample, config.sample_interval_ms),
            Schedule::every("display", ScheduledTask::Display, config.display_interval_ms),
            Schedule::every(
                "telemetry",
                ScheduledTask::Telemetry,
                config.telemetry_interval_ms,
            ),
            Schedule::every(
                "settings",
                ScheduledTask::Settings,
                config.settings_interval_ms,
            ),
        ] {
            sched.add(schedule, now_ms);
        }
        sched
    }

    /// Add a schedule.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, schedule: Schedule, now_ms: u64) -> Option<usize> {
        for (i, slot) in self.schedules.iter_mut().enumerate() {
            if slot.is_none() {
                info!(
                    "Scheduler: added '{}' every {} ms at slot {}",
                    schedule.label, schedule.interval_ms, i
                );
                *slot = Some(ScheduleEntry {
                    schedule,
                    last_fired_ms: now_ms,
                });
                return Some(i);
            }
        }
        None // All slots full.
    }

    /// Enable or disable one schedule by task.  Offline builds switch the
    /// network schedules off.
    pub fn set_task_enabled(&mut self, task: ScheduledTask, enabled: bool) {
        for entry in self.schedules.iter_mut().flatten() {
            if entry.schedule.task == task {
                info!(
                    "Scheduler: '{}' {}",
                    entry.schedule.label,
                    if enabled { "enabled" } else { "disabled" }
                );
                entry.schedule.enabled = enabled;
            }
        }
    }

    /// Fire every schedule whose interval has elapsed.  Call once per loop
    /// pass.
    ///
    /// A schedule fires at most once per call and re-anchors at `now_ms`, so
    /// a stalled loop never produces a burst of catch-up fires.
    pub fn tick(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) {
        for entry in self.schedules.iter_mut().flatten() {
            if !entry.schedule.enabled {
                continue;
            }
            let elapsed = now_ms.saturating_sub(entry.last_fired_ms);
            if elapsed >= u64::from(entry.schedule.interval_ms) {
                debug!(
                    "Scheduler: '{}' fired after {} ms",
                    entry.schedule.label, elapsed
                );
                delegate.on_schedule_fired(entry.schedule.label, entry.schedule.task);
                entry.last_fired_ms = now_ms;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
