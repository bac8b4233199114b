//! Idle leak detection.
//!
//! While the system is fully idle (pump off, valve closed, no draw) the
//! pressure should hold.  The monitor records a baseline at the start of a
//! window and, once per window, compares the current reading against it.
//! Any non-idle tick restarts the window so that pressure changes caused by
//! the pump, the valve or a draw never accumulate into a false alarm.

use log::debug;

/// Baseline and start time of the current leak-check window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeakCheckWindow {
    pub baseline_bar: f32,
    pub started_at_ms: u64,
}

/// Outcome of one idle observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeakObservation {
    /// Window still running, or just (re)started.
    Pending,
    /// A window completed without a significant drop.
    Holding,
    /// A window completed with a drop beyond the threshold.
    Leak { baseline_bar: f32, current_bar: f32 },
}

/// Pure leak predicate.
///
/// True when a full window has elapsed, the baseline was positive and the
/// pressure fell by strictly more than `drop_threshold_bar`.
pub fn detect_leak(
    baseline_bar: f32,
    current_bar: f32,
    elapsed_ms: u64,
    window_ms: u64,
    drop_threshold_bar: f32,
) -> bool {
    elapsed_ms >= window_ms && baseline_bar > 0.0 && baseline_bar - current_bar > drop_threshold_bar
}

/// Windowed leak monitor.
#[derive(Debug, Clone)]
pub struct LeakMonitor {
    window_ms: u64,
    drop_threshold_bar: f32,
    window: Option<LeakCheckWindow>,
}

impl LeakMonitor {
    pub fn new(window_ms: u32, drop_threshold_bar: f32) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            drop_threshold_bar,
            window: None,
        }
    }

    /// Restart the window at the current reading (system not idle).
    pub fn reset(&mut self, reading_bar: f32, now_ms: u64) {
        self.window = Some(LeakCheckWindow {
            baseline_bar: reading_bar,
            started_at_ms: now_ms,
        });
    }

    /// Feed one fully idle sample.
    pub fn observe(&mut self, reading_bar: f32, now_ms: u64) -> LeakObservation {
        let Some(window) = self.window else {
            self.reset(reading_bar, now_ms);
            return LeakObservation::Pending;
        };

        let elapsed = now_ms.saturating_sub(window.started_at_ms);
        if elapsed < self.window_ms {
            return LeakObservation::Pending;
        }

        let leaking = detect_leak(
            window.baseline_bar,
            reading_bar,
            elapsed,
            self.window_ms,
            self.drop_threshold_bar,
        );
        debug!(
            "leak check: baseline={:.2} now={:.2} over {}ms",
            window.baseline_bar, reading_bar, elapsed
        );

        // Next window starts from this sample.
        self.reset(reading_bar, now_ms);

        if leaking {
            LeakObservation::Leak {
                baseline_bar: window.baseline_bar,
                current_bar: reading_bar,
            }
        } else {
            LeakObservation::Holding
        }
    }

    /// The currently open window, if any.
    pub fn window(&self) -> Option<LeakCheckWindow> {
        self.window
    }
}
