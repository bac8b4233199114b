//! Water-usage classification.
//!
//! A draw is recognised when pressure falls below the lower threshold and
//! is considered finished only once the pump has restored pressure to
//! near-full (`stop_pct`, 98 % by default).  Between those two points the
//! previous classification is held, which gives the detector its
//! hysteresis.

use crate::fsm::context::ThresholdPair;

/// Default percentage at which an in-progress draw is considered finished.
pub const USAGE_STOP_PCT: f32 = 98.0;

/// Edge-classified result of one usage evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageTransition {
    /// Pressure just fell below the lower threshold.
    Started,
    /// Still drawing (either below the band or not yet recovered).
    Continuing,
    /// Pressure recovered to the stop level after a draw.
    Stopped,
    /// No draw before or after.
    Idle,
}

impl UsageTransition {
    /// Whether water is being drawn after this evaluation.
    pub fn is_using(self) -> bool {
        matches!(self, Self::Started | Self::Continuing)
    }
}

/// Usage classifier parameterised by its stop level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageDetector {
    stop_pct: f32,
}

impl Default for UsageDetector {
    fn default() -> Self {
        Self::new(USAGE_STOP_PCT)
    }
}

impl UsageDetector {
    pub const fn new(stop_pct: f32) -> Self {
        Self { stop_pct }
    }

    pub fn stop_pct(&self) -> f32 {
        self.stop_pct
    }

    /// Classify one sample given the previous usage state.
    pub fn classify(&self, pct: f32, thresholds: ThresholdPair, was_using: bool) -> UsageTransition {
        if pct < f32::from(thresholds.lower_pct()) {
            if was_using {
                UsageTransition::Continuing
            } else {
                UsageTransition::Started
            }
        } else if was_using && pct >= self.stop_pct {
            UsageTransition::Stopped
        } else if was_using {
            UsageTransition::Continuing
        } else {
            UsageTransition::Idle
        }
    }
}

/// Whether water is being drawn after observing `pct`.
///
/// Uses the default 98 % stop level.
pub fn detect_usage(pct: f32, thresholds: ThresholdPair, was_using: bool) -> bool {
    UsageDetector::default()
        .classify(pct, thresholds, was_using)
        .is_using()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band() -> ThresholdPair {
        ThresholdPair::new(40, 60).unwrap()
    }

    #[test]
    fn below_lower_threshold_is_usage() {
        assert!(detect_usage(39.9, band(), false));
        assert!(detect_usage(0.0, band(), true));
    }

    #[test]
    fn at_lower_threshold_is_not_a_new_draw() {
        assert!(!detect_usage(40.0, band(), false));
    }

    #[test]
    fn draw_holds_until_stop_level() {
        assert!(detect_usage(65.0, band(), true));
        assert!(detect_usage(97.9, band(), true));
        assert!(!detect_usage(98.0, band(), true));
    }

    #[test]
    fn classify_reports_edges() {
        let d = UsageDetector::default();
        assert_eq!(d.classify(30.0, band(), false), UsageTransition::Started);
        assert_eq!(d.classify(30.0, band(), true), UsageTransition::Continuing);
        assert_eq!(d.classify(99.0, band(), true), UsageTransition::Stopped);
        assert_eq!(d.classify(99.0, band(), false), UsageTransition::Idle);
    }

    #[test]
    fn custom_stop_level() {
        let d = UsageDetector::new(90.0);
        assert_eq!(d.classify(91.0, band(), true), UsageTransition::Stopped);
        assert_eq!(d.classify(89.0, band(), true), UsageTransition::Continuing);
    }
}
