//! System configuration parameters
//!
//! All tunable parameters for the PressureGuard regulator.  The runtime
//! copy is persisted as a postcard blob in NVS and the threshold pair can be
//! overwritten by the settings backend.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::fsm::context::ThresholdPair;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Regulation band ---
    /// Lower/upper regulation band, percent of the calibrated reference.
    pub thresholds: ThresholdPair,
    /// Percentage at which a draw is considered finished.
    pub usage_stop_pct: f32,
    /// Quiet time after the last draw before idle regulation may act (ms).
    pub no_usage_delay_ms: u32,

    // --- Leak detection ---
    /// Length of one idle leak-check window (ms).
    pub leak_window_ms: u32,
    /// Pressure loss across one window that counts as a leak (bar).
    pub leak_drop_threshold_bar: f32,

    // --- Calibration ---
    /// Calibration ends once the peak has not risen for this long (ms).
    pub calibration_plateau_ms: u32,
    /// Hard upper bound on pump run time during calibration (ms).
    pub calibration_timeout_ms: u32,
    /// Multiplier applied to the observed peak to form the reference.
    pub calibration_headroom: f32,
    /// Whether starting a calibration clears a raised leak flag.
    pub clear_leak_on_calibration: bool,

    // --- Timing ---
    /// Pressure sampling interval (milliseconds)
    pub sample_interval_ms: u32,
    /// Status line refresh interval (milliseconds)
    pub display_interval_ms: u32,
    /// Telemetry push interval (milliseconds)
    pub telemetry_interval_ms: u32,
    /// Settings pull interval (milliseconds)
    pub settings_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Regulation band
            thresholds: ThresholdPair::DEFAULT, // 40 / 60 %
            usage_stop_pct: 98.0,
            no_usage_delay_ms: 5_000,

            // Leak detection
            leak_window_ms: 60_000,
            leak_drop_threshold_bar: 0.1,

            // Calibration
            calibration_plateau_ms: 5_000,
            calibration_timeout_ms: 30_000,
            calibration_headroom: 1.02,
            clear_leak_on_calibration: false,

            // Timing
            sample_interval_ms: 100,     // 10 Hz
            display_interval_ms: 500,    // 2 Hz
            telemetry_interval_ms: 3_000,
            settings_interval_ms: 5_000,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Re-run the pair constructor: deserialised blobs bypass it.
        ThresholdPair::new(self.thresholds.lower_pct(), self.thresholds.upper_pct())?;

        if !(50.0..=100.0).contains(&self.usage_stop_pct) {
            return Err(ConfigError::ValidationFailed(
                "usage_stop_pct must be 50.0–100.0",
            ));
        }
        if self.usage_stop_pct <= f32::from(self.thresholds.lower_pct()) {
            return Err(ConfigError::ValidationFailed(
                "usage_stop_pct must be above the lower threshold",
            ));
        }
        if self.no_usage_delay_ms > 3_600_000 {
            return Err(ConfigError::ValidationFailed(
                "no_usage_delay_ms must be at most one hour",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.leak_window_ms) {
            return Err(ConfigError::ValidationFailed(
                "leak_window_ms must be 1 s – 1 h",
            ));
        }
        if !(self.leak_drop_threshold_bar > 0.0 && self.leak_drop_threshold_bar <= 5.0) {
            return Err(ConfigError::ValidationFailed(
                "leak_drop_threshold_bar must be 0.0–5.0 (exclusive of 0)",
            ));
        }
        if self.calibration_plateau_ms == 0
            || self.calibration_plateau_ms >= self.calibration_timeout_ms
        {
            return Err(ConfigError::ValidationFailed(
                "calibration_plateau_ms must be non-zero and below the timeout",
            ));
        }
        if self.calibration_timeout_ms > 120_000 {
            return Err(ConfigError::ValidationFailed(
                "calibration_timeout_ms must be at most 120 s",
            ));
        }
        if !(1.0..=1.2).contains(&self.calibration_headroom) {
            return Err(ConfigError::ValidationFailed(
                "calibration_headroom must be 1.0–1.2",
            ));
        }
        if !(10..=1_000).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 10–1000",
            ));
        }
        if self.display_interval_ms < self.sample_interval_ms
            || self.telemetry_interval_ms < self.sample_interval_ms
            || self.settings_interval_ms < self.sample_interval_ms
        {
            return Err(ConfigError::ValidationFailed(
                "periodic intervals must not be faster than sampling",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build-time network settings
// ---------------------------------------------------------------------------

/// Credentials and endpoints baked in at build time.
///
/// Set `PRESSUREGUARD_WIFI_SSID`, `PRESSUREGUARD_WIFI_PASS` and
/// `PRESSUREGUARD_BACKEND_URL` in the build environment; unset values are
/// empty and disable the corresponding feature at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub backend_url: &'static str,
}

impl NetworkConfig {
    pub const fn from_build_env() -> Self {
        Self {
            wifi_ssid: match option_env!("PRESSUREGUARD_WIFI_SSID") {
                Some(v) => v,
                None => "",
            },
            wifi_password: match option_env!("PRESSUREGUARD_WIFI_PASS") {
                Some(v) => v,
                None => "",
            },
            backend_url: match option_env!("PRESSUREGUARD_BACKEND_URL") {
                Some(v) => v,
                None => "",
            },
        }
    }

    /// Whether a backend endpoint was configured.
    pub fn has_backend(&self) -> bool {
        !self.backend_url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.thresholds.lower_pct(), 40);
        assert_eq!(c.thresholds.upper_pct(), 60);
        assert!(c.calibration_plateau_ms < c.calibration_timeout_ms);
        assert!(!c.clear_leak_on_calibration);
    }

    #[test]
    fn timing_ratios_make_sense() {
        let c = SystemConfig::default();
        assert!(c.sample_interval_ms < c.display_interval_ms);
        assert!(c.display_interval_ms < c.telemetry_interval_ms);
        assert!(c.telemetry_interval_ms < c.settings_interval_ms);
        assert!(
            u64::from(c.sample_interval_ms) * 10 <= u64::from(c.calibration_plateau_ms),
            "plateau must span several samples"
        );
    }

    #[test]
    fn rejects_plateau_longer_than_timeout() {
        let c = SystemConfig {
            calibration_plateau_ms: 40_000,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_zero_leak_drop() {
        let c = SystemConfig {
            leak_drop_threshold_bar: 0.0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_stop_pct_inside_band() {
        let c = SystemConfig {
            thresholds: ThresholdPair::new(80, 95).unwrap(),
            usage_stop_pct: 75.0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn postcard_roundtrip() {
        let c = SystemConfig {
            thresholds: ThresholdPair::new(30, 70).unwrap(),
            clear_leak_on_calibration: true,
            ..Default::default()
        };
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: SystemConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn unset_build_env_disables_backend() {
        let n = NetworkConfig {
            wifi_ssid: "",
            wifi_password: "",
            backend_url: "",
        };
        assert!(!n.has_backend());
    }
}
