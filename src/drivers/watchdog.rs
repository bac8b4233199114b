//! Task Watchdog Timer (TWDT) guard for the control loop.
//!
//! If the main loop stops feeding for longer than the timeout the chip
//! panics and reboots; the relays come back up de-energised.

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

use log::{info, warn};

/// Five sample periods would be a missed tick; this is well beyond that
/// but short enough that a hung HTTP call on the main task gets caught.
pub const DEFAULT_TIMEOUT_MS: u32 = 8_000;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    subscribed: bool,
    feeds: u32,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

impl Watchdog {
    /// Reconfigure the TWDT and subscribe the calling task.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            // SAFETY: TWDT calls are made once from the main task at boot.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({} ms timeout)", timeout_ms);
                } else {
                    warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    timeout_ms,
                    subscribed,
                    feeds: 0,
                }
            }
        }

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            if timeout_ms == 0 {
                warn!("Watchdog(sim): zero timeout");
            }
            info!("Watchdog(sim): {} ms, no-op", timeout_ms);
            Self {
                timeout_ms,
                feeds: 0,
            }
        }
    }

    /// Feed the watchdog.  Call once per main-loop pass.
    pub fn feed(&mut self) {
        self.feeds = self.feeds.wrapping_add(1);

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        if self.subscribed {
            // SAFETY: the calling task was subscribed in new().
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Number of feeds since boot (wrapping).
    pub fn feeds(&self) -> u32 {
        self.feeds
    }
}

#[cfg(all(test, not(all(target_os = "espidf", feature = "espidf"))))]
mod tests {
    use super::*;

    #[test]
    fn sim_watchdog_counts_feeds() {
        let mut wd = Watchdog::default();
        assert_eq!(wd.timeout_ms(), DEFAULT_TIMEOUT_MS);
        wd.feed();
        wd.feed();
        assert_eq!(wd.feeds(), 2);
    }
}
