//! WiFi station-mode adapter.
//!
//! Implements [`ConnectivityPort`], the boundary the backend adapter
//! checks before every HTTP call.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` STA driver.
//! - **all other targets**: simulation with injectable failures.
//!
//! ## Reconnection policy
//!
//! On a failed connect or a lost link the adapter waits an exponential
//! backoff (2 s → 4 s → 8 s … capped at 60 s) before the next attempt.
//! `poll()` is cheap when no attempt is due.

use core::fmt;
use log::{error, info, warn};

use super::utils::is_printable_ascii;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Port trait
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

pub trait ConnectivityPort {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    /// Detect link loss and run a reconnect attempt when one is due.
    fn poll(&mut self, now_ms: u64);
    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_MS: u64 = 2_000;
const MAX_BACKOFF_MS: u64 = 60_000;

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_ms: u64,
    next_attempt_ms: u64,
    last_rssi: Option<i8>,
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    driver: BlockingWifi<EspWifi<'static>>,
    /// Simulation: number of upcoming connect attempts that fail.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim_fail_next: u32,
    /// Simulation: link state as seen by the "driver".
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim_link_up: bool,
}

impl WifiAdapter {
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    pub fn new(driver: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt_ms: 0,
            last_rssi: None,
            driver,
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_ms: INITIAL_BACKOFF_MS,
            next_attempt_ms: 0,
            last_rssi: None,
            sim_fail_next: 0,
            sim_link_up: false,
        }
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// Current reconnect delay.
    pub fn backoff_ms(&self) -> u64 {
        self.backoff_ms
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_ms = INITIAL_BACKOFF_MS;
        self.last_rssi = self.platform_rssi();
    }

    fn schedule_retry(&mut self, now_ms: u64, attempt: u32) {
        self.next_attempt_ms = now_ms.saturating_add(self.backoff_ms);
        self.backoff_ms = (self.backoff_ms * 2).min(MAX_BACKOFF_MS);
        self.state = WifiState::Reconnecting { attempt };
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });

        let result = self
            .driver
            .set_configuration(&config)
            .and_then(|()| {
                if self.driver.is_started()? {
                    Ok(())
                } else {
                    self.driver.start()
                }
            })
            .and_then(|()| self.driver.connect())
            .and_then(|()| self.driver.wait_netif_up());
        result.map_err(|e| {
            warn!("WiFi(espidf): {}", e);
            ConnectivityError::ConnectionFailed
        })
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_fail_next > 0 {
            self.sim_fail_next -= 1;
            warn!("WiFi(sim): simulated connect failure");
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_link_up = true;
        info!("WiFi(sim): connected to '{}'", self.ssid);
        Ok(())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_disconnect(&mut self) {
        if let Err(e) = self.driver.disconnect() {
            warn!("WiFi(espidf): disconnect failed: {}", e);
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_disconnect(&mut self) {
        self.sim_link_up = false;
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.driver.is_connected().unwrap_or(false)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        // SAFETY: ap_info is a plain C struct filled in by the driver.
        unsafe {
            let mut ap_info: esp_idf_svc::sys::wifi_ap_record_t = core::mem::zeroed();
            if esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) == esp_idf_svc::sys::ESP_OK
            {
                Some(ap_info.rssi)
            } else {
                None
            }
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_rssi(&self) -> Option<i8> {
        self.sim_link_up.then_some(-60)
    }

    /// Simulation: make the next `n` connect attempts fail.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn sim_fail_next_connects(&mut self, n: u32) {
        self.sim_fail_next = n;
    }

    /// Simulation: drop the link as if the AP went away.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// ConnectivityPort
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                info!("WiFi: connected (RSSI={:?})", self.last_rssi);
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(now_ms, 0);
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.state = WifiState::Disconnected;
        self.last_rssi = None;
        info!("WiFi: disconnected");
    }

    fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.platform_is_connected()
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Reconnecting { attempt } => {
                if now_ms < self.next_attempt_ms {
                    return;
                }
                info!(
                    "WiFi: reconnect attempt {} (backoff {} ms)",
                    attempt + 1,
                    self.backoff_ms
                );
                match self.platform_connect() {
                    Ok(()) => {
                        self.on_connected();
                        info!("WiFi: reconnected (RSSI={:?})", self.last_rssi);
                    }
                    Err(_) => self.schedule_retry(now_ms, attempt + 1),
                }
            }
            WifiState::Connected => {
                if self.platform_is_connected() {
                    self.last_rssi = self.platform_rssi();
                } else {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.last_rssi = None;
                    self.backoff_ms = INITIAL_BACKOFF_MS;
                    self.next_attempt_ms = now_ms;
                    self.state = WifiState::Reconnecting { attempt: 0 };
                }
            }
            WifiState::Disconnected => {}
        }
    }

    fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid
            .push_str(ssid)
            .map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    fn rssi(&self) -> Option<i8> {
        self.last_rssi
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(all(test, not(all(target_os = "espidf", feature = "espidf"))))]
mod tests {
    use super::*;

    fn adapter() -> WifiAdapter {
        let mut a = WifiAdapter::new();
        a.set_credentials("HomeWiFi", "mysecret8").unwrap();
        a
    }

    #[test]
    fn rejects_bad_credentials() {
        let mut a = WifiAdapter::new();
        assert_eq!(
            a.set_credentials("", "password123"),
            Err(ConnectivityError::InvalidSsid)
        );
        assert_eq!(
            a.set_credentials("MyNet", "short"),
            Err(ConnectivityError::InvalidPassword)
        );
        assert!(a.set_credentials("OpenCafe", "").is_ok());
    }

    #[test]
    fn connect_without_credentials_fails() {
        let mut a = WifiAdapter::new();
        assert_eq!(a.connect(0), Err(ConnectivityError::NoCredentials));
    }

    #[test]
    fn connect_disconnect_roundtrip() {
        let mut a = adapter();
        a.connect(0).unwrap();
        assert!(a.is_connected());
        assert!(a.rssi().is_some());
        assert_eq!(a.connect(10), Err(ConnectivityError::AlreadyConnected));
        a.disconnect();
        assert!(!a.is_connected());
        assert!(a.rssi().is_none());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut a = adapter();
        a.sim_fail_next_connects(10);
        assert!(a.connect(0).is_err());
        assert_eq!(a.backoff_ms(), 4_000);

        // Not due yet: no attempt is made.
        a.poll(1_999);
        assert_eq!(a.state(), WifiState::Reconnecting { attempt: 0 });

        let mut now = 2_000;
        for _ in 0..8 {
            let delay = a.backoff_ms();
            a.poll(now);
            now += delay;
        }
        assert_eq!(a.backoff_ms(), MAX_BACKOFF_MS);
        assert!(matches!(a.state(), WifiState::Reconnecting { .. }));

        a.sim_fail_next_connects(0);
        a.poll(now);
        assert!(a.is_connected());
        assert_eq!(a.backoff_ms(), INITIAL_BACKOFF_MS);
    }

    #[test]
    fn lost_link_reconnects_on_next_poll() {
        let mut a = adapter();
        a.connect(0).unwrap();
        a.sim_drop_link();
        assert!(!a.is_connected());
        a.poll(100);
        assert_eq!(a.state(), WifiState::Reconnecting { attempt: 0 });
        a.poll(100);
        assert!(a.is_connected());
    }
}
