//! HTTP backend adapter.
//!
//! Implements [`SettingsPort`] and [`TelemetryPort`] against the
//! query-string endpoint described in [`crate::wire`].  Every call first
//! checks the WiFi link; with no link the call fails fast with
//! [`NetworkError::NotConnected`] and the next periodic tick retries.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` GET with a 5 s timeout
//!   and the ESP-IDF certificate bundle for HTTPS.
//! - **other targets**: scripted responses and a request log for tests.

use log::{debug, info, warn};

use crate::app::commands::SettingsUpdate;
use crate::app::ports::{NetworkError, SettingsPort, TelemetryPort};
use crate::fsm::context::StatusSnapshot;
use crate::wire;

use super::time::uptime_ms;
use super::utils::is_backend_url;
use super::wifi::ConnectivityPort;

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
use std::collections::VecDeque;

/// Largest response body we keep.  Settings replies are tiny.
const MAX_BODY: usize = 1024;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
const HTTP_TIMEOUT: core::time::Duration = core::time::Duration::from_secs(5);

pub struct HttpBackend<C: ConnectivityPort> {
    base_url: &'static str,
    link: C,
    requests: u32,
    failures: u32,
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim_responses: VecDeque<Result<Vec<u8>, NetworkError>>,
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim_log: Vec<String>,
}

impl<C: ConnectivityPort> HttpBackend<C> {
    /// `base_url` is the endpoint without a query string.
    pub fn new(base_url: &'static str, link: C) -> Result<Self, NetworkError> {
        if !is_backend_url(base_url) {
            warn!("backend: rejecting URL '{}'", base_url);
            return Err(NetworkError::RequestFailed);
        }
        info!("backend: {}", base_url);
        Ok(Self {
            base_url,
            link,
            requests: 0,
            failures: 0,
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            sim_responses: VecDeque::new(),
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            sim_log: Vec::new(),
        })
    }

    pub fn link(&self) -> &C {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut C {
        &mut self.link
    }

    /// (requests attempted, requests failed) since boot.
    pub fn counters(&self) -> (u32, u32) {
        (self.requests, self.failures)
    }

    fn get(&mut self, query: &str) -> Result<Vec<u8>, NetworkError> {
        self.link.poll(uptime_ms());
        if !self.link.is_connected() {
            return Err(NetworkError::NotConnected);
        }

        let mut url = String::with_capacity(self.base_url.len() + query.len());
        url.push_str(self.base_url);
        url.push_str(query);

        self.requests = self.requests.wrapping_add(1);
        debug!("backend: GET {}", url);
        let result = self.platform_get(&url);
        if result.is_err() {
            self.failures = self.failures.wrapping_add(1);
        }
        result
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_get(&mut self, url: &str) -> Result<Vec<u8>, NetworkError> {
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
        use esp_idf_svc::io::Read;

        let mut conn = EspHttpConnection::new(&Configuration {
            timeout: Some(HTTP_TIMEOUT),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|_| NetworkError::RequestFailed)?;

        conn.initiate_request(Method::Get, url, &[])
            .map_err(|_| NetworkError::RequestFailed)?;
        conn.initiate_response()
            .map_err(|_| NetworkError::Timeout)?;

        let status = conn.status();
        if !(200..300).contains(&status) {
            return Err(NetworkError::HttpStatus(status));
        }

        let mut body = Vec::new();
        let mut chunk = [0u8; 256];
        loop {
            let n = conn.read(&mut chunk).map_err(|_| NetworkError::Timeout)?;
            if n == 0 {
                break;
            }
            if body.len() + n > MAX_BODY {
                return Err(NetworkError::MalformedResponse);
            }
            body.extend_from_slice(&chunk[..n]);
        }
        Ok(body)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_get(&mut self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.sim_log.push(url.to_owned());
        let body = self.sim_responses.pop_front().unwrap_or(Ok(Vec::new()))?;
        if body.len() > MAX_BODY {
            return Err(NetworkError::MalformedResponse);
        }
        Ok(body)
    }

    /// Simulation: queue the result of the next request.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn sim_respond(&mut self, response: Result<&[u8], NetworkError>) {
        self.sim_responses.push_back(response.map(<[u8]>::to_vec));
    }

    /// Simulation: every URL requested so far.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn sim_requests(&self) -> &[String] {
        &self.sim_log
    }
}

impl<C: ConnectivityPort> SettingsPort for HttpBackend<C> {
    fn fetch_settings(&mut self) -> Result<SettingsUpdate, NetworkError> {
        let body = self.get(wire::SETTINGS_QUERY)?;
        wire::decode_settings(&body)
    }
}

impl<C: ConnectivityPort> TelemetryPort for HttpBackend<C> {
    fn push_telemetry(&mut self, status: &StatusSnapshot) -> Result<(), NetworkError> {
        let query = wire::telemetry_query(status);
        self.get(&query).map(|_| ())
    }
}
