use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::commands::SettingsUpdate;
use crate::app::ports::{NetworkError, SettingsPort, TelemetryPort};
use crate::fsm::context::StatusSnapshot;

/// Work for the network worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetRequest {
    PushTelemetry(StatusSnapshot),
    FetchSettings,
}

/// Result delivered back to the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetOutcome {
    Settings(SettingsUpdate),
    Failed(NetworkError),
}

/// Channel depth for outbound requests.  One telemetry and one settings
/// request per period leaves room for a slow backend.
const REQUEST_DEPTH: usize = 4;

/// Channel depth for outcomes; the control loop drains every pass.
const OUTCOME_DEPTH: usize = 4;

/// Request queue plus outcome queue shared by the control loop and the
/// worker.
pub struct NetBridge {
    requests: Channel<CriticalSectionRawMutex, NetRequest, REQUEST_DEPTH>,
    outcomes: Channel<CriticalSectionRawMutex, NetOutcome, OUTCOME_DEPTH>,
}

/// The firmware's single bridge instance.
pub static NET_BRIDGE: NetBridge = NetBridge::new();

impl Default for NetBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl NetBridge {
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            outcomes: Channel::new(),
        }
    }

    // ── Control-loop side (never blocks) ──────────────────────

    /// Queue a telemetry push.  Returns `false` if the worker is backed up
    /// and the snapshot was dropped.
    pub fn request_telemetry(&self, status: StatusSnapshot) -> bool {
        self.enqueue(NetRequest::PushTelemetry(status))
    }

    /// Queue a settings fetch.
    pub fn request_settings(&self) -> bool {
        self.enqueue(NetRequest::FetchSettings)
    }

    /// Next outcome from the worker, if any.
    pub fn poll_outcome(&self) -> Option<NetOutcome> {
        self.outcomes.try_receive().ok()
    }

    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    fn enqueue(&self, request: NetRequest) -> bool {
        if self.requests.try_send(request).is_err() {
            warn!("net: request queue full, dropping {:?}", request);
            return false;
        }
        true
    }

    // ── Worker side ───────────────────────────────────────────

    /// Wait for one request and execute it against `backend`.
    pub async fn serve_one(&self, backend: &mut (impl SettingsPort + TelemetryPort)) {
        let request = self.requests.receive().await;
        debug!("net: serving {:?}", request);

        let outcome = match request {
            NetRequest::PushTelemetry(status) => match backend.push_telemetry(&status) {
                Ok(()) => None,
                Err(e) => Some(NetOutcome::Failed(e)),
            },
            NetRequest::FetchSettings => Some(match backend.fetch_settings() {
                Ok(update) => NetOutcome::Settings(update),
                Err(e) => NetOutcome::Failed(e),
            }),
        };

        if let Some(outcome) = outcome {
            if self.outcomes.try_send(outcome).is_err() {
                warn!("net: outcome queue full, dropping {:?}", outcome);
            }
        }
    }

    /// Worker thread body.  Never returns.
    pub fn serve_forever(&self, mut backend: impl SettingsPort + TelemetryPort) {
        futures_lite::future::block_on(async {
            loop {
                self.serve_one(&mut backend).await;
            }
        });
    }
}
