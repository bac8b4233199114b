//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).  Alerts go out at `warn!` or
//! `error!` so they survive a raised log level.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::fsm::context::ControlEvent;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events logged since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    fn log_control(event: &ControlEvent) {
        match event {
            ControlEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            ControlEvent::UsageStarted { pct } => {
                info!("USAGE | started at {:.0}%, pump ON", pct);
            }
            ControlEvent::UsageStopped { pct } => {
                info!("USAGE | stopped at {:.0}%, pump OFF", pct);
            }
            ControlEvent::LeakDetected {
                baseline_bar,
                current_bar,
            } => {
                warn!(
                    "LEAK  | !!! pressure fell {:.2} -> {:.2} bar while idle !!!",
                    baseline_bar, current_bar
                );
            }
            ControlEvent::CalibrationStarted => {
                info!("CALIB | started: valve closed, pump ON");
            }
            ControlEvent::CalibrationComplete {
                peak_bar,
                reference_bar,
            } => {
                info!(
                    "CALIB | complete: peak {:.2} bar, reference {:.2} bar",
                    peak_bar, reference_bar
                );
            }
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started {
                state,
                reference_bar,
            } => {
                info!(
                    "START | initial_state={:?} reference={:.2} bar",
                    state, reference_bar
                );
            }
            AppEvent::Control(control) => Self::log_control(control),
            AppEvent::CalibrationRequested(source) => {
                info!("CALIB | requested via {:?}", source);
            }
            AppEvent::SensorFault(fault) => {
                error!("FAULT | sensor {}: pump and valve forced OFF", fault);
            }
            AppEvent::SensorRecovered => {
                info!("FAULT | sensor reading valid again");
            }
            AppEvent::ReferencePersisted(bar) => {
                info!("NVS   | reference {:.2} bar stored", bar);
            }
            AppEvent::PersistenceFailed(e) => {
                error!("NVS   | reference NOT stored: {}", e);
            }
            AppEvent::SettingsApplied(pair) => {
                info!(
                    "CONF  | thresholds {}% / {}%",
                    pair.lower_pct(),
                    pair.upper_pct()
                );
            }
            AppEvent::SettingsRejected(reason) => {
                warn!("CONF  | settings rejected: {}", reason);
            }
            AppEvent::NetworkFailed(e) => {
                warn!("NET   | {}", e);
            }
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={:?} | p={} | pct={} | pump={} valve={} leak={}",
                    t.state,
                    t.pressure_bar
                        .map_or_else(|| "FAULT".to_owned(), |p| format!("{:.2}", p)),
                    t.percent
                        .map_or_else(|| "-".to_owned(), |p| format!("{:.0}", p)),
                    u8::from(t.pump_on),
                    u8::from(t.valve_open),
                    u8::from(t.leak_detected),
                );
            }
        }
    }
}
