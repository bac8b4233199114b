//! PressureGuard Firmware: main entry point
//!
//! Hexagonal architecture with a scheduler-driven main loop and a
//! core-pinned network worker.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   LogEventSink   NvsAdapter   SerialDisplay   │
//! │  (Sensor+Actuator) (EventSink)    (Config+Ref) (DisplayPort)   │
//! │  HttpBackend<WifiAdapter>         SerialConsole  ButtonDriver  │
//! │  (Settings+Telemetry, net worker) (commands)     (commands)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Safety · Usage · Leak · Calibration             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven) · NetBridge (worker channels)     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use pressureguard::adapters::backend::HttpBackend;
use pressureguard::adapters::console::{ConsoleCommand, SerialConsole};
use pressureguard::adapters::display::SerialDisplay;
use pressureguard::adapters::hardware::HardwareAdapter;
use pressureguard::adapters::log_sink::LogEventSink;
use pressureguard::adapters::nvs::NvsAdapter;
use pressureguard::adapters::time::SystemClock;
use pressureguard::adapters::wifi::{ConnectivityPort, WifiAdapter};
use pressureguard::app::commands::{AppCommand, CalibrationSource};
use pressureguard::app::events::AppEvent;
use pressureguard::app::ports::{ConfigPort, EventSink, ScheduledTask, SchedulerDelegate};
use pressureguard::app::service::AppService;
use pressureguard::config::{NetworkConfig, SystemConfig};
use pressureguard::drivers::button::{ButtonDriver, ButtonEvent};
use pressureguard::drivers::task_pin::{Core, spawn_on_core};
use pressureguard::drivers::{hw_init, watchdog::Watchdog};
use pressureguard::net::{NET_BRIDGE, NetOutcome};
use pressureguard::pins;
use pressureguard::scheduler::Scheduler;

/// Network worker thread parameters.
const NET_TASK_PRIORITY: u8 = 5;
const NET_TASK_STACK_KB: usize = 12;

/// Idle time between main-loop passes.
const LOOP_SLEEP_MS: u64 = 10;

// ── Scheduler delegate ────────────────────────────────────────
//
// Bridges the scheduler (which knows nothing about the service) to a small
// job queue drained right after `tick`.  Jobs fired in the same pass run
// in schedule order.

#[derive(Default)]
struct JobQueueDelegate {
    jobs: heapless::Deque<ScheduledTask, 8>,
}

impl SchedulerDelegate for JobQueueDelegate {
    fn on_schedule_fired(&mut self, label: &str, task: ScheduledTask) {
        if self.jobs.push_back(task).is_err() {
            warn!("Job queue full, dropping '{}'", label);
        }
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PressureGuard v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Initialise hardware peripherals ───────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Relays may be floating: halt and let the watchdog reset us.
        error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {}, button disabled", e);
    }
    let mut watchdog = Watchdog::default();
    let clock = SystemClock;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            // Without NVS the reference cannot survive a restart; keep
            // regulating with whatever this session calibrates.
            warn!("NVS init failed ({}), running without persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };

    // ── 3. Construct adapters ─────────────────────────────────
    let mut hw = HardwareAdapter::from_board();
    let mut log_sink = LogEventSink::new();
    let mut display = SerialDisplay::new();
    let mut console = SerialConsole::new();
    let mut button = ButtonDriver::new(pins::BUTTON_GPIO);

    // ── 4. Construct app service ──────────────────────────────
    let mut app = AppService::new(config.clone());
    app.start(&nvs, clock.now_ms(), &mut log_sink);

    // ── 5. Network: WiFi + backend on the worker core ─────────
    let net = NetworkConfig::from_build_env();
    let mut network_enabled = false;
    if net.has_backend() {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let driver = BlockingWifi::wrap(EspWifi::new(peripherals.modem, sysloop.clone(), None)?, sysloop)?;

        let mut wifi = WifiAdapter::new(driver);
        match wifi.set_credentials(net.wifi_ssid, net.wifi_password) {
            Ok(()) => {
                if let Err(e) = wifi.connect(clock.now_ms()) {
                    warn!("WiFi: initial connect failed ({}), retrying in background", e);
                }
            }
            Err(e) => warn!("WiFi: {}", e),
        }

        match HttpBackend::new(net.backend_url, wifi) {
            Ok(mut backend) => {
                // First settings pull happens before the first sample.
                app.pull_settings(&mut backend, clock.now_ms(), &mut hw, &mut log_sink);
                spawn_on_core(Core::Pro, NET_TASK_PRIORITY, NET_TASK_STACK_KB, "net\0", move || {
                    NET_BRIDGE.serve_forever(backend);
                })?;
                network_enabled = true;
            }
            Err(e) => error!("Backend disabled: {}", e),
        }
    } else {
        info!("No backend URL configured, running offline");
    }

    let mut sched = Scheduler::from_config(&config, clock.now_ms());
    if !network_enabled {
        sched.set_task_enabled(ScheduledTask::Telemetry, false);
        sched.set_task_enabled(ScheduledTask::Settings, false);
    }
    let mut jobs = JobQueueDelegate::default();

    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        let now = clock.now_ms();

        sched.tick(now, &mut jobs);
        while let Some(job) = jobs.jobs.pop_front() {
            match job {
                ScheduledTask::Sample => {
                    app.sample_tick(now, &mut hw, &mut nvs, &mut log_sink);
                }
                ScheduledTask::Display => app.render(&mut display),
                ScheduledTask::Telemetry => {
                    let status = app.status();
                    log_sink.emit(&AppEvent::Telemetry(status));
                    NET_BRIDGE.request_telemetry(status);
                }
                ScheduledTask::Settings => {
                    NET_BRIDGE.request_settings();
                }
            }
        }

        // Results from the network worker, applied between ticks.
        while let Some(outcome) = NET_BRIDGE.poll_outcome() {
            match outcome {
                NetOutcome::Settings(update) => {
                    app.handle_command(AppCommand::ApplySettings(update), now, &mut hw, &mut log_sink);
                }
                NetOutcome::Failed(e) => log_sink.emit(&AppEvent::NetworkFailed(e)),
            }
        }

        // Local calibration triggers.
        match button.tick(clock.now_ms_u32()) {
            Some(ButtonEvent::ShortPress) => {
                app.handle_command(
                    AppCommand::StartCalibration(CalibrationSource::Button),
                    now,
                    &mut hw,
                    &mut log_sink,
                );
            }
            Some(ButtonEvent::LongPress) => info!("Button: long press ignored"),
            None => {}
        }
        if let Some(ConsoleCommand::Calibrate) = console.poll() {
            app.handle_command(
                AppCommand::StartCalibration(CalibrationSource::Console),
                now,
                &mut hw,
                &mut log_sink,
            );
        }

        // Config auto-save (5 s debounce after the first change).
        app.auto_save_if_needed(now, &nvs);

        watchdog.feed();
        std::thread::sleep(std::time::Duration::from_millis(LOOP_SLEEP_MS));
    }
}
