//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to                 |
//! |------------|--------------------------------|-----------------------------|
//! | `backend`  | SettingsPort, TelemetryPort    | HTTP settings/telemetry API |
//! | `console`  | (command source)               | UART0 single-key input      |
//! | `display`  | DisplayPort                    | UART0 status line           |
//! | `hardware` | SensorPort, ActuatorPort       | ADC1, relay GPIOs           |
//! | `log_sink` | EventSink                      | Serial log output           |
//! | `nvs`      | ConfigPort, StoragePort,       | NVS / in-memory store       |
//! |            | PersistencePort                |                             |
//! | `time`     | (clock)                        | ESP32 system timer          |
//! | `wifi`     | ConnectivityPort               | ESP-IDF WiFi STA            |

pub mod backend;
pub mod console;
pub mod display;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub(super) mod utils;
pub mod wifi;
