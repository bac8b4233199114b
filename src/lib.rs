//! PressureGuard firmware library.
//!
//! Pump and relief-valve regulator for a pressurised water line: usage
//! detection, idle leak detection and reference auto-calibration.  The
//! pure-logic modules (`fsm`, `control`, `safety`, `app`) build on any
//! target.  ESP-IDF-specific code inside each adapter and driver is
//! guarded by `#[cfg(all(target_os = "espidf", feature = "espidf"))]`;
//! without the feature every target builds the simulated backends.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod net;
pub mod safety;
pub mod scheduler;
pub mod pins;
pub mod wire;

pub mod adapters;
pub mod drivers;
pub mod sensors;
