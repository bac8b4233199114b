//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full relay
//! history without touching real GPIO, and replays scripted pressure
//! readings (or faults) one per sample tick.

use pressureguard::app::events::AppEvent;
use pressureguard::app::ports::{
    ActuatorPort, ConfigError, ConfigPort, EventSink, PersistencePort, SensorPort, StorageError,
};
use pressureguard::config::SystemConfig;
use pressureguard::error::SensorFault;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    Pump(bool),
    Valve(bool),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    readings: VecDeque<Result<f32, SensorFault>>,
    /// Returned once the script runs dry.
    hold: Result<f32, SensorFault>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            readings: VecDeque::new(),
            hold: Ok(0.0),
        }
    }

    /// Queue one reading for the next sample tick.
    pub fn push_reading(&mut self, bar: f32) {
        self.readings.push_back(Ok(bar));
    }

    pub fn push_fault(&mut self, fault: SensorFault) {
        self.readings.push_back(Err(fault));
    }

    /// Reading returned when nothing is queued.
    pub fn hold_at(&mut self, bar: f32) {
        self.hold = Ok(bar);
    }

    pub fn pump_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Pump(on) => Some(*on),
                ActuatorCall::Valve(_) => None,
            })
            .unwrap_or(false)
    }

    pub fn valve_open(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                ActuatorCall::Valve(open) => Some(*open),
                ActuatorCall::Pump(_) => None,
            })
            .unwrap_or(false)
    }

    /// Pump and valve both energised in the latest pair of writes.
    pub fn both_energised(&self) -> bool {
        self.pump_on() && self.valve_open()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_pressure(&mut self) -> Result<f32, SensorFault> {
        self.readings.pop_front().unwrap_or(self.hold)
    }
}

impl ActuatorPort for MockHardware {
    fn set_pump(&mut self, on: bool) {
        self.calls.push(ActuatorCall::Pump(on));
    }

    fn set_valve(&mut self, open: bool) {
        self.calls.push(ActuatorCall::Valve(open));
    }
}

// ── MockNvs ───────────────────────────────────────────────────

pub struct MockNvs {
    floats: HashMap<String, f32>,
    config: RefCell<Option<SystemConfig>>,
    pub fail_writes: bool,
    pub config_saves: RefCell<u32>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self {
            floats: HashMap::new(),
            config: RefCell::new(None),
            fail_writes: false,
            config_saves: RefCell::new(0),
        }
    }

    pub fn with_reference(bar: f32) -> Self {
        let mut nvs = Self::new();
        nvs.floats.insert("max_pressure".to_owned(), bar);
        nvs
    }

    pub fn stored(&self, key: &str) -> Option<f32> {
        self.floats.get(key).copied()
    }

    pub fn saved_config(&self) -> Option<SystemConfig> {
        self.config.borrow().clone()
    }
}

impl Default for MockNvs {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistencePort for MockNvs {
    fn load_float(&self, key: &str, default: f32) -> f32 {
        self.floats.get(key).copied().unwrap_or(default)
    }

    fn store_float(&mut self, key: &str, value: f32) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.floats.insert(key.to_owned(), value);
        Ok(())
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self.config.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config_saves.borrow_mut() += 1;
        *self.config.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
