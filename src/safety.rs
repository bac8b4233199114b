//! Safety supervisor.
//!
//! The supervisor runs **every sample tick before the controller** and
//! latches a sensor-fault bitmask.  While any bit is set the service skips
//! evaluation and forces both relays off.
//!
//! ## Fault lifecycle
//!
//! 1. The sensor port returns a fault (disconnected or shorted).
//! 2. The supervisor sets the matching bit and reports the rising edge.
//! 3. The service forces pump off / valve closed; the controller state is
//!    left untouched.
//! 4. The first valid reading clears every bit and reports the falling
//!    edge; evaluation resumes on that same tick.

use log::{error, info};

use crate::error::SensorFault;

/// Edge produced by one [`SafetySupervisor::evaluate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEdge {
    /// No change since the previous sample.
    Steady,
    /// A fault bit went from clear to set.
    Raised(SensorFault),
    /// All faults cleared by a valid reading.
    Cleared,
}

/// Safety supervisor.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate the latest sensor result.
    pub fn evaluate(&mut self, sample: &Result<f32, SensorFault>) -> FaultEdge {
        match sample {
            Err(fault) => {
                let was_set = self.has_fault(*fault);
                // A wiring fault replaces whatever was latched before.
                let previous = self.faults;
                self.faults = fault.mask();
                if was_set {
                    FaultEdge::Steady
                } else {
                    if previous != 0 {
                        info!("SAFETY FAULT CHANGED: mask 0b{:02b} -> {fault}", previous);
                    }
                    error!("SAFETY FAULT SET: {fault}");
                    FaultEdge::Raised(*fault)
                }
            }
            Ok(_) if self.has_faults() => {
                info!("SAFETY FAULT CLEARED: sensor reading valid again");
                self.faults = 0;
                FaultEdge::Cleared
            }
            Ok(_) => FaultEdge::Steady,
        }
    }

    /// Current fault bitmask.
    pub fn faults(&self) -> u8 {
        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: SensorFault) -> bool {
        self.faults & fault.mask() != 0
    }
}
