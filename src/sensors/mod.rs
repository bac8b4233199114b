//! Sensor subsystem.
//!
//! A single analog pressure transducer; see [`pressure`].

pub mod pressure;
