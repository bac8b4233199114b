//! Pure decision helpers used by the pressure controller.
//!
//! Each submodule is free of timing plumbing and I/O so it can be
//! unit- and property-tested on its own:
//!
//! | Module        | Decides                                         |
//! |---------------|-------------------------------------------------|
//! | `usage`       | whether a pressure drop is a deliberate draw    |
//! | `leak`        | whether idle pressure decay indicates a leak    |
//! | `calibration` | when the pump has found its peak pressure       |

pub mod calibration;
pub mod leak;
pub mod usage;

/// Pressure as a percentage of the calibrated reference.
///
/// Returns `None` while uncalibrated (`reference <= 0`).
pub fn percent_of_reference(reading_bar: f32, reference_bar: f32) -> Option<f32> {
    if reference_bar > 0.0 {
        Some(reading_bar / reference_bar * 100.0)
    } else {
        None
    }
}
