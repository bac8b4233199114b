//! Serial status line.
//!
//! ```text
//! Pressure: 6.20 Bar | 62% | PUMP: OFF | VALVE: OPEN | STATE: High Pressure Relief
//! ```
//!
//! Written straight to stdout (UART0 on the device) so it stays readable
//! without log prefixes.

use core::fmt::Write;

use crate::app::ports::DisplayPort;
use crate::fsm::context::StatusSnapshot;

pub const STATUS_LINE_CAP: usize = 128;

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

/// Format one status line.
pub fn format_status_line(status: &StatusSnapshot) -> heapless::String<STATUS_LINE_CAP> {
    let mut line = heapless::String::new();
    // Longest line is ~90 bytes, so the writes below cannot overflow.
    let _ = match status.pressure_bar {
        Some(bar) => write!(line, "Pressure: {:.2} Bar | ", bar),
        None => write!(line, "Pressure: SENSOR FAULT | "),
    };
    let _ = match status.percent {
        Some(pct) => write!(line, "{:.0}% | ", pct),
        None => write!(line, "No Ref | "),
    };
    let _ = write!(
        line,
        "PUMP: {} | VALVE: {} | STATE: {}",
        on_off(status.pump_on),
        if status.valve_open { "OPEN" } else { "CLOSED" },
        status.state.label()
    );
    line
}

/// [`DisplayPort`] that prints the status line.
#[derive(Default)]
pub struct SerialDisplay {
    last: heapless::String<STATUS_LINE_CAP>,
    lines: u32,
}

impl SerialDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently rendered line.
    pub fn last_line(&self) -> &str {
        &self.last
    }

    pub fn lines_rendered(&self) -> u32 {
        self.lines
    }
}

impl DisplayPort for SerialDisplay {
    fn render(&mut self, status: &StatusSnapshot) {
        self.last = format_status_line(status);
        self.lines = self.lines.wrapping_add(1);
        println!("{}", self.last);
    }
}
