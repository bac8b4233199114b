//! Single-key serial console.
//!
//! The first byte waiting on UART0 decides: `c` / `C` starts a
//! calibration.  Everything buffered behind it is discarded so one key
//! press maps to one command.

use log::{debug, info};

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use crate::pins;

/// What a batch of console bytes asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Calibrate,
}

/// Interpret one batch of received bytes by its first byte.
pub fn scan_console_bytes(bytes: &[u8]) -> Option<ConsoleCommand> {
    match bytes.first() {
        Some(b'c' | b'C') => Some(ConsoleCommand::Calibrate),
        _ => None,
    }
}

pub struct SerialConsole {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim_rx: std::collections::VecDeque<u8>,
}

impl Default for SerialConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialConsole {
    pub fn new() -> Self {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            // SAFETY: one-time driver install on the console UART from the
            // main task; an existing driver makes this fail harmlessly.
            let ret = unsafe {
                esp_idf_svc::sys::uart_driver_install(
                    pins::CONSOLE_UART_PORT,
                    256,
                    0,
                    0,
                    core::ptr::null_mut(),
                    0,
                )
            };
            if ret != esp_idf_svc::sys::ESP_OK {
                log::warn!("Console: UART driver install returned {}", ret);
            }
        }
        info!("Console: press 'c' to calibrate");
        Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            sim_rx: std::collections::VecDeque::new(),
        }
    }

    /// Interpret the first pending byte, then drain the rest.
    pub fn poll(&mut self) -> Option<ConsoleCommand> {
        let mut buf = [0u8; 64];
        let n = self.read_nonblocking(&mut buf);
        if n == 0 {
            return None;
        }
        let command = scan_console_bytes(&buf[..n]);
        let mut discarded = n - 1;
        loop {
            let n = self.read_nonblocking(&mut buf);
            if n == 0 {
                break;
            }
            discarded += n;
        }
        debug!("Console: {:?}, {} byte(s) discarded", command, discarded);
        command
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        // SAFETY: UART0 driver is installed by the console VFS at boot;
        // zero ticks to wait makes this a non-blocking read.
        let n = unsafe {
            esp_idf_svc::sys::uart_read_bytes(
                pins::CONSOLE_UART_PORT,
                buf.as_mut_ptr() as *mut _,
                buf.len() as u32,
                0,
            )
        };
        n.max(0) as usize
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.sim_rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.sim_rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    /// Simulation: bytes "typed" on the console.
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn sim_type(&mut self, bytes: &[u8]) {
        self.sim_rx.extend(bytes);
    }
}
