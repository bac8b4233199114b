//! Monotonic time source.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` (microsecond
//!   precision, monotonic from boot).
//! - **`not(target_os = "espidf")`**: `std::time::Instant` anchored at the
//!   first call, for host-side simulation.

/// Milliseconds since boot.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn uptime_ms() -> u64 {
    // SAFETY: esp_timer_get_time is a lock-free counter read.
    (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
}

/// Milliseconds since the first call.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn uptime_ms() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_millis() as u64
}

/// Clock handle passed to code that wants an injectable time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn now_ms(&self) -> u64 {
        uptime_ms()
    }

    /// Wrapping 32-bit view used by the button ISR timestamps.
    pub fn now_ms_u32(&self) -> u32 {
        uptime_ms() as u32
    }

    pub fn uptime_secs(&self) -> u64 {
        uptime_ms() / 1_000
    }
}
