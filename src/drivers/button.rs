//! ISR-debounced BOOT button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch with pull-up. GPIO fires on falling edge;
//! the ISR records the raw timestamp into an atomic, and `tick()` (called
//! from the main loop) runs the debounce state machine.
//!
//! ## Gestures
//!
//! | Gesture      | Condition              | Event        |
//! |--------------|------------------------|--------------|
//! | Short press  | Released before 3 s    | `ShortPress` |
//! | Long press   | Held for 3 s or more   | `LongPress`  |
//!
//! A short press requests a calibration run.  A long press is reported but
//! carries no action.

use core::sync::atomic::{AtomicU32, Ordering};

const DEBOUNCE_MS: u32 = 50;
const LONG_PRESS_MS: u32 = 3000;

/// Raw ISR timestamp (milliseconds since boot, truncated to u32).
static BUTTON_ISR_TIMESTAMP: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long press already reported; wait for release.
    Latched,
}

pub struct ButtonDriver {
    gpio: i32,
    state: PressState,
    last_isr_ms: u32,
}

impl ButtonDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            state: PressState::Idle,
            last_isr_ms: BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire),
        }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Call from the main loop on every pass.
    pub fn tick(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        self.tick_with_level(now_ms, Self::is_pressed_hw())
    }

    fn tick_with_level(&mut self, now_ms: u32, pressed: bool) -> Option<ButtonEvent> {
        let isr_ms = BUTTON_ISR_TIMESTAMP.load(Ordering::Acquire);
        let new_edge = isr_ms != self.last_isr_ms && isr_ms != 0;

        match self.state {
            PressState::Idle => {
                if new_edge {
                    self.last_isr_ms = isr_ms;
                    self.state = PressState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            PressState::DebounceWait { since_ms } => {
                if now_ms.wrapping_sub(since_ms) < DEBOUNCE_MS {
                    return None;
                }
                // Bounce: the line is already back high.
                self.state = if pressed {
                    PressState::Pressed { since_ms }
                } else {
                    PressState::Idle
                };
                None
            }

            PressState::Pressed { since_ms } => {
                // Contact chatter while held re-fires the ISR.
                self.last_isr_ms = isr_ms;
                if now_ms.wrapping_sub(since_ms) >= LONG_PRESS_MS {
                    self.state = PressState::Latched;
                    return Some(ButtonEvent::LongPress);
                }
                if !pressed {
                    self.state = PressState::Idle;
                    return Some(ButtonEvent::ShortPress);
                }
                None
            }

            PressState::Latched => {
                self.last_isr_ms = isr_ms;
                if !pressed {
                    self.state = PressState::Idle;
                }
                None
            }
        }
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn is_pressed_hw() -> bool {
        !crate::drivers::hw_init::gpio_read(crate::pins::BUTTON_GPIO)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn is_pressed_hw() -> bool {
        false
    }
}

/// ISR handler for the button GPIO falling edge.
/// Safe to call from interrupt context (lock-free atomic store).
pub fn button_isr_handler(now_ms: u32) {
    BUTTON_ISR_TIMESTAMP.store(now_ms, Ordering::Release);
}
