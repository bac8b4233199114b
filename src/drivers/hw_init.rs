//! One-shot hardware peripheral initialization.
//!
//! Configures the pressure ADC channel, the relay outputs and the button
//! input using raw ESP-IDF sys calls. Called once from `main()` before the
//! main loop starts.

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
use core::sync::atomic::{AtomicU64, Ordering};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrInstallFailed(rc) => {
                write!(f, "GPIO ISR service install failed (rc={})", rc)
            }
        }
    }
}

impl std::error::Error for HwInitError {}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use log::info;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use crate::pins;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the main loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_adc()?;
        init_gpio_inputs()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(all(target_os = "espidf", feature = "espidf"))]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation gives the full 0-3.3 V input range.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };

    let ret = unsafe {
        adc_oneshot_config_channel(adc1_handle(), pins::PRESSURE_ADC_CHANNEL, &chan_cfg)
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    info!(
        "hw_init: ADC1 configured (CH{}=pressure)",
        pins::PRESSURE_ADC_CHANNEL
    );
    Ok(())
}

/// Read one raw ADC1 sample.  A failed conversion reads as 0, which the
/// pressure driver classifies as a disconnected sensor.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.max(0) as u16
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(all(target_os = "espidf", feature = "espidf"))]
unsafe fn init_gpio_inputs() -> Result<(), HwInitError> {
    let btn_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::BUTTON_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_NEGEDGE,
    };
    let ret = unsafe { gpio_config(&btn_cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }

    info!("hw_init: button input configured");
    Ok(())
}

#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

// ── GPIO Outputs ──────────────────────────────────────────────

/// Relays are configured first and driven LOW so nothing energises while
/// the rest of the board comes up.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let output_pins = [pins::PUMP_RELAY_GPIO, pins::VALVE_RELAY_GPIO];

    for &pin in &output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin as gpio_num_t, 0) };
    }

    info!("hw_init: relay outputs configured (all LOW)");
    Ok(())
}

/// Drive an output pin.  Returns the raw ESP-IDF error code on failure.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), i32> {
    // SAFETY: gpio_set_level writes to an output pin configured in
    // init_gpio_outputs(). Main-loop only.
    let ret = unsafe { gpio_set_level(pin as gpio_num_t, u32::from(high)) };
    if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
}

// ── Simulated GPIO outputs ────────────────────────────────────

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
static SIM_OUTPUT_LEVELS: AtomicU64 = AtomicU64::new(0);

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn gpio_write(pin: i32, high: bool) -> Result<(), i32> {
    if !(0..64).contains(&pin) {
        return Err(-1);
    }
    let bit = 1u64 << pin;
    if high {
        SIM_OUTPUT_LEVELS.fetch_or(bit, Ordering::Relaxed);
    } else {
        SIM_OUTPUT_LEVELS.fetch_and(!bit, Ordering::Relaxed);
    }
    Ok(())
}

/// Last level written to a simulated output pin.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn sim_output_level(pin: i32) -> bool {
    (0..64).contains(&pin) && SIM_OUTPUT_LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use crate::drivers::button::button_isr_handler;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
unsafe extern "C" fn button_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: esp_timer_get_time is a RTC counter read; safe in ISR context.
    let now_ms = (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1_000) as u32;
    button_isr_handler(now_ms);
}

/// Install the GPIO ISR service and register the button handler.
/// Call after init_peripherals() and before the main loop.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service was already
    // installed. The handler only stores an atomic timestamp.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Falling edge: active-low with pull-up already configured.
        gpio_set_intr_type(
            pins::BUTTON_GPIO as gpio_num_t,
            gpio_int_type_t_GPIO_INTR_NEGEDGE,
        );
        gpio_isr_handler_add(
            pins::BUTTON_GPIO as gpio_num_t,
            Some(button_gpio_isr),
            core::ptr::null_mut(),
        );
        gpio_intr_enable(pins::BUTTON_GPIO as gpio_num_t);

        info!("hw_init: ISR service installed (button)");
    }
    Ok(())
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}

#[cfg(all(test, not(all(target_os = "espidf", feature = "espidf"))))]
mod tests {
    use super::*;

    #[test]
    fn sim_outputs_track_writes() {
        // Pins well away from the relay pins used by other tests.
        assert_eq!(gpio_write(40, true), Ok(()));
        assert!(sim_output_level(40));
        assert_eq!(gpio_write(40, false), Ok(()));
        assert!(!sim_output_level(40));
    }

    #[test]
    fn out_of_range_pin_is_rejected() {
        assert_eq!(gpio_write(64, true), Err(-1));
        assert!(!sim_output_level(-3));
    }

    #[test]
    fn init_is_noop_without_espidf_feature() {
        assert_eq!(init_peripherals(), Ok(()));
        assert_eq!(init_isr_service(), Ok(()));
    }
}
