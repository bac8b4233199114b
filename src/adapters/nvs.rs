//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`], [`StoragePort`] and [`PersistencePort`].
//!
//! | Namespace     | Key            | Content                           |
//! |---------------|----------------|-----------------------------------|
//! | `pressureguard` | `syscfg`     | postcard-encoded [`SystemConfig`] |
//! | `system_vars` | `max_pressure` | calibration reference, f32 LE     |
//!
//! - Config validation: every field is range-checked before persistence
//!   and again after loading.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.

use crate::app::ports::{ConfigError, ConfigPort, PersistencePort, StorageError, StoragePort};
use crate::app::service::REFERENCE_NAMESPACE;
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
use std::collections::HashMap;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "pressureguard";
const CONFIG_KEY: &str = "syscfg";

/// Upper bound for any blob read back from flash.
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

/// An adapter over flash that was never initialised.  Every read falls
/// back to defaults and every write fails, so a failed [`NvsAdapter::new`]
/// degrades to "no persistence" instead of stopping the regulator.
impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }
}

impl NvsAdapter {
    /// Create the adapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased and
    /// re-initialised; the reference then reads as absent.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (max 15 characters).
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn nvs_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::nvs_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Read a whole blob into a fresh buffer.
    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        let len = self.read(namespace, key, &mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

// ── ConfigPort ────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = match self.read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(SystemConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({})", e);
                return Err(ConfigError::IoError);
            }
        };

        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let key = Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
                let key = Self::nvs_name(CONFIG_KEY);
                // SAFETY: key and bytes outlive the call; handle is open.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

// ── PersistencePort ───────────────────────────────────────────

impl PersistencePort for NvsAdapter {
    fn load_float(&self, key: &str, default: f32) -> f32 {
        let mut buf = [0u8; 4];
        match self.read(REFERENCE_NAMESPACE, key, &mut buf) {
            Ok(4) => f32::from_le_bytes(buf),
            Ok(n) => {
                warn!("NvsAdapter: '{}' has {} bytes, expected 4", key, n);
                default
            }
            Err(StorageError::NotFound) => default,
            Err(e) => {
                warn!("NvsAdapter: '{}' unreadable ({})", key, e);
                default
            }
        }
    }

    fn store_float(&mut self, key: &str, value: f32) -> Result<(), StorageError> {
        self.write(REFERENCE_NAMESPACE, key, &value.to_le_bytes())
    }
}

// ── StoragePort ───────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                // Mirrors nvs_get_blob: a short buffer is an error.
                Some(data) if data.len() > buf.len() => Err(StorageError::IoError),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key = Self::nvs_name(key);
                let mut size = buf.len();
                // SAFETY: `size` holds the capacity of `buf`; NVS writes at
                // most that many bytes.
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(all(target_os = "espidf", feature = "espidf"))]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key = Self::nvs_name(key);
                // SAFETY: key and data outlive the call; handle is open.
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key.as_ptr() as *const _,
                        data.as_ptr() as *const _,
                        data.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|e| {
                if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                    StorageError::Full
                } else {
                    StorageError::IoError
                }
            })
        }
    }
}
