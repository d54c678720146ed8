//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the node.
//!
//! - Config: a `postcard` blob under `aqnode/nodecfg`, validated before
//!   every save.
//! - Byte storage: an EEPROM-style region of [`EEPROM_SIZE`] bytes kept as
//!   one blob under `aqnode/eeprom`.  Bytes never written read as 0xFF,
//!   like erased flash.  Writes are read-modify-write of the whole blob
//!   followed by `nvs_commit()`, which is atomic.
//!
//! On the host the same blobs live in an in-memory map.

use core::ffi::CStr;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::NodeConfig;
use crate::error::Result as NodeResult;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Size of the emulated EEPROM region.
pub const EEPROM_SIZE: usize = 512;

#[cfg(target_os = "espidf")]
const NAMESPACE: &CStr = c"aqnode";
const CONFIG_KEY: &CStr = c"nodecfg";
const EEPROM_KEY: &CStr = c"eeprom";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<&'static CStr, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Bring up NVS and load the stored config.  Only a failed flash
    /// init is fatal; an unusable config falls back to defaults.
    pub fn open() -> NodeResult<(Self, NodeConfig)> {
        let nvs = Self::new()?;
        let config = nvs.load().unwrap_or_else(|e| {
            warn!("NvsAdapter: config load failed ({}), using defaults", e);
            NodeConfig::default()
        });
        Ok((nvs, config))
    }

    /// Open the node namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(NAMESPACE.as_ptr(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Fetch a blob.  `Ok(None)` if the key has never been written.
    #[cfg(target_os = "espidf")]
    fn load_blob(&self, key: &'static CStr) -> Result<Option<Vec<u8>>, StorageError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            // First call: get size
            let ret = unsafe { nvs_get_blob(handle, key.as_ptr(), core::ptr::null_mut(), &mut size) };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            // A namespace that was never opened for writing is also "nothing stored".
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: read of {:?} failed ({})", key, e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn load_blob(&self, key: &'static CStr) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.borrow().get(key).cloned())
    }

    /// Write a blob and commit it.
    #[cfg(target_os = "espidf")]
    fn store_blob(&self, key: &'static CStr, data: &[u8]) -> Result<(), StorageError> {
        let result = Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr(), data.as_ptr().cast(), data.len())
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
            warn!("NvsAdapter: write of {:?} failed ({})", key, e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn store_blob(&self, key: &'static CStr, data: &[u8]) -> Result<(), StorageError> {
        self.store.borrow_mut().insert(key, data.to_vec());
        Ok(())
    }

    /// The whole EEPROM region, erased bytes included.
    fn eeprom(&self) -> Result<Vec<u8>, StorageError> {
        let mut region = self.load_blob(EEPROM_KEY)?.unwrap_or_default();
        region.resize(EEPROM_SIZE, 0xFF);
        Ok(region)
    }
}

fn region_range(address: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
    let start = usize::from(address);
    let end = start + len;
    if end > EEPROM_SIZE {
        return Err(StorageError::OutOfBounds);
    }
    Ok(start..end)
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        let bytes = match self.load_blob(CONFIG_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(NodeConfig::default());
            }
            Err(e) => {
                warn!("NvsAdapter: config read error ({}), using defaults", e);
                return Ok(NodeConfig::default());
            }
        };
        let cfg: NodeConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.store_blob(CONFIG_KEY, &bytes).map_err(|e| match e {
            StorageError::Full => ConfigError::StorageFull,
            _ => ConfigError::IoError,
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = region_range(address, buf.len())?;
        buf.copy_from_slice(&self.eeprom()?[range]);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let range = region_range(address, data.len())?;
        let mut region = self.eeprom()?;
        if region[range.clone()] == *data {
            return Ok(());
        }
        region[range].copy_from_slice(data);
        self.store_blob(EEPROM_KEY, &region)
    }
}
