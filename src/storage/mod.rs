//! Persistent key-value storage port.
//!
//! Everything the device persists lives in a single NVS namespace as
//! fixed-layout blobs plus one string. Writes are atomic: the ESP-IDF NVS
//! commit either lands completely or not at all, and the in-memory backend
//! replaces values wholesale.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: raw `nvs_*` calls (handle opened per operation, committed,
//! closed). On host/test: a `HashMap` with a write counter for assertions.

pub mod config;

pub use config::ConfigStore;

use crate::error::{Error, Result};

/// Blob store port. Keys are namespaced; reads report the stored size.
pub trait Storage {
    /// Read a value into `buf`, returning the number of bytes copied.
    /// `Error::NotFound` when the key does not exist.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<()>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ---------------------------------------------------------------------------
// Host backend
// ---------------------------------------------------------------------------

/// In-memory backend for host builds and tests.
#[derive(Default)]
pub struct MemoryStorage {
    store: std::collections::HashMap<String, Vec<u8>>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// Number of successful writes, for persistence assertions.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Wipe every key (factory-reset simulation).
    pub fn erase_all(&mut self) {
        self.store.clear();
    }
}

impl Storage for MemoryStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize> {
        match self.store.get(&Self::composite_key(namespace, key)) {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(data.len())
            }
            None => Err(Error::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<()> {
        self.store
            .insert(Self::composite_key(namespace, key), data.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<()> {
        self.store.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&Self::composite_key(namespace, key))
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF backend
// ---------------------------------------------------------------------------

/// NVS-flash backend. `NvsStorage::init` erases and re-initialises the
/// partition on version mismatch, then hands out an instance.
#[cfg(target_os = "espidf")]
pub struct NvsStorage {
    _private: (),
}

#[cfg(target_os = "espidf")]
impl NvsStorage {
    pub fn init() -> Result<Self> {
        use esp_idf_svc::sys::*;

        // SAFETY: called once from the main task before concurrent access.
        let ret = unsafe { nvs_flash_init() };
        if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            log::warn!("NVS: erasing and re-initialising flash partition");
            if unsafe { nvs_flash_erase() } != ESP_OK {
                return Err(Error::Io("nvs_flash_erase"));
            }
            if unsafe { nvs_flash_init() } != ESP_OK {
                return Err(Error::Io("nvs_flash_init"));
            }
        } else if ret != ESP_OK {
            return Err(Error::Io("nvs_flash_init"));
        }
        Ok(Self { _private: () })
    }

    fn with_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T>
    where
        F: FnOnce(esp_idf_svc::sys::nvs_handle_t) -> Result<T>,
    {
        use esp_idf_svc::sys::*;

        let mut ns = [0u8; 16];
        let nb = namespace.as_bytes();
        let nl = nb.len().min(15);
        ns[..nl].copy_from_slice(&nb[..nl]);

        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret == ESP_ERR_NVS_NOT_FOUND {
            return Err(Error::NotFound);
        }
        if ret != ESP_OK {
            return Err(Error::Io("nvs_open"));
        }

        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    fn key_buf(key: &str) -> [u8; 16] {
        let mut kb = [0u8; 16];
        let bytes = key.as_bytes();
        let n = bytes.len().min(15);
        kb[..n].copy_from_slice(&bytes[..n]);
        kb
    }
}

#[cfg(target_os = "espidf")]
impl Storage for NvsStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize> {
        use esp_idf_svc::sys::*;

        Self::with_handle(namespace, false, |handle| {
            let kb = Self::key_buf(key);
            let mut size = buf.len();
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    kb.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            match ret {
                x if x == ESP_OK => Ok(size),
                x if x == ESP_ERR_NVS_NOT_FOUND => Err(Error::NotFound),
                _ => Err(Error::Io("nvs_get_blob")),
            }
        })
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<()> {
        use esp_idf_svc::sys::*;

        Self::with_handle(namespace, true, |handle| {
            let kb = Self::key_buf(key);
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    kb.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(Error::Io("nvs_set_blob"));
            }
            if unsafe { nvs_commit(handle) } != ESP_OK {
                return Err(Error::Io("nvs_commit"));
            }
            Ok(())
        })
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<()> {
        use esp_idf_svc::sys::*;

        Self::with_handle(namespace, true, |handle| {
            let kb = Self::key_buf(key);
            let ret = unsafe { nvs_erase_key(handle, kb.as_ptr() as *const _) };
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(Error::Io("nvs_erase_key"));
            }
            if unsafe { nvs_commit(handle) } != ESP_OK {
                return Err(Error::Io("nvs_commit"));
            }
            Ok(())
        })
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        let mut probe = [0u8; 1];
        !matches!(self.read(namespace, key, &mut probe), Err(Error::NotFound))
    }
}
