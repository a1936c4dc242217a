//! Secure Storage Module
//!
//! Encrypted-at-rest key/value slots for bearer tokens. Windows uses DPAPI;
//! other platforms fall back to plaintext files (development only).

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

#[cfg(windows)]
use windows::Win32::Security::Cryptography::{
    CryptProtectData, CryptUnprotectData, CRYPTPROTECT_UI_FORBIDDEN, CRYPT_INTEGER_BLOB,
};

/// Which token slot to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),
}

/// Keyed blob storage, one file per key under a data directory.
pub struct SecureStorage {
    storage_path: PathBuf,
}

impl SecureStorage {
    /// Open storage rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let storage_path = dir.as_ref().to_path_buf();

        if let Err(e) = std::fs::create_dir_all(&storage_path) {
            error!("Failed to create storage directory: {}", e);
        }

        debug!("Secure storage initialized at: {:?}", storage_path);

        Self { storage_path }
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.storage_path.join(format!("{}.dat", key))
    }

    /// Write a value under `key`, encrypting at rest.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(data)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let encrypted = self.encrypt(json.as_bytes())?;

        std::fs::write(self.slot_path(key), encrypted)
            .map_err(|e| StorageError::Io(e.to_string()))?;

        debug!("Saved encrypted value for key: {}", key);
        Ok(())
    }

    /// Read the value under `key`, or `None` if the slot was never written.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.slot_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let encrypted = std::fs::read(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        let decrypted = self.decrypt(&encrypted)?;

        let json = String::from_utf8(decrypted)
            .map_err(|e| StorageError::Decryption(e.to_string()))?;

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    #[cfg(windows)]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        unsafe {
            let input = CRYPT_INTEGER_BLOB {
                cbData: data.len() as u32,
                pbData: data.as_ptr() as *mut u8,
            };
            let mut output = CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: std::ptr::null_mut(),
            };

            CryptProtectData(
                &input,
                None,
                None,
                None,
                None,
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut output,
            )
            .map_err(|_| StorageError::Encryption("DPAPI encryption failed".into()))?;

            Ok(take_blob(output))
        }
    }

    #[cfg(windows)]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        unsafe {
            let input = CRYPT_INTEGER_BLOB {
                cbData: data.len() as u32,
                pbData: data.as_ptr() as *mut u8,
            };
            let mut output = CRYPT_INTEGER_BLOB {
                cbData: 0,
                pbData: std::ptr::null_mut(),
            };

            CryptUnprotectData(
                &input,
                None,
                None,
                None,
                None,
                CRYPTPROTECT_UI_FORBIDDEN,
                &mut output,
            )
            .map_err(|_| StorageError::Decryption("DPAPI decryption failed".into()))?;

            Ok(take_blob(output))
        }
    }

    #[cfg(not(windows))]
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        // Fallback for non-Windows (development only)
        Ok(data.to_vec())
    }

    #[cfg(not(windows))]
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, StorageError> {
        // Fallback for non-Windows (development only)
        Ok(data.to_vec())
    }
}

/// Copy out a DPAPI output blob and free the LocalAlloc'd buffer.
#[cfg(windows)]
unsafe fn take_blob(blob: CRYPT_INTEGER_BLOB) -> Vec<u8> {
    let bytes = std::slice::from_raw_parts(blob.pbData, blob.cbData as usize).to_vec();
    windows::Win32::Foundation::LocalFree(windows::Win32::Foundation::HLOCAL(
        blob.pbData as *mut std::ffi::c_void,
    ));
    bytes
}

/// The two token slots backing the auth session.
///
/// The public contract never fails: a storage error reads as an empty token,
/// the same as a slot that was never written. The distinction is still
/// visible in the logs and via [`TokenStore::read`].
pub struct TokenStore {
    storage: SecureStorage,
    access_key: String,
    refresh_key: String,
}

impl TokenStore {
    pub fn new(storage: SecureStorage, access_key: &str, refresh_key: &str) -> Self {
        Self {
            storage,
            access_key: access_key.to_string(),
            refresh_key: refresh_key.to_string(),
        }
    }

    fn key(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_key,
            TokenKind::Refresh => &self.refresh_key,
        }
    }

    /// Tri-state read: `Ok(Some(_))` stored, `Ok(None)` never written,
    /// `Err(_)` storage failure.
    pub fn read(&self, kind: TokenKind) -> Result<Option<String>, StorageError> {
        self.storage.load::<String>(self.key(kind))
    }

    /// Stored token, or empty string if absent or unreadable.
    pub fn get(&self, kind: TokenKind) -> String {
        match self.read(kind) {
            Ok(Some(value)) => value,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Failed to read {:?} token, treating as absent: {}", kind, e);
                String::new()
            }
        }
    }

    /// Best-effort write; failures are logged and swallowed.
    pub fn set(&self, kind: TokenKind, value: &str) {
        if let Err(e) = self.storage.save(self.key(kind), value) {
            error!("Failed to store {:?} token: {}", kind, e);
        }
    }

    /// Clear both slots (set to empty string).
    pub fn clear(&self) {
        info!("Clearing stored tokens");
        self.set(TokenKind::Access, "");
        self.set(TokenKind::Refresh, "");
    }
}
