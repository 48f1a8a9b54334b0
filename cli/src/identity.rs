//! Device identity: persisted fingerprint and derived device id.
//!
//! The encrypted fingerprint is generated once from a randomized device
//! profile and reused from disk on subsequent runs, so the server keeps
//! seeing the same device. The device id is the MD5 hex digest of the
//! fingerprint string.

use std::fs;
use std::path::PathBuf;

use ax_core::fingerprint::{self, DeviceProfile};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::SessionError;

/// Identity values sent in CIAM headers.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    /// Encrypted device fingerprint (`Ax-Fingerprint`).
    pub fingerprint: String,
    /// MD5 hex of the fingerprint (`Ax-Device-Id`).
    pub device_id: String,
}

/// File-backed cache for the encrypted device fingerprint.
///
/// A stored fingerprint is reused as long as the file holds plausible
/// content; [`FingerprintStore::invalidate`] drops both the cache and the
/// file so the next read mints a fresh identity.
#[derive(Debug)]
pub struct FingerprintStore {
    path: PathBuf,
    key: String,
    cached: Option<String>,
}

impl FingerprintStore {
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.fingerprint_file.clone(),
            key: config.fingerprint_key.clone(),
            cached: None,
        }
    }

    /// Return the persisted fingerprint, minting and saving a new one if
    /// the file is absent or holds junk.
    pub fn load_or_create(&mut self) -> Result<String, SessionError> {
        if let Some(fp) = &self.cached {
            return Ok(fp.clone());
        }
        if let Ok(content) = fs::read_to_string(&self.path) {
            let content = content.trim().to_string();
            // Anything shorter cannot be a valid encrypted blob.
            if content.len() > 10 {
                debug!(path = %self.path.display(), "reusing stored fingerprint");
                self.cached = Some(content.clone());
                return Ok(content);
            }
        }

        let profile = DeviceProfile::random();
        let fp = fingerprint::encrypt_fingerprint(&self.key, &profile)?;
        fs::write(&self.path, &fp)?;
        info!(path = %self.path.display(), "generated new device fingerprint");
        self.cached = Some(fp.clone());
        Ok(fp)
    }

    /// Forget the stored fingerprint; the next read mints a new identity.
    pub fn invalidate(&mut self) -> Result<(), SessionError> {
        self.cached = None;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }

    /// Fingerprint plus the device id derived from it.
    pub fn identity(&mut self) -> Result<DeviceIdentity, SessionError> {
        let fp = self.load_or_create()?;
        Ok(DeviceIdentity {
            device_id: fingerprint::device_id(&fp),
            fingerprint: fp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(file: &str) -> Config {
        let mut path = std::env::temp_dir();
        path.push(format!("{}-{}", file, uuid::Uuid::new_v4()));
        Config {
            base_api_url: String::new(),
            base_ciam_url: String::new(),
            api_key: String::new(),
            basic_auth: String::new(),
            user_agent: String::new(),
            app_version: String::new(),
            xdata_key: String::new(),
            fingerprint_key: "0123456789abcdef0123456789abcdef".to_string(),
            otp_sig_key: String::new(),
            api_base_secret: String::new(),
            field_key: String::new(),
            token_file: PathBuf::new(),
            active_number_file: PathBuf::new(),
            fingerprint_file: path,
            http_timeout: std::time::Duration::from_secs(1),
        }
    }

    #[test]
    fn fingerprint_is_minted_once_and_reused() {
        let config = temp_config("fp-reuse");
        let mut store = FingerprintStore::new(&config);
        let first = store.load_or_create().unwrap();
        assert!(first.len() > 10);

        // A second store over the same file sees the same value.
        let mut second_store = FingerprintStore::new(&config);
        let second = second_store.load_or_create().unwrap();
        assert_eq!(first, second);

        let _ = fs::remove_file(&config.fingerprint_file);
    }

    #[test]
    fn junk_file_is_replaced() {
        let config = temp_config("fp-junk");
        fs::write(&config.fingerprint_file, "short").unwrap();
        let mut store = FingerprintStore::new(&config);
        let fp = store.load_or_create().unwrap();
        assert!(fp.len() > 10);
        assert_ne!(fp, "short");
        let _ = fs::remove_file(&config.fingerprint_file);
    }

    #[test]
    fn invalidate_mints_a_new_identity() {
        let config = temp_config("fp-invalidate");
        let mut store = FingerprintStore::new(&config);
        let first = store.identity().unwrap();
        store.invalidate().unwrap();
        let second = store.identity().unwrap();
        // Random profile makes a collision effectively impossible.
        assert_ne!(first.fingerprint, second.fingerprint);
        assert_ne!(first.device_id, second.device_id);
        let _ = fs::remove_file(&config.fingerprint_file);
    }

    #[test]
    fn device_id_is_md5_of_fingerprint() {
        let config = temp_config("fp-devid");
        let mut store = FingerprintStore::new(&config);
        let id = store.identity().unwrap();
        assert_eq!(id.device_id.len(), 32);
        assert_eq!(id.device_id, ax_core::device_id(&id.fingerprint));
        let _ = fs::remove_file(&config.fingerprint_file);
    }
}
