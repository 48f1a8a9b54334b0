//! Device fingerprint and device id.
//!
//! Login and OTP requests carry an `Ax-Fingerprint` header: a synthetic
//! device profile, pipe-delimited, AES-256-CBC encrypted with an all-zero
//! IV (the value is meant to be stable and is not replay-sensitive), and
//! base64 encoded. `Ax-Device-Id` is the MD5 hex digest of that
//! fingerprint string. Persistence of the fingerprint across runs is the
//! client's responsibility; this module only synthesizes and encrypts.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};
use rand::Rng;

use crate::cipher::encrypt_cbc;
use crate::error::{CryptoError, Result};

/// Required fingerprint key length (AES-256, ASCII key material).
const FP_KEY_LEN: usize = 32;

/// Synthetic device profile backing the fingerprint.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub manufacturer: String,
    pub model: String,
    pub lang: String,
    pub resolution: String,
    pub tz_short: String,
    pub ip: String,
    pub font_scale: f32,
    pub android_release: String,
    pub msisdn: String,
}

impl DeviceProfile {
    /// Synthesize a plausible profile with randomized hardware names.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            manufacturer: format!("Vertu{}", rng.gen_range(1000..10000)),
            model: format!("Asterion X1 Ultra{}", rng.gen_range(1000..10000)),
            lang: "en".to_string(),
            resolution: "720x1540".to_string(),
            tz_short: "GMT07:00".to_string(),
            ip: "127.0.0.1".to_string(),
            font_scale: 1.0,
            android_release: "14".to_string(),
            msisdn: "6281911120078".to_string(),
        }
    }

    /// Pipe-delimited plaintext form expected by the server.
    pub fn to_plain(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{:.1}|Android {}|{}",
            self.manufacturer,
            self.model,
            self.lang,
            self.resolution,
            self.tz_short,
            self.ip,
            self.font_scale,
            self.android_release,
            self.msisdn
        )
    }
}

/// Encrypt a device profile into the fingerprint header value.
///
/// The key must be exactly 32 ASCII characters; the IV is all zeroes by
/// design so the fingerprint stays stable for a given profile and key.
pub fn encrypt_fingerprint(key: &str, profile: &DeviceProfile) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    if key.len() != FP_KEY_LEN {
        return Err(CryptoError::KeyLength {
            expected: "32 bytes",
            actual: key.len(),
        });
    }
    let iv = [0u8; 16];
    let ciphertext = encrypt_cbc(key.as_bytes(), &iv, profile.to_plain().as_bytes())?;
    Ok(STANDARD.encode(ciphertext))
}

/// Device id derived from the fingerprint string: MD5 hex digest.
pub fn device_id(fingerprint: &str) -> String {
    let digest = Md5::digest(fingerprint.as_bytes());
    hex::encode(digest)
}
