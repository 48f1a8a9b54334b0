//! Sensitive-field cipher for family/circle endpoints.
//!
//! Unlike the payload cipher, these values carry their IV with them: the
//! IV is 8 random bytes rendered as 16 hex characters, used as raw IV
//! bytes, and appended in the clear after the base64 ciphertext so the
//! receiver can split them apart again.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use rand::RngCore;

use crate::cipher::{decrypt_cbc, encrypt_cbc, pad_base64};
use crate::error::{CryptoError, Result};

/// Length of the plaintext IV suffix in characters.
const IV_SUFFIX_LEN: usize = 16;

/// Encrypt a subscriber phone number with a fresh random IV.
///
/// Returns `base64url(ciphertext) + iv_hex` where `iv_hex` is 16 hex
/// characters.
pub fn encrypt_msisdn(key: &str, msisdn: &str) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let mut raw = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut raw);
    let iv_hex = hex::encode(raw);

    let mut iv = [0u8; 16];
    iv.copy_from_slice(iv_hex.as_bytes());

    let ciphertext = encrypt_cbc(key.as_bytes(), &iv, msisdn.as_bytes())?;
    Ok(format!("{}{iv_hex}", URL_SAFE.encode(ciphertext)))
}

/// Decrypt a value produced by [`encrypt_msisdn`].
///
/// The IV is the last 16 characters of the input.
pub fn decrypt_msisdn(key: &str, value: &str) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    if value.len() <= IV_SUFFIX_LEN {
        return Err(CryptoError::TooShort);
    }
    if !value.is_ascii() {
        return Err(CryptoError::InvalidIv);
    }
    let (b64_part, iv_hex) = value.split_at(value.len() - IV_SUFFIX_LEN);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(iv_hex.as_bytes());

    let ciphertext = URL_SAFE
        .decode(pad_base64(b64_part))
        .map_err(|_| CryptoError::Base64)?;
    let plaintext = decrypt_cbc(key.as_bytes(), &iv, &ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

/// Encrypt a single empty PKCS7 block, IV appended as a hex suffix.
///
/// Some endpoints expect this placeholder field. When `iv_hex16` is `None`
/// a random IV is generated; an explicit IV must be exactly 16 hex chars.
pub fn build_encrypted_field(key: &str, iv_hex16: Option<&str>, urlsafe: bool) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let iv_hex = match iv_hex16 {
        Some(given) => {
            if given.len() != IV_SUFFIX_LEN || !given.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(CryptoError::InvalidIv);
            }
            given.to_string()
        }
        None => {
            let mut raw = [0u8; 8];
            rand::thread_rng().fill_bytes(&mut raw);
            hex::encode(raw)
        }
    };
    let mut iv = [0u8; 16];
    iv.copy_from_slice(iv_hex.as_bytes());

    let ciphertext = encrypt_cbc(key.as_bytes(), &iv, b"")?;
    let encoded = if urlsafe {
        URL_SAFE.encode(ciphertext)
    } else {
        STANDARD.encode(ciphertext)
    };
    Ok(format!("{encoded}{iv_hex}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "fedcba9876543210fedcba9876543210";

    #[test]
    fn msisdn_round_trip() {
        let enc = encrypt_msisdn(KEY, "6281234567890").unwrap();
        assert_eq!(decrypt_msisdn(KEY, &enc).unwrap(), "6281234567890");
    }

    #[test]
    fn iv_suffix_is_hex_and_random_per_call() {
        let a = encrypt_msisdn(KEY, "628111").unwrap();
        let b = encrypt_msisdn(KEY, "628111").unwrap();
        assert_ne!(a, b);
        assert!(a[a.len() - 16..].bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn decrypt_rejects_short_input() {
        assert_eq!(
            decrypt_msisdn(KEY, "tooshort").unwrap_err(),
            CryptoError::TooShort
        );
    }

    #[test]
    fn missing_key_fails_closed() {
        assert_eq!(
            encrypt_msisdn("", "628111").unwrap_err(),
            CryptoError::MissingSecret
        );
    }

    #[test]
    fn encrypted_field_honors_explicit_iv() {
        let a = build_encrypted_field(KEY, Some("00112233445566aa"), false).unwrap();
        let b = build_encrypted_field(KEY, Some("00112233445566aa"), false).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with("00112233445566aa"));
    }

    #[test]
    fn encrypted_field_rejects_bad_iv() {
        let err = build_encrypted_field(KEY, Some("not-hex!"), false).unwrap_err();
        assert_eq!(err, CryptoError::InvalidIv);
    }
}
