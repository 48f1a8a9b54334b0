//! XDATA payload cipher.
//!
//! Request and response bodies travel as `{xdata, xtime}` where `xdata` is
//! AES-CBC/PKCS7 ciphertext, base64-url encoded, and `xtime` is the
//! encryption wall clock in milliseconds. The IV is derived from `xtime`:
//! the first 16 ASCII hex characters of `SHA-256(decimal(xtime))`, used as
//! raw IV bytes. The hex characters themselves are the IV; they are never
//! hex-decoded. The remote server does the same, so both sides must agree
//! on `xtime` exactly.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Derive the 16-byte IV for a given `xtime` in milliseconds.
///
/// Pure function of the timestamp: equal inputs always produce the same IV.
pub fn derive_iv(time_ms: i64) -> [u8; 16] {
    let digest = Sha256::digest(time_ms.to_string().as_bytes());
    let hex_chars = hex::encode(digest);
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&hex_chars.as_bytes()[..16]);
    iv
}

/// Encrypt a plaintext body for the given `xtime`.
///
/// The key length selects the AES variant: 16 bytes for AES-128, 32 for
/// AES-256. Output is base64-url with padding retained.
pub fn encrypt_xdata(key: &str, plaintext: &str, time_ms: i64) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let iv = derive_iv(time_ms);
    let ciphertext = encrypt_cbc(key.as_bytes(), &iv, plaintext.as_bytes())?;
    Ok(URL_SAFE.encode(ciphertext))
}

/// Decrypt an `xdata` string using the `xtime` it was encrypted with.
///
/// Input is re-padded with `=` to a multiple of 4 before decoding, since
/// some payloads arrive with padding stripped. A wrong `xtime` produces a
/// wrong IV and surfaces as [`CryptoError::Padding`].
pub fn decrypt_xdata(key: &str, xdata: &str, time_ms: i64) -> Result<String> {
    if key.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    if xdata.is_empty() {
        return Err(CryptoError::TooShort);
    }
    let iv = derive_iv(time_ms);
    let ciphertext = URL_SAFE
        .decode(pad_base64(xdata))
        .map_err(|_| CryptoError::Base64)?;
    let plaintext = decrypt_cbc(key.as_bytes(), &iv, &ciphertext)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
}

/// Re-pad a base64 string to a multiple of 4 characters.
pub(crate) fn pad_base64(input: &str) -> String {
    let remainder = input.len() % 4;
    if remainder == 0 {
        input.to_string()
    } else {
        let mut padded = String::with_capacity(input.len() + 4 - remainder);
        padded.push_str(input);
        for _ in 0..(4 - remainder) {
            padded.push('=');
        }
        padded
    }
}

pub(crate) fn encrypt_cbc(key: &[u8], iv: &[u8; 16], plaintext: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => Ok(Aes128CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidIv)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        32 => Ok(Aes256CbcEnc::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidIv)?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        actual => Err(CryptoError::KeyLength {
            expected: "16 or 32 bytes",
            actual,
        }),
    }
}

pub(crate) fn decrypt_cbc(key: &[u8], iv: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>> {
    match key.len() {
        16 => Aes128CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidIv)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Padding),
        32 => Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| CryptoError::InvalidIv)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Padding),
        actual => Err(CryptoError::KeyLength {
            expected: "16 or 32 bytes",
            actual,
        }),
    }
}
