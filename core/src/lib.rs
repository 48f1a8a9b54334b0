//! Ax Core - cryptographic primitives for the ax terminal client.
//!
//! This library provides everything the request pipeline needs to talk to
//! the carrier API:
//! - XDATA payload encryption/decryption (AES-CBC with a timestamp-derived IV)
//! - Sensitive-field encryption (random IV appended as a hex suffix)
//! - Per-endpoint HMAC signatures (general, payment, bounty, loyalty, OTP)
//! - Device fingerprint synthesis and the derived device id
//! - The API's timestamp formats
//!
//! # Constraints
//!
//! This library intentionally does NOT:
//! - Access the network
//! - Perform file I/O (the client owns fingerprint persistence)
//! - Read environment variables (key material is injected by the caller)
//! - Log sensitive data
//!
//! # Interoperability
//!
//! Several constructions here are deliberately non-standard because the
//! remote server expects them byte-for-byte: the IV is the first 16 ASCII
//! hex characters of a SHA-256 digest (not the decoded bytes), and most
//! HMAC keys are composite strings built from request fields. Do not
//! "fix" them.

pub mod cipher;
pub mod error;
pub mod field;
pub mod fingerprint;
pub mod signature;
pub mod timefmt;

pub use cipher::{decrypt_xdata, derive_iv, encrypt_xdata};
pub use error::{CryptoError, Result};
pub use field::{build_encrypted_field, decrypt_msisdn, encrypt_msisdn};
pub use fingerprint::{device_id, encrypt_fingerprint, DeviceProfile};
