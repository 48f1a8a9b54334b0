//! Error types for ax-core.
//!
//! Every failure is explicit: callers decide whether a failed decrypt
//! degrades to a fallback payload or aborts the request. Nothing in this
//! crate substitutes an empty string for an error.

/// Result type alias for ax-core operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors produced by the cipher, signature and fingerprint primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// Required secret material is absent or empty. Signing and encryption
    /// fail closed rather than proceed with a default key.
    #[error("secret material is missing or empty")]
    MissingSecret,

    /// Key material has an unsupported length.
    #[error("key must be {expected}, got {actual} bytes")]
    KeyLength {
        /// Human-readable accepted lengths, e.g. "16 or 32 bytes".
        expected: &'static str,
        /// Actual key length supplied.
        actual: usize,
    },

    /// An explicit IV was supplied but is not 16 ASCII hex characters.
    #[error("initialization vector must be 16 hex characters")]
    InvalidIv,

    /// Ciphertext is not valid base64.
    #[error("ciphertext is not valid base64")]
    Base64,

    /// PKCS7 unpadding failed: wrong key, wrong IV, or truncated data.
    #[error("invalid padding (wrong key or IV)")]
    Padding,

    /// Decrypted bytes are not valid UTF-8.
    #[error("plaintext is not valid utf-8")]
    Utf8,

    /// Input is too short to contain the expected structure.
    #[error("ciphertext too short")]
    TooShort,

    /// The MAC implementation rejected the key.
    #[error("hmac key rejected")]
    Hmac,
}
