//! Per-endpoint HMAC signature engine.
//!
//! The carrier API signs most requests with HMAC-SHA512 where the *key*
//! is a composite string of the base secret plus request-specific fields,
//! and the message is a short field list. Using request data as key
//! material rather than message input is an intentional convention of the
//! remote server; both sides must build these strings byte-for-byte
//! identically. The login/OTP endpoint uses a separate HMAC-SHA256 secret
//! with a base64 digest.
//!
//! All functions are pure and deterministic. An empty secret is a hard
//! error: nothing here ever signs with a default key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use crate::error::{CryptoError, Result};

type HmacSha512 = Hmac<Sha512>;
type HmacSha256 = Hmac<Sha256>;

/// Salt mixed into the key for payment-family signatures. Appended to the
/// timestamp with no separator; the leading `#` is part of the salt.
const PAYMENT_SALT: &str = "#ae-hei_9Tee6he+Ik3Gais5=";

/// Fixed path signed by the bounty (voucher redeem) endpoint.
pub const BOUNTY_PATH: &str = "api/v8/personalization/bounties-exchange";

fn hmac_sha512_hex(key: &str, msg: &str) -> Result<String> {
    let mut mac = HmacSha512::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Hmac)?;
    mac.update(msg.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// General-purpose request signature (HMAC-SHA512, hex).
pub fn general(
    secret: &str,
    id_token: &str,
    method: &str,
    path: &str,
    time_sec: i64,
) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key = format!("{secret};{id_token};{method};{path};{time_sec}");
    let msg = format!("{id_token};{time_sec};");
    hmac_sha512_hex(&key, &msg)
}

/// Payment settlement signature (balance, e-wallet, QRIS).
#[allow(clippy::too_many_arguments)]
pub fn payment(
    secret: &str,
    access_token: &str,
    payment_token: &str,
    time_sec: i64,
    payment_for: &str,
    payment_method: &str,
    package_code: &str,
    path: &str,
) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key = format!("{secret};{time_sec}{PAYMENT_SALT};POST;{path};{time_sec}");
    let msg = format!(
        "{access_token};{payment_token};{time_sec};{payment_for};{payment_method};{package_code};"
    );
    hmac_sha512_hex(&key, &msg)
}

/// Voucher redeem signature. The path is fixed by the server, and the
/// access token joins the key as well as the message.
pub fn bounty(
    secret: &str,
    access_token: &str,
    payment_token: &str,
    time_sec: i64,
    package_code: &str,
) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key = format!(
        "{secret};{access_token};{time_sec}{PAYMENT_SALT};POST;{BOUNTY_PATH};{time_sec}"
    );
    let msg = format!("{access_token};{payment_token};{time_sec};{package_code};");
    hmac_sha512_hex(&key, &msg)
}

/// Loyalty-points redeem signature.
pub fn loyalty(
    secret: &str,
    token_confirmation: &str,
    time_sec: i64,
    package_code: &str,
    path: &str,
) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key = format!("{secret};{time_sec}{PAYMENT_SALT};POST;{path};{time_sec}");
    let msg = format!("{token_confirmation};{time_sec};{package_code};");
    hmac_sha512_hex(&key, &msg)
}

/// Gift (bounty allotment) signature. The destination number joins the key.
pub fn bounty_allotment(
    secret: &str,
    token_confirmation: &str,
    time_sec: i64,
    destination: &str,
    package_code: &str,
    path: &str,
) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key =
        format!("{secret};{time_sec}{PAYMENT_SALT};{destination};POST;{path};{time_sec}");
    let msg = format!("{token_confirmation};{time_sec};{destination};{package_code};");
    hmac_sha512_hex(&key, &msg)
}

/// Basic signature for the few endpoints that sign without a token.
pub fn basic(secret: &str, method: &str, path: &str, time_sec: i64) -> Result<String> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let key = format!("{secret};{method};{path};{time_sec}");
    let msg = format!("{time_sec};en;");
    hmac_sha512_hex(&key, &msg)
}

/// Login/OTP signature (HMAC-SHA256, base64).
///
/// The preimage interleaves the fixed literals `password` and `openid`
/// between the variable fields, exactly as the server expects.
pub fn otp(
    otp_secret: &str,
    ts_for_sign: &str,
    contact: &str,
    code: &str,
    contact_type: &str,
) -> Result<String> {
    if otp_secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let preimage = format!("{ts_for_sign}password{contact_type}{contact}{code}openid");
    let mut mac =
        HmacSha256::new_from_slice(otp_secret.as_bytes()).map_err(|_| CryptoError::Hmac)?;
    mac.update(preimage.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "base-secret";

    #[test]
    fn general_is_deterministic() {
        let a = general(SECRET, "idtok", "POST", "api/v8/profile", 1_700_000_000).unwrap();
        let b = general(SECRET, "idtok", "POST", "api/v8/profile", 1_700_000_000).unwrap();
        assert_eq!(a, b);
        // HMAC-SHA512 hex digest is 128 chars
        assert_eq!(a.len(), 128);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn every_field_perturbs_general_signature() {
        let base = general(SECRET, "idtok", "POST", "p", 100).unwrap();
        assert_ne!(base, general(SECRET, "idtok2", "POST", "p", 100).unwrap());
        assert_ne!(base, general(SECRET, "idtok", "GET", "p", 100).unwrap());
        assert_ne!(base, general(SECRET, "idtok", "POST", "q", 100).unwrap());
        assert_ne!(base, general(SECRET, "idtok", "POST", "p", 101).unwrap());
        assert_ne!(base, general("other", "idtok", "POST", "p", 100).unwrap());
    }

    #[test]
    fn payment_signature_changes_with_package() {
        let a = payment(SECRET, "at", "pt", 1, "BUY_PACKAGE", "BALANCE", "PKG1", "p").unwrap();
        let b = payment(SECRET, "at", "pt", 1, "BUY_PACKAGE", "BALANCE", "PKG2", "p").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bounty_and_loyalty_diverge_on_key_shape() {
        // Bounty mixes the access token into the key; loyalty does not.
        let bounty_sig = bounty(SECRET, "at", "pt", 1, "PKG").unwrap();
        let loyalty_sig = loyalty(SECRET, "pt", 1, "PKG", BOUNTY_PATH).unwrap();
        assert_ne!(bounty_sig, loyalty_sig);
    }

    #[test]
    fn allotment_binds_destination() {
        let a = bounty_allotment(SECRET, "tc", 1, "62811", "PKG", "p").unwrap();
        let b = bounty_allotment(SECRET, "tc", 1, "62812", "PKG", "p").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn otp_signature_is_base64_sha256() {
        let sig = otp("otp-secret", "2024-01-01T00:00:00.000+0700", "628111", "123456", "SMS")
            .unwrap();
        let raw = STANDARD.decode(&sig).unwrap();
        assert_eq!(raw.len(), 32);
        // deterministic
        let again =
            otp("otp-secret", "2024-01-01T00:00:00.000+0700", "628111", "123456", "SMS").unwrap();
        assert_eq!(sig, again);
    }

    #[test]
    fn empty_secret_fails_closed_everywhere() {
        assert_eq!(
            general("", "i", "POST", "p", 1).unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            payment("", "a", "p", 1, "f", "m", "c", "p").unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            bounty("", "a", "p", 1, "c").unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            loyalty("", "t", 1, "c", "p").unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            bounty_allotment("", "t", 1, "d", "c", "p").unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            basic("", "GET", "p", 1).unwrap_err(),
            CryptoError::MissingSecret
        );
        assert_eq!(
            otp("", "t", "c", "o", "SMS").unwrap_err(),
            CryptoError::MissingSecret
        );
    }
}
