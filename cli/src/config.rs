//! Configuration for the ax client.
//!
//! All configuration is loaded from environment variables (a `.env` file
//! is honored via dotenvy in `main`). Secrets are kept as opaque strings;
//! the crypto layer fails closed when one is absent, so a partially
//! configured client degrades to typed errors instead of panicking.
//! No secrets are logged.

use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP socket timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// App version reported in `x-version-app`.
pub const DEFAULT_APP_VERSION: &str = "8.9.1";

/// Client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the business API.
    pub base_api_url: String,

    /// Base URL of the CIAM (login/token) API.
    pub base_ciam_url: String,

    /// `x-api-key` header value.
    pub api_key: String,

    /// `Authorization: Basic …` value for CIAM calls.
    pub basic_auth: String,

    /// User agent for every request.
    pub user_agent: String,

    /// App version for `x-version-app`.
    pub app_version: String,

    // === Key material ===
    /// AES key for xdata payloads (16 or 32 ASCII chars).
    pub xdata_key: String,

    /// AES-256 key for the device fingerprint (exactly 32 ASCII chars).
    pub fingerprint_key: String,

    /// HMAC-SHA256 secret for the OTP/login signature.
    pub otp_sig_key: String,

    /// Base secret mixed into every HMAC-SHA512 signature key.
    pub api_base_secret: String,

    /// AES key for encrypted sensitive fields (family/circle).
    pub field_key: String,

    // === Files ===
    /// Credential records (JSON array), one per account.
    pub token_file: PathBuf,

    /// Plaintext marker holding the currently active phone number.
    pub active_number_file: PathBuf,

    /// Persisted device fingerprint.
    pub fingerprint_file: PathBuf,

    // === Limits ===
    /// HTTP socket timeout.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_api_url: trimmed_env("BASE_API_URL"),
            base_ciam_url: trimmed_env("BASE_CIAM_URL"),
            api_key: trimmed_env("API_KEY"),
            basic_auth: trimmed_env("BASIC_AUTH"),
            user_agent: std::env::var("UA").unwrap_or_else(|_| "Mozilla/5.0".to_string()),
            app_version: std::env::var("APP_VERSION")
                .unwrap_or_else(|_| DEFAULT_APP_VERSION.to_string()),

            xdata_key: trimmed_env("XDATA_KEY"),
            fingerprint_key: trimmed_env("AX_FP_KEY"),
            otp_sig_key: trimmed_env("AX_API_SIG_KEY"),
            api_base_secret: trimmed_env("X_API_BASE_SECRET"),
            field_key: trimmed_env("ENCRYPTED_FIELD_KEY"),

            token_file: path_env("TOKEN_FILE", "refresh-tokens.json"),
            active_number_file: path_env("ACTIVE_NUMBER_FILE", "active.number"),
            fingerprint_file: path_env("FP_FILE", "ax.fp"),

            http_timeout: Duration::from_secs(
                std::env::var("HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }

    /// Hostname for the `host` header, stripped of scheme and path.
    pub fn api_host(&self) -> String {
        clean_host(&self.base_api_url)
    }

    /// Hostname of the CIAM base URL.
    pub fn ciam_host(&self) -> String {
        clean_host(&self.base_ciam_url)
    }
}

fn trimmed_env(name: &str) -> String {
    std::env::var(name).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn path_env(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn clean_host(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped
        .split('/')
        .next()
        .unwrap_or(stripped)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_host_strips_scheme_and_path() {
        assert_eq!(clean_host("https://api.example.id/v2"), "api.example.id");
        assert_eq!(clean_host("http://api.example.id"), "api.example.id");
        assert_eq!(clean_host("api.example.id:8443/x"), "api.example.id:8443");
    }
}
