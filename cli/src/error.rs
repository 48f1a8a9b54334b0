//! Error taxonomy for the request pipeline and session store.
//!
//! No error in this crate terminates the process: every failure path
//! returns a typed value the caller can branch on. The one deliberately
//! loud case is [`SessionError::MustRelogin`], raised when session
//! recovery has been exhausted and only a fresh OTP login can help.

/// Errors surfaced by the authenticated request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `API_KEY` is not configured; nothing can be sent.
    #[error("API key is not configured")]
    MissingApiKey,

    /// Payload encryption or signing failed before the request went out.
    #[error("encryption failed: {0}")]
    Encryption(#[from] ax_core::CryptoError),

    /// The HTTP call exceeded the socket timeout.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure (DNS, connection reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The server kept returning 5xx through every retry attempt.
    #[error("server error after retries (status {status})")]
    Server {
        /// Final HTTP status observed.
        status: u16,
    },

    /// The response body was not JSON (e.g. an HTML gateway error page).
    #[error("invalid JSON response: {snippet}")]
    InvalidJson {
        /// First bytes of the offending body, for logs.
        snippet: String,
    },

    /// The response parsed but is missing the fields the caller needs.
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Anything else; carried as text so the UI can render it.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Errors surfaced by the CIAM client and session/token store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The requested account is not in the token store.
    #[error("account {0} is not registered")]
    AccountNotFound(String),

    /// The supplied contact is not a valid `628…` number.
    #[error("invalid contact number: {0}")]
    InvalidContact(String),

    /// OTP request or submission was rejected by the server.
    #[error("login failed: {0}")]
    LoginFailed(String),

    /// Token refresh failed for a reason other than an expired session.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The session can no longer be extended; only a fresh login helps.
    #[error("session expired beyond recovery; a new login is required")]
    MustRelogin,

    /// Token store or marker file I/O failed.
    #[error("token store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic material problem (fingerprint key, OTP secret).
    #[error(transparent)]
    Crypto(#[from] ax_core::CryptoError),

    /// Transport or pipeline failure underneath a session operation.
    #[error(transparent)]
    Api(#[from] ApiError),
}
