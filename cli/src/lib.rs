//! # Ax CLI
//!
//! Terminal client for a mobile carrier's consumer REST API.
//!
//! ## Design principles
//!
//! - **Everything signed and encrypted**: business calls travel as
//!   `{xdata, xtime}` bodies with per-endpoint HMAC signatures
//! - **No hidden globals**: configuration, key material and file paths are
//!   injected; the session manager is an explicit constructed object
//! - **Typed boundaries**: per-endpoint request/response records instead of
//!   ad-hoc JSON maps; every failure path is a typed error
//! - **Fail closed**: absent secrets refuse to sign or encrypt
//! - **Crash-safe persistence**: token store and marker files are written
//!   via atomic replace and tolerate corruption by resetting to empty
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ SessionManager ──▶ ApiClient ──▶ carrier API
//!                │   (fresh tokens)  (sign + encrypt + retry)
//!                └──▶ CiamClient (login / OTP / refresh / recovery)
//! ```

pub mod ciam;
pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod sentry;
pub mod session;

pub use ciam::CiamClient;
pub use client::ApiClient;
pub use config::Config;
pub use error::{ApiError, SessionError};
pub use session::SessionManager;
