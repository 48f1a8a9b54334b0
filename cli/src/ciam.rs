//! CIAM (login and token) client.
//!
//! The identity service speaks plain form/JSON rather than the encrypted
//! envelope, but carries its own header protocol: a basic-auth identity,
//! the persisted device fingerprint, and a per-request signature for OTP
//! submission. Two wire quirks the server enforces are reproduced here:
//!
//! - the OTP form body is assembled as a literal string so `=` inside a
//!   base64 contact is never percent-encoded
//! - OTP submission signs with the current time but sends `Ax-Request-At`
//!   backdated by five minutes

use std::sync::Arc;

use ax_core::{signature, timefmt};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::Duration as ChronoDuration;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::send_with_retry;
use crate::config::Config;
use crate::error::{ApiError, SessionError};
use crate::identity::DeviceIdentity;
use crate::models::TokenBundle;

const OTP_ENDPOINT: &str = "/realms/xl-ciam/auth/otp";
const EXTEND_SESSION_ENDPOINT: &str = "/realms/xl-ciam/auth/extend-session";
const TOKEN_ENDPOINT: &str = "/realms/xl-ciam/protocol/openid-connect/token";
const AUTH_CODE_ENDPOINT: &str = "/ciam/auth/authorization-token/generate";

/// How a login contact is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactType {
    /// OTP over SMS to a phone number.
    Sms,
    /// Device-bound exchange code keyed on the subscriber id.
    DeviceId,
}

impl ContactType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactType::Sms => "SMS",
            ContactType::DeviceId => "DEVICEID",
        }
    }
}

/// Client for the identity service.
#[derive(Debug, Clone)]
pub struct CiamClient {
    http: reqwest::Client,
    config: Arc<Config>,
    identity: DeviceIdentity,
}

impl CiamClient {
    pub fn new(config: Arc<Config>, identity: DeviceIdentity) -> Result<Self, ApiError> {
        if config.basic_auth.is_empty() {
            warn!("BASIC_AUTH is not configured; identity calls will be rejected");
        }
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        Ok(Self { http, config, identity })
    }

    /// Contacts must be `628…` numbers of 10-14 digits.
    pub fn validate_contact(contact: &str) -> Result<(), SessionError> {
        if contact.starts_with("628") && (10..=14).contains(&contact.len()) {
            Ok(())
        } else {
            Err(SessionError::InvalidContact(contact.to_string()))
        }
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let mut put = |name: &'static str, value: String| -> Result<(), ApiError> {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_str(&value)
                    .map_err(|_| ApiError::Unexpected(format!("invalid header value for {name}")))?,
            );
            Ok(())
        };
        put("accept-encoding", "gzip, deflate, br".to_string())?;
        put("authorization", format!("Basic {}", self.config.basic_auth))?;
        put("ax-device-id", self.identity.device_id.clone())?;
        put("ax-fingerprint", self.identity.fingerprint.clone())?;
        put("ax-request-device", "samsung".to_string())?;
        put("ax-request-device-model", "SM-N935F".to_string())?;
        put("ax-substype", "PREPAID".to_string())?;
        put("user-agent", self.config.user_agent.clone())?;
        put("ax-request-at", timefmt::java_like_timestamp(&timefmt::gmt7_now()))?;
        put("ax-request-id", Uuid::new_v4().to_string())?;
        put("host", self.config.ciam_host())?;
        Ok(headers)
    }

    async fn parse_json(response: reqwest::Response) -> Result<(u16, Value), ApiError> {
        let status = response.status().as_u16();
        let text = response.text().await.map_err(ApiError::from)?;
        let json = serde_json::from_str(&text).map_err(|_| ApiError::InvalidJson {
            snippet: text.chars().take(100).collect(),
        })?;
        Ok((status, json))
    }

    /// Request an SMS OTP; returns the subscriber id acknowledged by the
    /// server.
    pub async fn request_otp(&self, contact: &str) -> Result<String, SessionError> {
        Self::validate_contact(contact)?;

        let mut headers = self.headers()?;
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let url = format!("{}{OTP_ENDPOINT}", self.config.base_ciam_url);
        let request = self
            .http
            .get(&url)
            .headers(headers)
            .query(&[
                ("contact", contact),
                ("contactType", ContactType::Sms.as_str()),
                ("alternateContact", "false"),
            ]);

        let response = send_with_retry(request).await?;
        let (_, body) = Self::parse_json(response).await?;
        match body.get("subscriber_id").and_then(Value::as_str) {
            Some(id) => {
                info!(contact, "OTP requested");
                Ok(id.to_string())
            }
            None => Err(SessionError::LoginFailed(format!(
                "OTP request rejected: {body}"
            ))),
        }
    }

    /// Exchange a device-bound session for a fresh one-shot code.
    pub async fn extend_session(&self, subscriber_id: &str) -> Result<String, SessionError> {
        if subscriber_id.is_empty() {
            return Err(SessionError::LoginFailed(
                "subscriber id is required for session extension".to_string(),
            ));
        }
        let b64_id = B64.encode(subscriber_id.as_bytes());

        let mut headers = self.headers()?;
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let url = format!("{}{EXTEND_SESSION_ENDPOINT}", self.config.base_ciam_url);
        let request = self.http.get(&url).headers(headers).query(&[
            ("contact", b64_id.as_str()),
            ("contactType", ContactType::DeviceId.as_str()),
        ]);

        let response = send_with_retry(request).await?;
        let (status, body) = Self::parse_json(response).await?;
        if status == 200 {
            if let Some(code) = body.pointer("/data/exchange_code").and_then(Value::as_str) {
                return Ok(code.to_string());
            }
        }
        warn!(status, "session extension rejected");
        Err(SessionError::LoginFailed(format!(
            "session extension failed: {body}"
        )))
    }

    /// Submit an OTP (or device exchange code) and obtain a token bundle.
    pub async fn submit_otp(
        &self,
        contact_type: ContactType,
        contact: &str,
        code: &str,
    ) -> Result<TokenBundle, SessionError> {
        if contact_type == ContactType::Sms {
            Self::validate_contact(contact)?;
        }
        let final_contact = match contact_type {
            ContactType::DeviceId => B64.encode(contact.as_bytes()),
            ContactType::Sms => contact.to_string(),
        };

        let now = timefmt::gmt7_now();
        // The server validates the signature against the current clock but
        // expects the request timestamp five minutes in the past.
        let ts_sign = timefmt::ts_gmt7_no_colon(&now);
        let ts_head = timefmt::ts_gmt7_no_colon(&(now - ChronoDuration::minutes(5)));

        let sig = signature::otp(
            &self.config.otp_sig_key,
            &ts_sign,
            &final_contact,
            code,
            contact_type.as_str(),
        )?;

        // Built by hand: percent-encoding the base64 contact breaks the
        // server-side signature check.
        let body = format!(
            "contactType={ct}&code={code}&grant_type=password&contact={fc}&scope=openid",
            ct = contact_type.as_str(),
            fc = final_contact,
        );

        let mut headers = self.headers()?;
        headers.insert(
            "ax-api-signature",
            HeaderValue::from_str(&sig)
                .map_err(|_| ApiError::Unexpected("invalid signature header".to_string()))?,
        );
        headers.insert(
            "ax-request-at",
            HeaderValue::from_str(&ts_head)
                .map_err(|_| ApiError::Unexpected("invalid timestamp header".to_string()))?,
        );
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );

        let url = format!("{}{TOKEN_ENDPOINT}", self.config.base_ciam_url);
        let request = self.http.post(&url).headers(headers).body(body);

        info!(contact_type = contact_type.as_str(), "submitting OTP");
        let response = send_with_retry(request).await?;
        let (_, body) = Self::parse_json(response).await?;
        if body.get("error").is_some() {
            error!("login rejected");
            return Err(SessionError::LoginFailed(body.to_string()));
        }
        serde_json::from_value(body)
            .map_err(|e| SessionError::LoginFailed(format!("malformed token bundle: {e}")))
    }

    /// Refresh a token bundle, recovering from an expired session via the
    /// extend-session handshake when possible.
    ///
    /// Returns [`SessionError::MustRelogin`] once the refresh token is
    /// conclusively dead.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        subscriber_id: &str,
    ) -> Result<TokenBundle, SessionError> {
        let mut headers = self.headers()?;
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let url = format!("{}{TOKEN_ENDPOINT}", self.config.base_ciam_url);
        let request = self.http.post(&url).headers(headers).form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        let response = send_with_retry(request).await?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(ApiError::from)?;

        if status == 200 {
            return serde_json::from_str(&text)
                .map_err(|e| SessionError::RefreshFailed(format!("malformed token bundle: {e}")));
        }

        if status == 400 {
            let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
            if body.get("error_description").and_then(Value::as_str) == Some("Session not active") {
                warn!("session expired, attempting device-bound extension");
                // Any failure past this point means the session cannot be
                // recovered without a fresh OTP login.
                if subscriber_id.is_empty() {
                    error!("subscriber id is missing for session extension");
                    return Err(SessionError::MustRelogin);
                }
                let exchange_code = match self.extend_session(subscriber_id).await {
                    Ok(code) => code,
                    Err(e) => {
                        error!(error = %e, "session extension failed");
                        return Err(SessionError::MustRelogin);
                    }
                };
                return match self
                    .submit_otp(ContactType::DeviceId, subscriber_id, &exchange_code)
                    .await
                {
                    Ok(bundle) => Ok(bundle),
                    Err(e) => {
                        if text.contains("Invalid refresh token") {
                            error!("refresh token is invalid or expired");
                        } else {
                            error!(error = %e, "exchange-code submission failed");
                        }
                        Err(SessionError::MustRelogin)
                    }
                };
            }
            error!("token refresh rejected");
            return Err(SessionError::RefreshFailed(text));
        }

        Err(SessionError::RefreshFailed(format!(
            "unexpected status {status}: {text}"
        )))
    }

    /// Generate a one-shot authorization code for balance sharing.
    pub async fn get_auth_code(
        &self,
        access_token: &str,
        pin: &str,
        receiver_msisdn: &str,
    ) -> Result<String, SessionError> {
        let pin_b64 = B64.encode(pin.as_bytes());

        let mut headers = self.headers()?;
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|_| ApiError::Unexpected("invalid bearer header".to_string()))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let url = format!("{}{AUTH_CODE_ENDPOINT}", self.config.base_ciam_url);
        let request = self.http.post(&url).headers(headers).json(&json!({
            "pin": pin_b64,
            "transaction_type": "SHARE_BALANCE",
            "receiver_msisdn": receiver_msisdn,
        }));

        let response = send_with_retry(request).await?;
        let (_, body) = Self::parse_json(response).await?;
        if body.get("status").and_then(Value::as_str) == Some("Success") {
            if let Some(code) = body.pointer("/data/authorization_code").and_then(Value::as_str) {
                return Ok(code.to_string());
            }
        }
        Err(SessionError::LoginFailed(format!(
            "authorization code rejected: {body}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_validation_requires_628_prefix_and_length() {
        assert!(CiamClient::validate_contact("6281234567890").is_ok());
        assert!(CiamClient::validate_contact("6281234567").is_ok());
        assert!(CiamClient::validate_contact("0812345678").is_err());
        assert!(CiamClient::validate_contact("628123").is_err());
        assert!(CiamClient::validate_contact("62812345678901234").is_err());
        assert!(CiamClient::validate_contact("").is_err());
    }

    #[test]
    fn contact_type_wire_names() {
        assert_eq!(ContactType::Sms.as_str(), "SMS");
        assert_eq!(ContactType::DeviceId.as_str(), "DEVICEID");
    }
}
