//! Authenticated request pipeline.
//!
//! Every business call goes through [`ApiClient::send`]:
//! 1. serialize the payload to compact JSON
//! 2. encrypt it keyed on the current wall clock (milliseconds)
//! 3. sign with the general HMAC over the derived time in seconds
//! 4. assemble headers (fresh request id, device/app identity, bearer)
//! 5. POST/GET with retry on 5xx (3 attempts, backoff from 0.5s)
//! 6. decrypt the response by its own `xtime`, falling back to the raw
//!    JSON when the server answered in plaintext
//!
//! 4xx responses are never retried; the decrypted body is handed back so
//! callers can branch on the API's own `status`/`code` fields.

use std::sync::Arc;
use std::time::Duration;

use ax_core::{cipher, signature, timefmt};
use chrono::Utc;
use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    BalanceData, BalanceInfo, BalanceRequest, Envelope, FamiliesByCategoryRequest,
    FamilyOptionsRequest, NotificationsRequest, PackageDetail, PackageDetailRequest, Profile,
    ProfileData, ProfileRequest, QuotaDetailsRequest, UnsubscribeRequest,
};

/// Maximum delivery attempts for one logical call.
pub const MAX_ATTEMPTS: u32 = 3;

/// First backoff delay; doubles per attempt.
pub const BACKOFF_BASE_MS: u64 = 500;

/// Migration types probed when locating a package family.
const MIGRATION_TYPES: [&str; 4] = ["NONE", "PRE_TO_PRIOH", "PRIOH_TO_PRIO", "PRIO_TO_PRIOH"];

/// Client for the signed-and-encrypted business API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<Config>,
}

impl ApiClient {
    pub fn new(config: Arc<Config>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Send one authenticated call and return the decrypted response.
    pub async fn send<P: Serialize>(
        &self,
        path: &str,
        payload: &P,
        id_token: &str,
        method: Method,
    ) -> Result<Value, ApiError> {
        if self.config.api_key.is_empty() {
            return Err(ApiError::MissingApiKey);
        }

        let plain = serde_json::to_string(payload)
            .map_err(|e| ApiError::Unexpected(format!("payload serialization: {e}")))?;
        let xtime = Utc::now().timestamp_millis();
        let xdata = cipher::encrypt_xdata(&self.config.xdata_key, &plain, xtime)?;

        let sig_time = xtime / 1000;
        let sig = signature::general(
            &self.config.api_base_secret,
            id_token,
            method.as_str(),
            path,
            sig_time,
        )?;

        let url = format!("{}/{path}", self.config.base_api_url);
        let body = json!({ "xdata": xdata, "xtime": xtime });
        let now = timefmt::gmt7_now();

        let request = match method {
            Method::GET => self.http.get(&url),
            _ => self.http.post(&url).json(&body),
        }
        .header("host", self.config.api_host())
        .header("content-type", "application/json; charset=utf-8")
        .header("user-agent", &self.config.user_agent)
        .header("x-api-key", &self.config.api_key)
        .header("authorization", format!("Bearer {id_token}"))
        .header("x-hv", "v3")
        .header("x-signature-time", sig_time.to_string())
        .header("x-signature", sig)
        .header("x-request-id", Uuid::new_v4().to_string())
        .header("x-request-at", timefmt::java_like_timestamp(&now))
        .header("x-version-app", &self.config.app_version);

        let response = send_with_retry(request).await?;
        let status = response.status();
        let text = response.text().await.map_err(ApiError::from)?;

        let parsed: Value = serde_json::from_str(&text).map_err(|_| {
            warn!(path, status = status.as_u16(), "non-JSON response body");
            ApiError::InvalidJson {
                snippet: text.chars().take(100).collect(),
            }
        })?;

        Ok(self.decrypt_response(path, parsed))
    }

    /// Decrypt `{xdata, xtime}` responses; plaintext bodies pass through.
    fn decrypt_response(&self, path: &str, raw: Value) -> Value {
        let Some(xdata) = raw.get("xdata").and_then(Value::as_str) else {
            return raw;
        };
        let Some(xtime) = raw.get("xtime").and_then(Value::as_i64) else {
            return raw;
        };
        match cipher::decrypt_xdata(&self.config.xdata_key, xdata, xtime)
            .map_err(ApiError::from)
            .and_then(|plain| {
                serde_json::from_str(&plain).map_err(|e| ApiError::Unexpected(e.to_string()))
            }) {
            Ok(decrypted) => decrypted,
            Err(err) => {
                warn!(path, %err, "response decryption failed, returning raw body");
                raw
            }
        }
    }

    // === Typed endpoint wrappers ===

    /// Fetch the subscriber profile.
    pub async fn get_profile(
        &self,
        access_token: &str,
        id_token: &str,
    ) -> Result<Profile, ApiError> {
        let req = ProfileRequest {
            access_token: access_token.to_string(),
            app_version: self.config.app_version.clone(),
            is_enterprise: false,
            lang: "en",
        };
        let res = self.send("api/v8/profile", &req, id_token, Method::POST).await?;
        let envelope: Envelope<ProfileData> = parse_envelope(res)?;
        envelope
            .data
            .map(|d| d.profile)
            .ok_or_else(|| ApiError::UnexpectedShape("profile data missing".to_string()))
    }

    /// Fetch the main balance.
    pub async fn get_balance(&self, id_token: &str) -> Result<BalanceInfo, ApiError> {
        let res = self
            .send(
                "api/v8/packages/balance-and-credit",
                &BalanceRequest::default(),
                id_token,
                Method::POST,
            )
            .await?;
        let envelope: Envelope<BalanceData> = parse_envelope(res)?;
        envelope
            .data
            .map(|d| d.balance)
            .ok_or_else(|| ApiError::UnexpectedShape("balance data missing".to_string()))
    }

    /// Fetch current quota details (loosely typed; the quota list shape
    /// varies per subscription).
    pub async fn get_quota_details(&self, id_token: &str) -> Result<Value, ApiError> {
        self.send(
            "api/v8/packages/quota-details",
            &QuotaDetailsRequest::default(),
            id_token,
            Method::POST,
        )
        .await
    }

    /// Fetch one package's detail page.
    pub async fn get_package_detail(
        &self,
        id_token: &str,
        option_code: &str,
        family_code: &str,
        variant_code: &str,
    ) -> Result<PackageDetail, ApiError> {
        let req = PackageDetailRequest::new(option_code, family_code, variant_code);
        let res = self
            .send("api/v8/xl-stores/options/detail", &req, id_token, Method::POST)
            .await?;
        let envelope: Envelope<PackageDetail> = parse_envelope(res)?;
        envelope
            .data
            .ok_or_else(|| ApiError::UnexpectedShape("package detail missing".to_string()))
    }

    /// Locate a package family, probing enterprise/migration combinations
    /// until the server acknowledges the code.
    pub async fn get_family(
        &self,
        id_token: &str,
        family_code: &str,
        is_enterprise: Option<bool>,
        migration_type: Option<&str>,
    ) -> Result<Option<Value>, ApiError> {
        let enterprise_opts: Vec<bool> = match is_enterprise {
            Some(v) => vec![v],
            None => vec![false, true],
        };
        let migration_opts: Vec<&str> = match migration_type {
            Some(v) => vec![v],
            None => MIGRATION_TYPES.to_vec(),
        };

        for mt in &migration_opts {
            for ent in &enterprise_opts {
                let req = FamilyOptionsRequest::new(family_code, *ent, mt);
                let res = self
                    .send("api/v8/xl-stores/options/list", &req, id_token, Method::POST)
                    .await?;
                if res.get("status").and_then(Value::as_str) == Some("SUCCESS") {
                    if let Some(data) = res.get("data") {
                        let name = data
                            .pointer("/package_family/name")
                            .and_then(Value::as_str)
                            .unwrap_or_default();
                        if !name.is_empty() {
                            debug!(family = name, enterprise = ent, migration = mt, "family found");
                            return Ok(Some(data.clone()));
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// List package families for a store category.
    pub async fn get_families_by_category(
        &self,
        id_token: &str,
        category_code: &str,
    ) -> Result<Option<Value>, ApiError> {
        let req = FamiliesByCategoryRequest::new(category_code);
        let res = self
            .send("api/v8/xl-stores/families", &req, id_token, Method::POST)
            .await?;
        if res.get("status").and_then(Value::as_str) == Some("SUCCESS") {
            Ok(res.get("data").cloned())
        } else {
            Ok(None)
        }
    }

    /// Fetch the notification inbox.
    pub async fn get_notifications(&self, id_token: &str) -> Result<Value, ApiError> {
        self.send(
            "api/v8/notification-non-grouping",
            &NotificationsRequest::default(),
            id_token,
            Method::POST,
        )
        .await
    }

    /// Unsubscribe from a recurring quota. Returns true on code `000`.
    pub async fn unsubscribe(
        &self,
        id_token: &str,
        quota_code: &str,
        domain: &str,
        subscription_type: &str,
    ) -> Result<bool, ApiError> {
        let req = UnsubscribeRequest::new(quota_code, domain, subscription_type);
        let res = self
            .send("api/v8/packages/unsubscribe", &req, id_token, Method::POST)
            .await?;
        Ok(res.get("code").and_then(Value::as_str) == Some("000"))
    }
}

fn parse_envelope<T: serde::de::DeserializeOwned>(value: Value) -> Result<Envelope<T>, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::UnexpectedShape(e.to_string()))
}

/// Execute a request with retry on 5xx and connection failures.
///
/// Timeouts and 4xx responses surface immediately: the former gets its own
/// taxonomy entry, the latter carries API-level meaning the caller must
/// inspect.
pub(crate) async fn send_with_retry(
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response, ApiError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let this_try = request
            .try_clone()
            .ok_or_else(|| ApiError::Unexpected("request body is not retryable".to_string()))?;

        match this_try.send().await {
            Ok(response) if response.status().is_server_error() => {
                let status = response.status().as_u16();
                if attempt >= MAX_ATTEMPTS {
                    return Err(ApiError::Server { status });
                }
                let delay = backoff_delay(attempt);
                warn!(status, attempt, delay_ms = delay.as_millis() as u64, "retrying on 5xx");
                tokio::time::sleep(delay).await;
            }
            Ok(response) => return Ok(response),
            Err(err) if err.is_timeout() => return Err(ApiError::Timeout),
            Err(err) if err.is_connect() => {
                if attempt >= MAX_ATTEMPTS {
                    return Err(ApiError::Network(err.to_string()));
                }
                let delay = backoff_delay(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying on connect error");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(ApiError::from(err)),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_half_second() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(2000));
    }
}
