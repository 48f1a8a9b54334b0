//! Multi-account session manager.
//!
//! Credential records live in a JSON token file (one record per phone
//! number); the active account is marked by a plaintext number file so it
//! survives restarts. Tokens for the active account are refreshed eagerly
//! on switch and lazily whenever the in-memory bundle is older than
//! [`FRESHNESS_THRESHOLD_SECS`].
//!
//! Persistence is crash-safe: the token file is replaced atomically via a
//! temp file, and a corrupt or missing file resets to an empty store
//! instead of failing startup.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::ciam::CiamClient;
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::SessionError;
use crate::models::{ActiveSession, CredentialRecord, TokenBundle};

/// Refresh the active token bundle once it is older than this.
pub const FRESHNESS_THRESHOLD_SECS: i64 = 240;

/// Owns the credential records and the active session.
pub struct SessionManager {
    config: Arc<Config>,
    ciam: CiamClient,
    api: ApiClient,
    records: Vec<CredentialRecord>,
    active: Option<ActiveSession>,
    last_refresh: i64,
}

impl SessionManager {
    pub fn new(config: Arc<Config>, ciam: CiamClient, api: ApiClient) -> Self {
        let records = load_records(&config.token_file);
        Self {
            config,
            ciam,
            api,
            records,
            active: None,
            last_refresh: 0,
        }
    }

    /// Registered accounts, in file order.
    pub fn accounts(&self) -> &[CredentialRecord] {
        &self.records
    }

    /// Number of the currently active account, if any.
    pub fn active_number(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.number.as_str())
    }

    /// Register (or re-register) an account from a refresh token.
    ///
    /// The token is validated by an immediate refresh, the profile is
    /// fetched to fill in subscriber metadata, and the rotated refresh
    /// token is what gets stored. The new account becomes active.
    pub async fn add_account(
        &mut self,
        number: &str,
        refresh_token: &str,
    ) -> Result<(), SessionError> {
        CiamClient::validate_contact(number)?;
        if refresh_token.is_empty() {
            return Err(SessionError::RefreshFailed("empty refresh token".to_string()));
        }

        // No subscriber id yet: recovery is impossible for a first contact,
        // so a dead token fails here rather than later.
        let bundle = self.ciam.refresh_token(refresh_token, "").await?;
        let profile = self
            .api
            .get_profile(&bundle.access_token, &bundle.id_token)
            .await?;

        let record = CredentialRecord {
            number: number.to_string(),
            subscriber_id: profile.subscriber_id,
            subscription_type: if profile.subscription_type.is_empty() {
                "PREPAID".to_string()
            } else {
                profile.subscription_type
            },
            refresh_token: bundle.refresh_token.clone(),
        };

        match self.records.iter_mut().find(|r| r.number == number) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        self.persist()?;
        info!(number, "account registered");

        self.set_active(number).await
    }

    /// Remove an account. When the removed account was active, the first
    /// remaining record is marked for lazy activation.
    pub fn remove_account(&mut self, number: &str) -> Result<(), SessionError> {
        let before = self.records.len();
        self.records.retain(|r| r.number != number);
        if self.records.len() == before {
            return Err(SessionError::AccountNotFound(number.to_string()));
        }
        self.persist()?;

        if self.active_number() == Some(number) {
            self.active = None;
            self.last_refresh = 0;
            match self.records.first() {
                Some(first) => self.write_marker(&first.number.clone())?,
                None => self.clear_marker()?,
            }
        }
        info!(number, "account removed");
        Ok(())
    }

    /// Switch the active account, refreshing its tokens immediately.
    pub async fn set_active(&mut self, number: &str) -> Result<(), SessionError> {
        let record = self
            .records
            .iter()
            .find(|r| r.number == number)
            .cloned()
            .ok_or_else(|| SessionError::AccountNotFound(number.to_string()))?;

        let bundle = self
            .ciam
            .refresh_token(&record.refresh_token, &record.subscriber_id)
            .await?;
        self.store_rotated_token(number, &bundle.refresh_token)?;

        self.active = Some(ActiveSession {
            number: record.number,
            subscriber_id: record.subscriber_id,
            subscription_type: record.subscription_type,
            tokens: bundle,
        });
        self.last_refresh = Utc::now().timestamp();
        self.write_marker(number)?;
        info!(number, "active account switched");
        Ok(())
    }

    /// The active session with fresh-enough tokens.
    ///
    /// Restores the active account from the marker file (falling back to
    /// the first record) when memory is cold. A failed background refresh
    /// is logged and the stale session returned, except when recovery has
    /// conclusively failed ([`SessionError::MustRelogin`]).
    pub async fn active_session(&mut self) -> Result<Option<&ActiveSession>, SessionError> {
        if self.active.is_none() {
            if let Some(number) = self.restore_candidate() {
                self.set_active(&number).await?;
            } else {
                return Ok(None);
            }
        }

        if Utc::now().timestamp() - self.last_refresh > FRESHNESS_THRESHOLD_SECS {
            info!("token bundle is stale, refreshing");
            match self.renew().await {
                Ok(()) => {}
                Err(SessionError::MustRelogin) => return Err(SessionError::MustRelogin),
                Err(e) => warn!(error = %e, "automatic token refresh failed"),
            }
        }
        Ok(self.active.as_ref())
    }

    /// Fresh tokens for the active account.
    pub async fn active_tokens(&mut self) -> Result<Option<TokenBundle>, SessionError> {
        Ok(self.active_session().await?.map(|s| s.tokens.clone()))
    }

    /// Which account to activate on a cold start: the marker file when it
    /// names a registered number, otherwise the first record.
    fn restore_candidate(&self) -> Option<String> {
        if let Ok(content) = fs::read_to_string(&self.config.active_number_file) {
            let number = content.trim();
            if self.records.iter().any(|r| r.number == number) {
                return Some(number.to_string());
            }
        }
        self.records.first().map(|r| r.number.clone())
    }

    async fn renew(&mut self) -> Result<(), SessionError> {
        let (number, refresh_token, subscriber_id) = match &self.active {
            Some(a) => (
                a.number.clone(),
                a.tokens.refresh_token.clone(),
                a.subscriber_id.clone(),
            ),
            None => return Ok(()),
        };

        let bundle = self.ciam.refresh_token(&refresh_token, &subscriber_id).await?;
        self.store_rotated_token(&number, &bundle.refresh_token)?;
        if let Some(active) = &mut self.active {
            active.tokens = bundle;
        }
        self.last_refresh = Utc::now().timestamp();
        Ok(())
    }

    fn store_rotated_token(&mut self, number: &str, refresh_token: &str) -> Result<(), SessionError> {
        if let Some(record) = self.records.iter_mut().find(|r| r.number == number) {
            record.refresh_token = refresh_token.to_string();
        }
        self.persist()
    }

    /// Atomic replace: write to a sibling temp file, then rename over the
    /// token file.
    fn persist(&self) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| SessionError::RefreshFailed(format!("token store serialization: {e}")))?;
        let tmp = self.config.token_file.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.config.token_file)?;
        Ok(())
    }

    fn write_marker(&self, number: &str) -> Result<(), SessionError> {
        fs::write(&self.config.active_number_file, number)?;
        Ok(())
    }

    fn clear_marker(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.config.active_number_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Io(e)),
        }
    }
}

/// Load credential records, dropping junk entries and surviving a corrupt
/// or absent file.
fn load_records(path: &Path) -> Vec<CredentialRecord> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };
    let value: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(_) => {
            error!(path = %path.display(), "token file is corrupt, resetting to empty");
            return Vec::new();
        }
    };
    let Value::Array(items) = value else {
        warn!(path = %path.display(), "token file is not an array, resetting to empty");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<CredentialRecord>(item).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("{tag}-{}", uuid::Uuid::new_v4()));
        p
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            base_api_url: "http://127.0.0.1:1".to_string(),
            base_ciam_url: "http://127.0.0.1:1".to_string(),
            api_key: "k".to_string(),
            basic_auth: "b".to_string(),
            user_agent: "ua".to_string(),
            app_version: "8.9.1".to_string(),
            xdata_key: "0123456789abcdef".to_string(),
            fingerprint_key: "0123456789abcdef0123456789abcdef".to_string(),
            otp_sig_key: "otp-secret".to_string(),
            api_base_secret: "base-secret".to_string(),
            field_key: "0123456789abcdef".to_string(),
            token_file: temp_path("tokens"),
            active_number_file: temp_path("active"),
            fingerprint_file: temp_path("fp"),
            http_timeout: std::time::Duration::from_secs(1),
        })
    }

    fn manager(config: Arc<Config>) -> SessionManager {
        let identity = crate::identity::DeviceIdentity {
            fingerprint: "fp".to_string(),
            device_id: "id".to_string(),
        };
        let ciam = CiamClient::new(config.clone(), identity).unwrap();
        let api = ApiClient::new(config.clone()).unwrap();
        SessionManager::new(config, ciam, api)
    }

    fn cleanup(config: &Config) {
        let _ = fs::remove_file(&config.token_file);
        let _ = fs::remove_file(&config.active_number_file);
    }

    #[test]
    fn missing_token_file_loads_empty() {
        let config = test_config();
        let mgr = manager(config.clone());
        assert!(mgr.accounts().is_empty());
        cleanup(&config);
    }

    #[test]
    fn corrupt_token_file_resets_to_empty() {
        let config = test_config();
        fs::write(&config.token_file, "{not json").unwrap();
        let mgr = manager(config.clone());
        assert!(mgr.accounts().is_empty());
        cleanup(&config);
    }

    #[test]
    fn junk_entries_are_dropped_on_load() {
        let config = test_config();
        fs::write(
            &config.token_file,
            r#"[
                {"number":"6281200000001","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt1"},
                42,
                {"no_number":true},
                {"number":"6281200000002","subscriber_id":"S2","subscription_type":"PREPAID","refresh_token":"rt2"}
            ]"#,
        )
        .unwrap();
        let mgr = manager(config.clone());
        assert_eq!(mgr.accounts().len(), 2);
        assert_eq!(mgr.accounts()[1].number, "6281200000002");
        cleanup(&config);
    }

    #[test]
    fn remove_account_falls_back_to_first_record() {
        let config = test_config();
        fs::write(
            &config.token_file,
            r#"[
                {"number":"6281200000001","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt1"},
                {"number":"6281200000002","subscriber_id":"S2","subscription_type":"PREPAID","refresh_token":"rt2"}
            ]"#,
        )
        .unwrap();
        let mut mgr = manager(config.clone());
        // Pretend the second account is active without touching the network.
        mgr.active = Some(ActiveSession {
            number: "6281200000002".to_string(),
            subscriber_id: "S2".to_string(),
            subscription_type: "PREPAID".to_string(),
            tokens: TokenBundle {
                access_token: "a".to_string(),
                refresh_token: "rt2".to_string(),
                id_token: "i".to_string(),
                expires_in: 0,
                token_type: String::new(),
                scope: String::new(),
            },
        });

        mgr.remove_account("6281200000002").unwrap();
        assert_eq!(mgr.accounts().len(), 1);
        assert!(mgr.active_number().is_none());
        let marker = fs::read_to_string(&config.active_number_file).unwrap();
        assert_eq!(marker.trim(), "6281200000001");
        cleanup(&config);
    }

    #[test]
    fn remove_last_account_clears_marker() {
        let config = test_config();
        fs::write(
            &config.token_file,
            r#"[{"number":"6281200000001","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt1"}]"#,
        )
        .unwrap();
        fs::write(&config.active_number_file, "6281200000001").unwrap();
        let mut mgr = manager(config.clone());
        mgr.active = Some(ActiveSession {
            number: "6281200000001".to_string(),
            subscriber_id: "S1".to_string(),
            subscription_type: "PREPAID".to_string(),
            tokens: TokenBundle {
                access_token: "a".to_string(),
                refresh_token: "rt1".to_string(),
                id_token: "i".to_string(),
                expires_in: 0,
                token_type: String::new(),
                scope: String::new(),
            },
        });

        mgr.remove_account("6281200000001").unwrap();
        assert!(mgr.accounts().is_empty());
        assert!(!config.active_number_file.exists());
        cleanup(&config);
    }

    #[test]
    fn removing_unknown_account_errors() {
        let config = test_config();
        let mut mgr = manager(config.clone());
        assert!(matches!(
            mgr.remove_account("6281200000009"),
            Err(SessionError::AccountNotFound(_))
        ));
        cleanup(&config);
    }

    #[test]
    fn restore_candidate_prefers_marker_then_first() {
        let config = test_config();
        fs::write(
            &config.token_file,
            r#"[
                {"number":"6281200000001","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt1"},
                {"number":"6281200000002","subscriber_id":"S2","subscription_type":"PREPAID","refresh_token":"rt2"}
            ]"#,
        )
        .unwrap();
        let mgr = manager(config.clone());
        assert_eq!(mgr.restore_candidate().as_deref(), Some("6281200000001"));

        fs::write(&config.active_number_file, "6281200000002\n").unwrap();
        assert_eq!(mgr.restore_candidate().as_deref(), Some("6281200000002"));

        // A marker pointing at an unregistered number falls back.
        fs::write(&config.active_number_file, "6281299999999").unwrap();
        assert_eq!(mgr.restore_candidate().as_deref(), Some("6281200000001"));
        cleanup(&config);
    }

    #[tokio::test]
    async fn stale_session_is_refreshed_before_tokens_are_returned() {
        use axum::{routing::post, Json, Router};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let router = Router::new().route(
                "/realms/xl-ciam/protocol/openid-connect/token",
                post(|| async {
                    Json(serde_json::json!({
                        "access_token": "at-fresh",
                        "refresh_token": "rt-fresh",
                        "id_token": "it-fresh",
                    }))
                }),
            );
            axum::serve(listener, router).await.unwrap();
        });

        let mut config = (*test_config()).clone();
        config.base_ciam_url = format!("http://{addr}");
        let config = Arc::new(config);
        fs::write(
            &config.token_file,
            r#"[{"number":"6281200000001","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt-old"}]"#,
        )
        .unwrap();

        let mut mgr = manager(config.clone());
        mgr.active = Some(ActiveSession {
            number: "6281200000001".to_string(),
            subscriber_id: "S1".to_string(),
            subscription_type: "PREPAID".to_string(),
            tokens: TokenBundle {
                access_token: "at-stale".to_string(),
                refresh_token: "rt-old".to_string(),
                id_token: "it-stale".to_string(),
                expires_in: 0,
                token_type: String::new(),
                scope: String::new(),
            },
        });
        mgr.last_refresh = 0;

        let tokens = mgr.active_tokens().await.unwrap().unwrap();
        assert_eq!(tokens.access_token, "at-fresh");
        assert!(Utc::now().timestamp() - mgr.last_refresh <= FRESHNESS_THRESHOLD_SECS);
        // The rotated refresh token replaced the stored one.
        assert_eq!(mgr.accounts()[0].refresh_token, "rt-fresh");
        cleanup(&config);
    }

    #[test]
    fn persist_writes_atomically_and_round_trips() {
        let config = test_config();
        let mut mgr = manager(config.clone());
        mgr.records.push(CredentialRecord {
            number: "6281200000001".to_string(),
            subscriber_id: "S1".to_string(),
            subscription_type: "PREPAID".to_string(),
            refresh_token: "rt1".to_string(),
        });
        mgr.persist().unwrap();
        assert!(!config.token_file.with_extension("tmp").exists());

        let reloaded = load_records(&config.token_file);
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].refresh_token, "rt1");
        cleanup(&config);
    }
}
