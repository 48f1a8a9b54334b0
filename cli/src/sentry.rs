//! Real-time quota monitor.
//!
//! Polls the quota-details endpoint once per second for the active account
//! and appends every successful snapshot as a JSONL record. Pressing ENTER
//! stops the loop; a stop signal is delivered through a watch channel so
//! the poll loop never blocks on stdin.

use std::io::Write as _;
use std::path::PathBuf;

use chrono::Local;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::SessionError;

/// Poll interval between quota snapshots.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const LOG_DIR: &str = "sentry_logs";

/// Outcome of a finished monitoring run.
#[derive(Debug)]
pub struct MonitorReport {
    /// Snapshots attempted.
    pub fetches: u64,
    /// Fetches that failed or returned a non-success status.
    pub errors: u64,
    /// Where the JSONL log landed.
    pub log_path: PathBuf,
}

/// One-second quota poller writing JSONL snapshots.
pub struct QuotaMonitor {
    api: ApiClient,
    log_dir: PathBuf,
}

impl QuotaMonitor {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            log_dir: PathBuf::from(LOG_DIR),
        }
    }

    #[cfg(test)]
    fn with_log_dir(api: ApiClient, log_dir: PathBuf) -> Self {
        Self { api, log_dir }
    }

    /// Poll until `stop` flips to true. Each successful snapshot appends
    /// `{"ts": …, "data": [quotas…]}` to a fresh per-run log file.
    pub async fn run(
        &self,
        number: &str,
        id_token: &str,
        mut stop: watch::Receiver<bool>,
    ) -> Result<MonitorReport, SessionError> {
        std::fs::create_dir_all(&self.log_dir)?;
        let log_path = self
            .log_dir
            .join(log_file_name(number, &Local::now().format("%Y%m%d_%H%M%S").to_string()));
        let mut log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let mut fetches = 0u64;
        let mut errors = 0u64;

        while !*stop.borrow() {
            fetches += 1;

            match self.api.get_quota_details(id_token).await {
                Ok(res) if res.get("status").and_then(Value::as_str) == Some("SUCCESS") => {
                    let quotas = res
                        .pointer("/data/quotas")
                        .cloned()
                        .unwrap_or_else(|| Value::Array(Vec::new()));
                    let record = json!({
                        "ts": Local::now().to_rfc3339(),
                        "data": quotas,
                    });
                    writeln!(log, "{record}")?;
                    log.flush()?;
                }
                Ok(_) => {
                    errors += 1;
                    debug!(fetches, errors, "quota snapshot rejected");
                }
                Err(e) => {
                    errors += 1;
                    warn!(fetches, errors, error = %e, "quota snapshot failed");
                }
            }

            // Interruptible sleep: react to stop within one tick.
            tokio::select! {
                _ = sleep(POLL_INTERVAL) => {}
                changed = stop.changed() => {
                    // A dropped sender means nobody can stop us later.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        Ok(MonitorReport { fetches, errors, log_path })
    }
}

fn log_file_name(number: &str, timestamp: &str) -> String {
    format!("sentry_{number}_{timestamp}.jsonl")
}

/// Spawn a blocking task that flips the stop flag when ENTER is pressed
/// (or stdin closes).
pub fn spawn_stdin_stopper() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::task::spawn_blocking(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(true);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Arc;

    #[test]
    fn log_file_name_embeds_number_and_timestamp() {
        assert_eq!(
            log_file_name("6281200000000", "20260828_101500"),
            "sentry_6281200000000_20260828_101500.jsonl"
        );
    }

    #[tokio::test]
    async fn run_stops_immediately_when_flag_is_set() {
        let config = Arc::new(Config {
            base_api_url: "http://127.0.0.1:1".to_string(),
            base_ciam_url: String::new(),
            api_key: "k".to_string(),
            basic_auth: String::new(),
            user_agent: "ua".to_string(),
            app_version: "8.9.1".to_string(),
            xdata_key: "0123456789abcdef".to_string(),
            fingerprint_key: String::new(),
            otp_sig_key: String::new(),
            api_base_secret: "s".to_string(),
            field_key: String::new(),
            token_file: PathBuf::new(),
            active_number_file: PathBuf::new(),
            fingerprint_file: PathBuf::new(),
            http_timeout: std::time::Duration::from_secs(1),
        });
        let api = ApiClient::new(config).unwrap();

        let mut dir = std::env::temp_dir();
        dir.push(format!("sentry-test-{}", uuid::Uuid::new_v4()));
        let monitor = QuotaMonitor::with_log_dir(api, dir.clone());

        let (tx, rx) = watch::channel(true);
        let report = monitor.run("6281200000000", "id", rx).await.unwrap();
        drop(tx);

        assert_eq!(report.fetches, 0);
        assert_eq!(report.errors, 0);
        assert!(report.log_path.starts_with(&dir));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
