//! Interactive terminal client.
//!
//! A sequential stdin-driven menu over the session manager and API
//! clients. At most one request is in flight at a time; the only
//! concurrent task is the quota monitor's stdin stopper.

use std::io::Write as _;
use std::sync::Arc;

use ax_cli::ciam::ContactType;
use ax_cli::identity::FingerprintStore;
use ax_cli::sentry::{spawn_stdin_stopper, QuotaMonitor};
use ax_cli::{ApiClient, CiamClient, Config, SessionError, SessionManager};
use tracing::error;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(Config::from_env());

    let mut fingerprints = FingerprintStore::new(&config);
    let identity = match fingerprints.identity() {
        Ok(id) => id,
        Err(e) => {
            error!(error = %e, "cannot establish a device identity");
            return;
        }
    };

    let ciam = match CiamClient::new(config.clone(), identity) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "cannot construct CIAM client");
            return;
        }
    };
    let api = match ApiClient::new(config.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "cannot construct API client");
            return;
        }
    };
    let mut sessions = SessionManager::new(config, ciam.clone(), api.clone());

    run_menu(&mut sessions, &ciam, &api).await;
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ax_cli=info")),
        )
        .init();
}

async fn run_menu(sessions: &mut SessionManager, ciam: &CiamClient, api: &ApiClient) {
    loop {
        println!();
        println!("=== ax client ===");
        match sessions.active_number() {
            Some(n) => println!("active: {n}"),
            None => println!("active: (none)"),
        }
        println!(" 1) request OTP");
        println!(" 2) submit OTP");
        println!(" 3) add account by refresh token");
        println!(" 4) list / switch accounts");
        println!(" 5) remove account");
        println!(" 6) balance");
        println!(" 7) quota details");
        println!(" 8) package detail");
        println!(" 9) quota monitor");
        println!(" 0) exit");

        match prompt("> ").as_str() {
            "1" => request_otp(ciam).await,
            "2" => submit_otp(sessions, ciam).await,
            "3" => add_account(sessions).await,
            "4" => switch_account(sessions).await,
            "5" => remove_account(sessions),
            "6" => show_balance(sessions, api).await,
            "7" => show_quota(sessions, api).await,
            "8" => show_package_detail(sessions, api).await,
            "9" => monitor_quota(sessions, api).await,
            "0" | "q" => break,
            other => println!("unknown choice: {other}"),
        }
    }
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
    line.trim().to_string()
}

async fn request_otp(ciam: &CiamClient) {
    let number = prompt("phone number (628…): ");
    match ciam.request_otp(&number).await {
        Ok(subscriber_id) => println!("OTP sent; subscriber id {subscriber_id}"),
        Err(e) => println!("OTP request failed: {e}"),
    }
}

async fn submit_otp(sessions: &mut SessionManager, ciam: &CiamClient) {
    let number = prompt("phone number (628…): ");
    let code = prompt("OTP code: ");
    match ciam.submit_otp(ContactType::Sms, &number, &code).await {
        Ok(bundle) => match sessions.add_account(&number, &bundle.refresh_token).await {
            Ok(()) => println!("logged in as {number}"),
            Err(e) => println!("login succeeded but registration failed: {e}"),
        },
        Err(e) => println!("login failed: {e}"),
    }
}

async fn add_account(sessions: &mut SessionManager) {
    let number = prompt("phone number (628…): ");
    let refresh_token = prompt("refresh token: ");
    match sessions.add_account(&number, &refresh_token).await {
        Ok(()) => println!("account {number} registered and active"),
        Err(e) => println!("registration failed: {e}"),
    }
}

async fn switch_account(sessions: &mut SessionManager) {
    let numbers: Vec<String> = sessions
        .accounts()
        .iter()
        .map(|r| r.number.clone())
        .collect();
    if numbers.is_empty() {
        println!("no accounts registered");
        return;
    }
    for (i, number) in numbers.iter().enumerate() {
        let marker = if sessions.active_number() == Some(number.as_str()) {
            " (active)"
        } else {
            ""
        };
        println!(" {}) {number}{marker}", i + 1);
    }
    let choice = prompt("switch to #: ");
    let Some(number) = choice
        .parse::<usize>()
        .ok()
        .and_then(|i| numbers.get(i.wrapping_sub(1)))
    else {
        println!("invalid selection");
        return;
    };
    match sessions.set_active(number).await {
        Ok(()) => println!("switched to {number}"),
        Err(SessionError::MustRelogin) => println!("session is dead; log in again with an OTP"),
        Err(e) => println!("switch failed: {e}"),
    }
}

fn remove_account(sessions: &mut SessionManager) {
    let number = prompt("phone number to remove: ");
    match sessions.remove_account(&number) {
        Ok(()) => println!("removed {number}"),
        Err(e) => println!("removal failed: {e}"),
    }
}

async fn fresh_id_token(sessions: &mut SessionManager) -> Option<String> {
    match sessions.active_tokens().await {
        Ok(Some(tokens)) => Some(tokens.id_token),
        Ok(None) => {
            println!("no active account; log in first");
            None
        }
        Err(SessionError::MustRelogin) => {
            println!("session is dead; log in again with an OTP");
            None
        }
        Err(e) => {
            println!("cannot obtain tokens: {e}");
            None
        }
    }
}

async fn show_balance(sessions: &mut SessionManager, api: &ApiClient) {
    let Some(id_token) = fresh_id_token(sessions).await else { return };
    match api.get_balance(&id_token).await {
        Ok(balance) => {
            println!("balance: {}", balance.remaining);
            println!("expires: {}", balance.expired_at);
        }
        Err(e) => println!("balance fetch failed: {e}"),
    }
}

async fn show_quota(sessions: &mut SessionManager, api: &ApiClient) {
    let Some(id_token) = fresh_id_token(sessions).await else { return };
    match api.get_quota_details(&id_token).await {
        Ok(res) => match serde_json::to_string_pretty(&res) {
            Ok(pretty) => println!("{pretty}"),
            Err(_) => println!("{res}"),
        },
        Err(e) => println!("quota fetch failed: {e}"),
    }
}

async fn show_package_detail(sessions: &mut SessionManager, api: &ApiClient) {
    let Some(id_token) = fresh_id_token(sessions).await else { return };
    let option_code = prompt("package option code: ");
    let family_code = prompt("family code (optional): ");
    let variant_code = prompt("variant code (optional): ");
    match api
        .get_package_detail(&id_token, &option_code, &family_code, &variant_code)
        .await
    {
        Ok(detail) => {
            println!("name : {}", detail.package_option.name);
            println!("price: {}", detail.package_option.price);
            if let Some(token) = detail.token_confirmation {
                println!("confirmation token present ({} chars)", token.len());
            }
        }
        Err(e) => println!("detail fetch failed: {e}"),
    }
}

async fn monitor_quota(sessions: &mut SessionManager, api: &ApiClient) {
    let Some(id_token) = fresh_id_token(sessions).await else { return };
    let Some(number) = sessions.active_number().map(str::to_string) else {
        return;
    };

    println!("monitoring quota for {number}; press ENTER to stop");
    let stop = spawn_stdin_stopper();
    let monitor = QuotaMonitor::new(api.clone());
    match monitor.run(&number, &id_token, stop).await {
        Ok(report) => {
            println!(
                "monitoring finished: {} fetches, {} errors",
                report.fetches, report.errors
            );
            println!("log: {}", report.log_path.display());
        }
        Err(e) => println!("monitoring failed: {e}"),
    }
}
