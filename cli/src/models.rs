//! Data models: token bundles, credential records, and per-endpoint
//! request/response records.
//!
//! Requests are explicit structs rather than ad-hoc JSON maps so required
//! fields are validated at the boundary. On-disk formats keep the field
//! names of the original token files for drop-in compatibility.

use serde::{Deserialize, Serialize};

/// Token bundle returned by the CIAM token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub id_token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

/// One registered account, as persisted in the token file.
///
/// Invariant: at most one record per phone number; the refresh token is
/// rotated in place on every successful refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Phone number in `628…` form.
    pub number: String,
    pub subscriber_id: String,
    pub subscription_type: String,
    pub refresh_token: String,
}

/// In-memory state for the currently active account. Never persisted.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub number: String,
    pub subscriber_id: String,
    pub subscription_type: String,
    pub tokens: TokenBundle,
}

/// Standard envelope wrapping decrypted business responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
}

/// Subscriber profile as returned under `data.profile`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub subscriber_id: String,
    #[serde(default)]
    pub subscription_type: String,
    #[serde(default)]
    pub msisdn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileData {
    pub profile: Profile,
}

/// Main balance as returned under `data.balance`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceInfo {
    #[serde(default)]
    pub remaining: i64,
    #[serde(default)]
    pub expired_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceData {
    pub balance: BalanceInfo,
}

/// Minimal view of a package option inside a detail response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageOption {
    #[serde(default)]
    pub package_option_code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub order: i64,
}

/// Package detail under `data`, keeping only the fields the client reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDetail {
    #[serde(default)]
    pub package_option: PackageOption,
    #[serde(default)]
    pub token_confirmation: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

// === Per-endpoint request records ===

#[derive(Debug, Clone, Serialize)]
pub struct BalanceRequest {
    pub is_enterprise: bool,
    pub lang: &'static str,
}

impl Default for BalanceRequest {
    fn default() -> Self {
        Self { is_enterprise: false, lang: "en" }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileRequest {
    pub access_token: String,
    pub app_version: String,
    pub is_enterprise: bool,
    pub lang: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaDetailsRequest {
    pub is_enterprise: bool,
    pub lang: &'static str,
    pub family_member_id: String,
}

impl Default for QuotaDetailsRequest {
    fn default() -> Self {
        Self {
            is_enterprise: false,
            lang: "en",
            family_member_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageDetailRequest {
    pub is_transaction_routine: bool,
    pub migration_type: String,
    pub package_family_code: String,
    pub family_role_hub: String,
    pub is_autobuy: bool,
    pub is_enterprise: bool,
    pub is_shareable: bool,
    pub is_migration: bool,
    pub lang: &'static str,
    pub package_option_code: String,
    pub is_upsell_pdp: bool,
    pub package_variant_code: String,
}

impl PackageDetailRequest {
    pub fn new(option_code: &str, family_code: &str, variant_code: &str) -> Self {
        Self {
            is_transaction_routine: false,
            migration_type: "NONE".to_string(),
            package_family_code: family_code.to_string(),
            family_role_hub: String::new(),
            is_autobuy: false,
            is_enterprise: false,
            is_shareable: false,
            is_migration: false,
            lang: "en",
            package_option_code: option_code.to_string(),
            is_upsell_pdp: false,
            package_variant_code: variant_code.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyOptionsRequest {
    pub is_show_tagging_tab: bool,
    pub is_dedicated_event: bool,
    pub is_transaction_routine: bool,
    pub migration_type: String,
    pub package_family_code: String,
    pub is_autobuy: bool,
    pub is_enterprise: bool,
    pub is_pdlp: bool,
    pub referral_code: String,
    pub is_migration: bool,
    pub lang: &'static str,
}

impl FamilyOptionsRequest {
    pub fn new(family_code: &str, is_enterprise: bool, migration_type: &str) -> Self {
        Self {
            is_show_tagging_tab: true,
            is_dedicated_event: true,
            is_transaction_routine: false,
            migration_type: migration_type.to_string(),
            package_family_code: family_code.to_string(),
            is_autobuy: false,
            is_enterprise,
            is_pdlp: true,
            referral_code: String::new(),
            is_migration: false,
            lang: "en",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FamiliesByCategoryRequest {
    pub migration_type: String,
    pub is_enterprise: bool,
    pub is_shareable: bool,
    pub package_category_code: String,
    pub with_icon_url: bool,
    pub is_migration: bool,
    pub lang: &'static str,
}

impl FamiliesByCategoryRequest {
    pub fn new(category_code: &str) -> Self {
        Self {
            migration_type: String::new(),
            is_enterprise: false,
            is_shareable: false,
            package_category_code: category_code.to_string(),
            with_icon_url: true,
            is_migration: false,
            lang: "en",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    pub product_subscription_type: String,
    pub quota_code: String,
    pub product_domain: String,
    pub is_enterprise: bool,
    pub unsubscribe_reason_code: String,
    pub lang: &'static str,
    pub family_member_id: String,
}

impl UnsubscribeRequest {
    pub fn new(quota_code: &str, domain: &str, subscription_type: &str) -> Self {
        Self {
            product_subscription_type: subscription_type.to_string(),
            quota_code: quota_code.to_string(),
            product_domain: domain.to_string(),
            is_enterprise: false,
            unsubscribe_reason_code: String::new(),
            lang: "en",
            family_member_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationsRequest {
    pub is_enterprise: bool,
    pub lang: &'static str,
}

impl Default for NotificationsRequest {
    fn default() -> Self {
        Self { is_enterprise: false, lang: "en" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_record_round_trips_with_original_field_names() {
        let json = r#"{"number":"6281200000000","subscriber_id":"S1","subscription_type":"PREPAID","refresh_token":"rt"}"#;
        let rec: CredentialRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.number, "6281200000000");
        let back = serde_json::to_value(&rec).unwrap();
        assert_eq!(back["refresh_token"], "rt");
        assert_eq!(back["subscription_type"], "PREPAID");
    }

    #[test]
    fn token_bundle_tolerates_missing_optional_fields() {
        let json = r#"{"access_token":"a","refresh_token":"r","id_token":"i"}"#;
        let bundle: TokenBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.expires_in, 0);
        assert!(bundle.scope.is_empty());
    }

    #[test]
    fn requests_serialize_compactly() {
        let req = QuotaDetailsRequest::default();
        let s = serde_json::to_string(&req).unwrap();
        assert_eq!(
            s,
            r#"{"is_enterprise":false,"lang":"en","family_member_id":""}"#
        );
    }
}
