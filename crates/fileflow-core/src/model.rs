//! Entity definitions, invariants, and derived predicates.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FileFlowError, FileFlowResult};

/// One of the three uniform access planes, plus the two upload-origin
/// pseudo-planes (`auto`, `api`, `client`) used by account selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// Automatic account selection (no explicit target, no explicit origin).
    Auto,
    /// Upload originated from the admin/tenant REST API.
    Api,
    /// Upload originated from a client-facing upload widget.
    Client,
    /// The S3-V4 gateway plane.
    S3,
    /// The WebDAV plane.
    Webdav,
    /// Cross-account listing (the aggregator); ignores capability flags.
    List,
}

/// A single granted permission. Persisted as a free-form string; validated
/// into this tagged variant at the boundary rather than carried as a raw
/// string through the rest of the codebase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// May list/read objects.
    Read,
    /// May create/overwrite objects.
    Write,
    /// May delete objects.
    Delete,
}

impl Permission {
    /// Parse a persisted permission string, rejecting anything outside
    /// `{read, write, delete}`.
    pub fn parse(s: &str) -> FileFlowResult<Self> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            other => Err(FileFlowError::Validation(format!(
                "unknown permission: {other}"
            ))),
        }
    }

    /// The persisted string form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        }
    }
}

/// A set of granted permissions, parsed from and serialized back to a
/// JSON array of strings (the persisted list-valued column form).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(pub Vec<Permission>);

impl PermissionSet {
    /// True if `perm` is present.
    #[must_use]
    pub fn allows(&self, perm: Permission) -> bool {
        self.0.contains(&perm)
    }

    /// Parse from the persisted string list, validating each entry.
    pub fn parse(values: &[String]) -> FileFlowResult<Self> {
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            out.push(Permission::parse(v)?);
        }
        Ok(Self(out))
    }

    /// Render back to the persisted string list form.
    #[must_use]
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|p| p.as_str().to_owned()).collect()
    }
}

/// Capability set gating which access planes may use an [`Account`].
///
/// The canonical field set per / is `{s3, webdav, autoUpload, apiUpload,
/// clientUpload}`; all default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Usable from the S3-V4 gateway plane.
    pub s3: bool,
    /// Usable from the WebDAV plane.
    pub webdav: bool,
    /// Eligible for automatic (no explicit target) upload selection.
    pub auto_upload: bool,
    /// Usable as an explicit upload target from the REST API.
    pub api_upload: bool,
    /// Usable as an explicit upload target from a client-facing widget.
    pub client_upload: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            s3: true,
            webdav: true,
            auto_upload: true,
            api_upload: true,
            client_upload: true,
        }
    }
}

impl Capabilities {
    /// Whether this capability set permits use from `plane`.
    ///
    /// `List` is not capability-gated: the aggregator considers every
    /// active, non-overquota account regardless of per-plane flags.
    #[must_use]
    pub fn allows(&self, plane: Plane) -> bool {
        match plane {
            Plane::Auto => self.auto_upload,
            Plane::Api => self.api_upload,
            Plane::Client => self.client_upload,
            Plane::S3 => self.s3,
            Plane::Webdav => self.webdav,
            Plane::List => true,
        }
    }
}

/// `(maxSizeBytes, maxClassAOps)` — the quota ceiling for an [`Account`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    /// Maximum total object bytes the account may hold.
    pub max_size_bytes: i64,
    /// Maximum class-A (write-side) operations per billing period.
    pub max_class_a_ops: i64,
}

/// `(sizeBytes, classAOps, classBOps, lastSyncAt)` — the last-known usage
/// snapshot for an [`Account`], refreshed by the usage-sync scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Total object bytes currently stored.
    pub size_bytes: i64,
    /// Class-A (write-side) operations counted this billing period.
    pub class_a_ops: i64,
    /// Class-B (read-side) operations counted this billing period.
    pub class_b_ops: i64,
    /// When this snapshot was last refreshed from the upstream analytics API.
    pub last_sync_at: Option<DateTime<Utc>>,
}

/// An upstream S3-compatible bucket managed as a single tenant unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Opaque identifier.
    pub id: Uuid,
    /// Human-readable display name.
    pub name: String,
    /// Whether the account currently accepts traffic.
    pub active: bool,
    /// The upstream provider's account identifier (billing/analytics scope).
    pub upstream_account_id: String,
    /// Upstream access key id.
    pub access_key_id: String,
    /// Upstream secret access key.
    pub secret_access_key: String,
    /// Upstream bucket name.
    pub bucket_name: String,
    /// Upstream S3-compatible endpoint URL.
    pub endpoint_url: String,
    /// Domain clients should see in generated URLs.
    pub public_domain: String,
    /// Token used to query the upstream analytics API, if configured.
    pub analytics_token: Option<String>,
    /// Storage and class-A-ops ceiling.
    pub quota: Quota,
    /// Last-known usage snapshot.
    pub usage: Usage,
    /// Per-plane capability flags.
    pub capabilities: Capabilities,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// `isOverQuota ≡ usage.sizeBytes ≥ quota.maxSizeBytes`.
    #[must_use]
    pub fn is_over_quota(&self) -> bool {
        self.usage.size_bytes >= self.quota.max_size_bytes
    }

    /// `isOverOps ≡ usage.classAOps ≥ quota.maxClassAOps`.
    #[must_use]
    pub fn is_over_ops(&self) -> bool {
        self.usage.class_a_ops >= self.quota.max_class_a_ops
    }

    /// `isAvailable ≡ active ∧ ¬isOverQuota ∧ ¬isOverOps`.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.active && !self.is_over_quota() && !self.is_over_ops()
    }

    /// `isAvailableFor(plane) ≡ isAvailable ∧ capability[plane]`.
    #[must_use]
    pub fn is_available_for(&self, plane: Plane) -> bool {
        self.is_available() && self.capabilities.allows(plane)
    }

    /// `usagePercent ≡ 100·sizeBytes/maxSizeBytes` (0 when denominator is 0).
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.quota.max_size_bytes <= 0 {
            return 0.0;
        }
        100.0 * (self.usage.size_bytes as f64) / (self.quota.max_size_bytes as f64)
    }

    /// The subdomain component of `public_domain`, used to build proxy URLs
    /// (`{proxyUrl}/{subdomain}/{key}`,  and 's public proxy plane).
    #[must_use]
    pub fn public_subdomain(&self) -> &str {
        self.public_domain
            .split('.')
            .next()
            .unwrap_or(&self.public_domain)
    }
}

/// REST API bearer credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    /// Opaque identifier.
    pub id: Uuid,
    /// Human-readable display name.
    pub name: String,
    /// Secret value, `sk-` + 61 alphanumeric characters.
    ///
    /// Returned once on creation; the reference implementation keeps it in
    /// cleartext — we store it in cleartext as well to
    /// preserve the re-display contract, but never log it.
    pub secret: String,
    /// Granted permission set.
    pub permissions: PermissionSet,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Generate a token secret matching `^sk-[A-Za-z0-9]{61}$`.
#[must_use]
pub fn generate_token_secret() -> String {
    format!("sk-{}", random_alnum(61))
}

/// An S3-plane credential bound to a single [`Account`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Credential {
    /// Opaque identifier.
    pub id: Uuid,
    /// 20-character access key id, `FFLW` + 16 random uppercase-alnum.
    pub access_key_id: String,
    /// 40-character secret.
    pub secret_access_key: String,
    /// The account this credential is bound to.
    pub account_id: Uuid,
    /// Free-form description.
    pub description: String,
    /// Granted permission set.
    pub permissions: PermissionSet,
    /// Whether this credential currently authenticates requests.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-used timestamp, updated asynchronously on successful auth.
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Generate an S3 access key id matching `FFLW` + 16 random uppercase-alnum.
#[must_use]
pub fn generate_s3_access_key_id() -> String {
    format!("FFLW{}", random_upper_alnum(16))
}

/// Generate a 40-character S3 secret access key.
#[must_use]
pub fn generate_s3_secret() -> String {
    random_alnum(40)
}

/// A WebDAV-plane credential bound to a single [`Account`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavCredential {
    /// Opaque identifier.
    pub id: Uuid,
    /// Globally-unique username, default `FFLW_WebDAV_` + 8 uppercase-alnum.
    pub username: String,
    /// 32-character password.
    pub password: String,
    /// The account this credential is bound to.
    pub account_id: Uuid,
    /// Free-form description.
    pub description: String,
    /// Granted permission set.
    pub permissions: PermissionSet,
    /// Whether this credential currently authenticates requests.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-used timestamp, updated asynchronously on successful auth.
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Generate a default WebDAV username, `FFLW_WebDAV_` + 8 uppercase-alnum.
#[must_use]
pub fn generate_webdav_username() -> String {
    format!("FFLW_WebDAV_{}", random_upper_alnum(8))
}

/// Generate a 32-character WebDAV password.
#[must_use]
pub fn generate_webdav_password() -> String {
    random_alnum(32)
}

/// A scheduled deletion record. Unique by `(account_id, file_key)`;
/// upserting replaces the existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileExpiration {
    /// Opaque identifier.
    pub id: Uuid,
    /// The owning account.
    pub account_id: Uuid,
    /// The object key scheduled for deletion.
    pub file_key: String,
    /// Wall-clock deletion time.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Process-wide, store-backed, hot-reloadable singleton configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Usage-sync tick interval in minutes, clamped to `[1, 1440]`.
    pub sync_interval_minutes: i64,
    /// Whether generated URLs should be rewritten through the proxy plane.
    pub endpoint_proxy: bool,
    /// Base URL of the reverse proxy used when `endpoint_proxy` is set.
    pub endpoint_proxy_url: String,
    /// Default expiration window for uploads that don't specify one.
    /// `0` means permanent.
    pub default_expiration_days: i64,
    /// Expiration-sweep tick interval in minutes, clamped to `[60, 1440]`.
    pub expiration_check_minutes: i64,
    /// Whether the S3 plane uses virtual-hosted-style bucket addressing.
    pub s3_virtual_hosted_style: bool,
    /// Base domain used to recognize virtual-hosted-style requests.
    pub s3_base_domain: String,
    /// Last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_interval_minutes: 5,
            endpoint_proxy: false,
            endpoint_proxy_url: String::new(),
            default_expiration_days: 30,
            expiration_check_minutes: 720,
            s3_virtual_hosted_style: false,
            s3_base_domain: String::new(),
            updated_at: Utc::now(),
        }
    }
}

impl Settings {
    /// Normalize field values into their documented clamp ranges.
    pub fn normalize(&mut self) {
        self.sync_interval_minutes = self.sync_interval_minutes.clamp(1, 1440);
        self.expiration_check_minutes = self.expiration_check_minutes.clamp(60, 1440);
    }
}

fn random_alnum(len: usize) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    random_from_alphabet(len, CHARS)
}

fn random_upper_alnum(len: usize) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    random_from_alphabet(len, CHARS)
}

fn random_from_alphabet(len: usize, alphabet: &[u8]) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..alphabet.len());
            alphabet[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_account(size: i64, max_size: i64, active: bool) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: "A".into(),
            active,
            upstream_account_id: "acct".into(),
            access_key_id: "AK".into(),
            secret_access_key: "SK".into(),
            bucket_name: "bucket".into(),
            endpoint_url: "https://example.com".into(),
            public_domain: "a.example.com".into(),
            analytics_token: None,
            quota: Quota {
                max_size_bytes: max_size,
                max_class_a_ops: 1000,
            },
            usage: Usage {
                size_bytes: size,
                class_a_ops: 0,
                class_b_ops: 0,
                last_sync_at: None,
            },
            capabilities: Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_is_over_quota_uses_greater_or_equal() {
        let acct = make_account(100, 100, true);
        assert!(acct.is_over_quota());
        let acct = make_account(99, 100, true);
        assert!(!acct.is_over_quota());
    }

    #[test]
    fn test_is_available_requires_active_and_under_quota() {
        let mut acct = make_account(0, 100, true);
        assert!(acct.is_available());
        acct.active = false;
        assert!(!acct.is_available());
    }

    #[test]
    fn test_usage_percent_zero_denominator() {
        let acct = make_account(50, 0, true);
        assert_eq!(acct.usage_percent(), 0.0);
    }

    #[test]
    fn test_usage_percent_computes_ratio() {
        let acct = make_account(25, 100, true);
        assert_eq!(acct.usage_percent(), 25.0);
    }

    #[test]
    fn test_public_subdomain_extracts_leading_label() {
        let acct = make_account(0, 100, true);
        assert_eq!(acct.public_subdomain(), "a");
    }

    #[test]
    fn test_capability_allows_per_plane() {
        let mut caps = Capabilities::default();
        caps.webdav = false;
        assert!(caps.allows(Plane::S3));
        assert!(!caps.allows(Plane::Webdav));
        assert!(caps.allows(Plane::List));
    }

    #[test]
    fn test_permission_set_rejects_unknown_strings() {
        let err = PermissionSet::parse(&["read".into(), "bogus".into()]).unwrap_err();
        assert!(matches!(err, FileFlowError::Validation(_)));
    }

    #[test]
    fn test_token_secret_matches_shape() {
        let secret = generate_token_secret();
        assert!(secret.starts_with("sk-"));
        assert_eq!(secret.len(), 3 + 61);
        assert!(secret[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_s3_access_key_id_matches_shape() {
        let key = generate_s3_access_key_id();
        assert_eq!(key.len(), 20);
        assert!(key.starts_with("FFLW"));
    }

    #[test]
    fn test_settings_normalize_clamps_ranges() {
        let mut settings = Settings {
            sync_interval_minutes: 0,
            expiration_check_minutes: 5000,
            ..Settings::default()
        };
        settings.normalize();
        assert_eq!(settings.sync_interval_minutes, 1);
        assert_eq!(settings.expiration_check_minutes, 1440);
    }
}
