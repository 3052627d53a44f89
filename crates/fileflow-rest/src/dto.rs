//! JSON request/response shapes for the REST plane.
//!
//! Core entities ([`fileflow_core::Account`], [`fileflow_core::Settings`],
//! [`fileflow_core::FileExpiration`]) already derive `Serialize`/
//! `Deserialize` in `camelCase` and are returned directly. The types here
//! cover creation payloads (so callers never supply server-assigned
//! fields like `id`/`createdAt`) and the few aggregator value types that
//! don't carry `serde` derives of their own, since the business-logic
//! crate stays transport-agnostic.

use chrono::{DateTime, Utc};
use fileflow_aggregator::{AccountFiles, FileEntry, UploadOutcome};
use fileflow_core::{Capabilities, PermissionSet, Quota};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCreateRequest {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
    pub upstream_account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    pub endpoint_url: String,
    pub public_domain: String,
    #[serde(default)]
    pub analytics_token: Option<String>,
    pub quota: Quota,
    #[serde(default)]
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountUpdateRequest {
    pub name: Option<String>,
    pub active: Option<bool>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket_name: Option<String>,
    pub endpoint_url: Option<String>,
    pub public_domain: Option<String>,
    pub analytics_token: Option<String>,
    pub quota: Option<Quota>,
    pub capabilities: Option<Capabilities>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreateRequest {
    pub name: String,
    pub permissions: Vec<String>,
}

/// A token as listed (never re-displays `secret`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSummary {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<fileflow_core::Token> for TokenSummary {
    fn from(token: fileflow_core::Token) -> Self {
        Self {
            id: token.id,
            name: token.name,
            permissions: token.permissions.to_strings(),
            created_at: token.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCreateRequest {
    pub account_id: Uuid,
    #[serde(default)]
    pub description: String,
    pub permissions: Vec<String>,
    /// WebDAV only: admin may pin a username; otherwise one is generated.
    #[serde(default)]
    pub username: Option<String>,
}

/// An S3 credential as listed (never re-displays `secret_access_key`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3CredentialSummary {
    pub id: Uuid,
    pub access_key_id: String,
    pub account_id: Uuid,
    pub description: String,
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<fileflow_core::S3Credential> for S3CredentialSummary {
    fn from(c: fileflow_core::S3Credential) -> Self {
        Self {
            id: c.id,
            access_key_id: c.access_key_id,
            account_id: c.account_id,
            description: c.description,
            permissions: c.permissions.to_strings(),
            active: c.active,
            created_at: c.created_at,
            last_used_at: c.last_used_at,
        }
    }
}

/// A WebDAV credential as listed (never re-displays `password`).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebDavCredentialSummary {
    pub id: Uuid,
    pub username: String,
    pub account_id: Uuid,
    pub description: String,
    pub permissions: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<fileflow_core::WebDavCredential> for WebDavCredentialSummary {
    fn from(c: fileflow_core::WebDavCredential) -> Self {
        Self {
            id: c.id,
            username: c.username,
            account_id: c.account_id,
            description: c.description,
            permissions: c.permissions.to_strings(),
            active: c.active,
            created_at: c.created_at,
            last_used_at: c.last_used_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdateRequest {
    pub sync_interval_minutes: Option<i64>,
    pub endpoint_proxy: Option<bool>,
    pub endpoint_proxy_url: Option<String>,
    pub default_expiration_days: Option<i64>,
    pub expiration_check_minutes: Option<i64>,
    pub s3_virtual_hosted_style: Option<bool>,
    pub s3_base_domain: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntryDto {
    pub is_dir: bool,
    pub name: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<FileEntry> for FileEntryDto {
    fn from(e: FileEntry) -> Self {
        Self {
            is_dir: e.is_dir,
            name: e.name,
            size: e.size,
            last_modified: e.last_modified,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFilesDto {
    pub account_id: Uuid,
    pub account_name: String,
    pub files: Vec<FileEntryDto>,
    pub size_bytes: i64,
    pub max_size: i64,
    pub next_cursor: Option<String>,
}

impl From<AccountFiles> for AccountFilesDto {
    fn from(a: AccountFiles) -> Self {
        Self {
            account_id: a.account_id,
            account_name: a.account_name,
            files: a.files.into_iter().map(FileEntryDto::from).collect(),
            size_bytes: a.size_bytes,
            max_size: a.max_size,
            next_cursor: a.next_cursor,
        }
    }
}

/// The `/files` response: one [`AccountFilesDto`] per contributing
/// account plus a single opaque `next_cursor` combining every account's
/// per-account continuation token, so a client pages the whole merged
/// listing by echoing back one value.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesListResponse {
    pub accounts: Vec<AccountFilesDto>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub id: Uuid,
    pub account_name: String,
    pub key: String,
    pub size: i64,
    pub url: String,
}

impl From<UploadOutcome> for UploadResponse {
    fn from(o: UploadOutcome) -> Self {
        Self {
            id: o.id,
            account_name: o.account_name,
            key: o.key,
            size: o.size,
            url: o.url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub account_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOldFilesRequest {
    #[serde(default)]
    pub account_ids: Vec<Uuid>,
    pub before_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOldFilesResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub deleted: usize,
}

pub fn parse_permissions(values: &[String]) -> Result<PermissionSet, crate::error::RestError> {
    PermissionSet::parse(values).map_err(crate::error::RestError::from)
}

fn default_true() -> bool {
    true
}
