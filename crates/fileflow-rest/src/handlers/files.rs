//! Cross-account listing, upload, delete, link resolution, and expiration
//! record CRUD — the tenant-facing surface of `/files`, `/upload`,
//! `/file`, `/link`, and `/expirations`.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as BASE64;
use fileflow_aggregator::{UploadOutcome, UploadRequest, UpstreamClient, upload_file};
use fileflow_core::{FileExpiration, Plane, Store};
use uuid::Uuid;

use crate::dto::{AccountFilesDto, FilesListResponse, LinkResponse};
use crate::error::RestError;
use crate::service::ClientFactory;

/// Decode the opaque `cursor` query parameter into a per-account cursor
/// map. Malformed input is treated as "no cursor" rather than an error —
/// a client starting a fresh listing never sends one.
fn decode_cursor(raw: Option<&str>) -> HashMap<Uuid, String> {
    let Some(raw) = raw else { return HashMap::new() };
    let Ok(bytes) = BASE64.decode(raw) else { return HashMap::new() };
    serde_json::from_slice(&bytes).unwrap_or_default()
}

/// Re-encode the per-account `next_cursor` values carried by this page's
/// results into the single opaque token the client echoes back.
fn encode_cursor(accounts: &[fileflow_aggregator::AccountFiles]) -> Option<String> {
    let map: HashMap<Uuid, String> = accounts
        .iter()
        .filter_map(|a| a.next_cursor.clone().map(|c| (a.account_id, c)))
        .collect();
    if map.is_empty() {
        return None;
    }
    let bytes = serde_json::to_vec(&map).ok()?;
    Some(BASE64.encode(bytes))
}

/// `GET /files`: merge paged listings across the requested accounts
/// (`id_group` empty ≡ every active account).
pub async fn list(
    store: &Store,
    clients: &dyn ClientFactory,
    id_group: &[Uuid],
    prefix: &str,
    cursor: Option<&str>,
    limit: i32,
) -> Result<FilesListResponse, RestError> {
    let accounts = store.list_accounts();
    let cursors = decode_cursor(cursor);
    let client_for = |account: &fileflow_core::Account| clients.client_for(account);
    let results = fileflow_aggregator::list_files(&accounts, &client_for, id_group, prefix, &cursors, limit).await;
    let next_cursor = encode_cursor(&results);
    Ok(FilesListResponse {
        accounts: results.into_iter().map(AccountFilesDto::from).collect(),
        next_cursor,
    })
}

/// `POST /upload`: stream the decoded multipart body to the selected (or
/// explicit) account and schedule its expiration, if any applies.
pub async fn upload(store: &Store, clients: &dyn ClientFactory, request: UploadRequest) -> Result<UploadOutcome, RestError> {
    let outcome = upload_file(
        store,
        |account| Box::new(clients.client_for(account)) as Box<dyn UpstreamClient>,
        request,
    )
    .await?;
    Ok(outcome)
}

/// `DELETE /file`: delete one object by `(account_id, key)`. A missing key
/// upstream is treated as already-deleted (idempotent success).
pub async fn delete_file(store: &Store, clients: &dyn ClientFactory, account_id: Uuid, key: &str) -> Result<(), RestError> {
    let account = store.get_account(account_id).ok_or_else(|| RestError::NotFound(format!("account {account_id}")))?;
    let client = clients.client_for(&account);
    match client.delete_object(key).await {
        Ok(()) => Ok(()),
        Err(fileflow_core::FileFlowError::Upstream(fileflow_core::UpstreamError::NotFound(_))) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// `GET /link`: resolve the public URL for `(account_id, key)` without
/// touching the upstream.
pub async fn link(store: &Store, account_id: Uuid, key: &str) -> Result<LinkResponse, RestError> {
    let account = store.get_account(account_id).ok_or_else(|| RestError::NotFound(format!("account {account_id}")))?;
    let settings = store.settings();
    Ok(LinkResponse { url: fileflow_aggregator::build_url(&account, key, &settings) })
}

pub async fn list_expirations(store: &Store) -> Result<Vec<FileExpiration>, RestError> {
    Ok(store.list_file_expirations())
}

pub async fn delete_expiration(store: &Store, id: Uuid) -> Result<(), RestError> {
    Ok(store.delete_file_expiration(id).await?)
}

/// Build an [`UploadRequest`] from the decoded multipart form, defaulting
/// `plane` to [`Plane::Api`] (the REST `/upload` endpoint).
#[must_use]
pub fn build_upload_request(
    body: bytes::Bytes,
    content_type: Option<String>,
    original_filename: String,
    path_prefix: Option<String>,
    account_id: Option<Uuid>,
    expiration_days: Option<i64>,
) -> UploadRequest {
    UploadRequest {
        body,
        content_type,
        original_filename,
        path_prefix,
        account_id,
        expiration_days,
        plane: Plane::Api,
    }
}
