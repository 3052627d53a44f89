//! Account CRUD, manual usage sync, bucket clear, and bulk old-file
//! deletion.

use chrono::{NaiveDate, TimeZone, Utc};
use fileflow_core::{Account, Capabilities, Store, Usage};
use uuid::Uuid;

use crate::dto::{AccountCreateRequest, AccountUpdateRequest, ClearResponse, DeleteOldFilesRequest, DeleteOldFilesResponse, SyncRequest};
use crate::error::RestError;
use crate::service::ClientFactory;

pub async fn list(store: &Store) -> Result<Vec<Account>, RestError> {
    Ok(store.list_accounts())
}

pub async fn get(store: &Store, id: Uuid) -> Result<Account, RestError> {
    store.get_account(id).ok_or_else(|| RestError::NotFound(format!("account {id}")))
}

pub async fn create(store: &Store, req: AccountCreateRequest) -> Result<Account, RestError> {
    let now = Utc::now();
    let account = Account {
        id: Uuid::nil(),
        name: req.name,
        active: req.active,
        upstream_account_id: req.upstream_account_id,
        access_key_id: req.access_key_id,
        secret_access_key: req.secret_access_key,
        bucket_name: req.bucket_name,
        endpoint_url: req.endpoint_url,
        public_domain: req.public_domain,
        analytics_token: req.analytics_token,
        quota: req.quota,
        usage: Usage::default(),
        capabilities: req.capabilities.unwrap_or_else(Capabilities::default),
        created_at: now,
        updated_at: now,
    };
    Ok(store.create_account(account).await?)
}

pub async fn update(store: &Store, id: Uuid, req: AccountUpdateRequest) -> Result<Account, RestError> {
    Ok(store
        .update_account(id, |account| {
            if let Some(name) = req.name {
                account.name = name;
            }
            if let Some(active) = req.active {
                account.active = active;
            }
            if let Some(v) = req.access_key_id {
                account.access_key_id = v;
            }
            if let Some(v) = req.secret_access_key {
                account.secret_access_key = v;
            }
            if let Some(v) = req.bucket_name {
                account.bucket_name = v;
            }
            if let Some(v) = req.endpoint_url {
                account.endpoint_url = v;
            }
            if let Some(v) = req.public_domain {
                account.public_domain = v;
            }
            if req.analytics_token.is_some() {
                account.analytics_token = req.analytics_token;
            }
            if let Some(v) = req.quota {
                account.quota = v;
            }
            if let Some(v) = req.capabilities {
                account.capabilities = v;
            }
        })
        .await?)
}

pub async fn delete(store: &Store, id: Uuid) -> Result<(), RestError> {
    Ok(store.delete_account(id).await?)
}

/// Run one usage-sync pass for the requested accounts (empty ≡ all
/// accounts with an analytics token), synchronously, returning the
/// refreshed snapshots. Mirrors the background scheduler's per-account
/// loop but scoped and awaited rather than run on a timer.
pub async fn sync(store: &Store, clients: &dyn ClientFactory, req: SyncRequest) -> Result<Vec<Account>, RestError> {
    let targets: Vec<Account> = store
        .list_accounts()
        .into_iter()
        .filter(|a| req.account_ids.is_empty() || req.account_ids.contains(&a.id))
        .collect();

    for account in &targets {
        let Some(token) = account.analytics_token.clone() else { continue };
        let client = clients.client_for(account);
        match client.query_usage(&token).await {
            Ok(usage) => {
                if let Err(err) = store
                    .update_account_usage(account.id, usage.size_bytes, usage.class_a_ops, usage.class_b_ops)
                    .await
                {
                    tracing::warn!(account = %account.name, error = %err, "failed to persist refreshed usage");
                }
            }
            Err(err) => tracing::warn!(account = %account.name, error = %err, "usage query failed"),
        }
    }

    let ids: Vec<Uuid> = targets.iter().map(|a| a.id).collect();
    Ok(store.list_accounts().into_iter().filter(|a| ids.contains(&a.id)).collect())
}

/// Delete every object in the account's bucket.
pub async fn clear(store: &Store, clients: &dyn ClientFactory, id: Uuid) -> Result<ClearResponse, RestError> {
    let account = get(store, id).await?;
    let client = clients.client_for(&account);
    let keys = collect_all_keys(client.as_ref()).await?;
    let deleted = keys.len();
    delete_in_batches(client.as_ref(), &keys).await?;
    Ok(ClearResponse { deleted })
}

/// Delete every object across the requested accounts (empty ≡ all) whose
/// `lastModified` is at or before the end of `beforeDate` (UTC).
pub async fn delete_old_files(
    store: &Store,
    clients: &dyn ClientFactory,
    req: DeleteOldFilesRequest,
) -> Result<DeleteOldFilesResponse, RestError> {
    let cutoff = end_of_day_utc(&req.before_date)?;

    let targets: Vec<Account> = store
        .list_accounts()
        .into_iter()
        .filter(|a| req.account_ids.is_empty() || req.account_ids.contains(&a.id))
        .collect();

    let mut deleted = 0usize;
    for account in &targets {
        let client = clients.client_for(account);
        let old_keys = collect_keys_before(client.as_ref(), cutoff).await?;
        deleted += old_keys.len();
        delete_in_batches(client.as_ref(), &old_keys).await?;
    }
    Ok(DeleteOldFilesResponse { deleted })
}

fn end_of_day_utc(date: &str) -> Result<chrono::DateTime<Utc>, RestError> {
    let naive = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| RestError::BadRequest(format!("invalid beforeDate: {date}")))?;
    let end = naive.and_hms_opt(23, 59, 59).expect("23:59:59 is always valid");
    Ok(Utc.from_utc_datetime(&end))
}

async fn collect_all_keys(client: &dyn fileflow_aggregator::UpstreamClient) -> Result<Vec<String>, RestError> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = client.list_objects_v2("", cursor.as_deref(), 1000).await?;
        out.extend(page.objects.into_iter().map(|o| o.key));
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(out)
}

async fn collect_keys_before(
    client: &dyn fileflow_aggregator::UpstreamClient,
    cutoff: chrono::DateTime<Utc>,
) -> Result<Vec<String>, RestError> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = client.list_objects_v2("", cursor.as_deref(), 1000).await?;
        out.extend(
            page.objects
                .into_iter()
                .filter(|o| o.last_modified.is_some_and(|lm| lm <= cutoff))
                .map(|o| o.key),
        );
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(out)
}

async fn delete_in_batches(client: &dyn fileflow_aggregator::UpstreamClient, keys: &[String]) -> Result<(), RestError> {
    for chunk in keys.chunks(1000) {
        client.delete_objects(chunk).await?;
    }
    Ok(())
}
