//! Cross-account listing aggregation.
//!
//! Merges per-account `ListObjectsV2` pages into one response ordered by
//! account-creation order. A failure against one account never aborts the
//! whole listing — the account is simply omitted and the error logged,
//! since a client paging through ten buckets should not see the whole
//! request fail because one provider is briefly unreachable.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use fileflow_core::Account;

use crate::upstream::UpstreamClient;

/// One file or directory entry under the requested prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub is_dir: bool,
    pub name: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One account's contribution to a merged listing.
#[derive(Debug, Clone)]
pub struct AccountFiles {
    pub account_id: Uuid,
    pub account_name: String,
    pub files: Vec<FileEntry>,
    pub size_bytes: i64,
    pub max_size: i64,
    pub next_cursor: Option<String>,
}

/// List `prefix` across `account_ids` (empty ≡ every active account),
/// paging each account independently using its entry in `cursors`.
/// `client_for` builds (or looks up) the upstream client for one account;
/// callers typically cache these per-account rather than reconnecting on
/// every call.
pub async fn list_files(
    accounts: &[Account],
    client_for: &dyn Fn(&Account) -> Arc<dyn UpstreamClient>,
    account_ids: &[Uuid],
    prefix: &str,
    cursors: &HashMap<Uuid, String>,
    limit: i32,
) -> Vec<AccountFiles> {
    let limit = limit.clamp(1, 100);
    let targets: Vec<&Account> = if account_ids.is_empty() {
        accounts.iter().filter(|a| a.active).collect()
    } else {
        accounts.iter().filter(|a| account_ids.contains(&a.id)).collect()
    };

    let mut out = Vec::with_capacity(targets.len());
    for account in targets {
        let client = client_for(account);
        let cursor = cursors.get(&account.id).map(String::as_str);
        match client.list_objects_v2(prefix, cursor, limit).await {
            Ok(page) => {
                let mut files: Vec<FileEntry> = page
                    .prefixes
                    .iter()
                    .map(|p| FileEntry {
                        is_dir: true,
                        name: relative_name(p, prefix),
                        size: 0,
                        last_modified: None,
                    })
                    .collect();
                files.extend(page.objects.into_iter().filter(|o| o.key != prefix).map(|o| {
                    FileEntry {
                        is_dir: false,
                        name: relative_name(&o.key, prefix),
                        size: o.size,
                        last_modified: o.last_modified,
                    }
                }));
                out.push(AccountFiles {
                    account_id: account.id,
                    account_name: account.name.clone(),
                    files,
                    size_bytes: account.usage.size_bytes,
                    max_size: account.quota.max_size_bytes,
                    next_cursor: page.next_cursor,
                });
            }
            Err(error) => {
                tracing::warn!(
                    account_id = %account.id,
                    account = %account.name,
                    %error,
                    "aggregator: skipping account after listing failure"
                );
            }
        }
    }
    out
}

fn relative_name(key: &str, prefix: &str) -> String {
    key.strip_prefix(prefix)
        .unwrap_or(key)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(key)
        .to_owned()
}
