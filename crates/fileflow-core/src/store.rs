//! The coarse-grained, RW-locked in-memory snapshot.
//!
//! A single [`Data`] value guarded by one `RwLock`. Reads take a read-lock
//! and return a deep-enough copy (`Vec` clone) so callers may iterate
//! without races. Mutations take the write-lock, apply in place, clone the
//! resulting snapshot, release the lock, then persist outside of it — no
//! handler ever holds the lock across the backend's I/O, even though the
//! persisted value is exactly the one produced under the lock.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

use crate::backend::{Backend, Data};
use crate::error::{FileFlowError, FileFlowResult};
use crate::model::{Account, FileExpiration, S3Credential, Settings, Token, WebDavCredential};

/// A single page of a paginated collection.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The items on this page.
    pub items: Vec<T>,
    /// Total items across all pages.
    pub total: usize,
    /// The 1-based page number requested.
    pub page: usize,
    /// The requested page size.
    pub page_size: usize,
    /// Total number of pages.
    pub total_pages: usize,
}

/// Slice `items` into the page described by `page`/`page_size`.
///
/// Defaults: `page`→1, `page_size`→10. An out-of-range page returns empty
/// items but correct totals.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: Option<usize>, page_size: Option<usize>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size.unwrap_or(10).max(1);
    let total = items.len();
    let total_pages = total.div_ceil(page_size).max(1);

    let start = (page - 1) * page_size;
    let page_items = if start >= total {
        Vec::new()
    } else {
        let end = (start + page_size).min(total);
        items[start..end].to_vec()
    };

    Page {
        items: page_items,
        total,
        page,
        page_size,
        total_pages,
    }
}

/// The process-wide in-memory store. Constructed once at startup and
/// threaded into every handler.
pub struct Store {
    data: RwLock<Data>,
    backend: Arc<dyn Backend>,
    reload_tx: watch::Sender<Settings>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

impl Store {
    /// Build a store from an already-loaded dataset and the backend used to
    /// persist future mutations.
    #[must_use]
    pub fn new(initial: Data, backend: Arc<dyn Backend>) -> Self {
        let (reload_tx, _rx) = watch::channel(initial.settings.clone());
        Self {
            data: RwLock::new(initial),
            backend,
            reload_tx,
        }
    }

    /// Subscribe to `Settings` updates; used by the usage-sync scheduler to
    /// hot-reload its ticker interval.
    #[must_use]
    pub fn subscribe_settings(&self) -> watch::Receiver<Settings> {
        self.reload_tx.subscribe()
    }

    async fn persist(&self, snapshot: Data) -> FileFlowResult<()> {
        self.backend
            .save(&snapshot)
            .await
            .map_err(|e| FileFlowError::Storage(e.to_string()))
    }

    // -- Accounts ----------------------------------------------------------

    /// All accounts, in creation order (the aggregator relies on this
    /// ordering being stable).
    #[must_use]
    pub fn list_accounts(&self) -> Vec<Account> {
        self.data.read().accounts.clone()
    }

    /// Look up a single account by id.
    #[must_use]
    pub fn get_account(&self, id: Uuid) -> Option<Account> {
        self.data.read().accounts.iter().find(|a| a.id == id).cloned()
    }

    /// Create a new account; assigns id and timestamps.
    pub async fn create_account(&self, mut account: Account) -> FileFlowResult<Account> {
        let now = Utc::now();
        account.id = Uuid::new_v4();
        account.created_at = now;
        account.updated_at = now;

        let snapshot = {
            let mut data = self.data.write();
            data.accounts.push(account.clone());
            data.clone()
        };
        self.persist(snapshot).await?;
        Ok(account)
    }

    /// Replace an existing account's mutable fields, preserving `created_at`.
    pub async fn update_account(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Account),
    ) -> FileFlowResult<Account> {
        let (updated, snapshot) = {
            let mut data = self.data.write();
            let account = data
                .accounts
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| FileFlowError::NotFound(format!("account {id}")))?;
            f(account);
            account.updated_at = Utc::now();
            (account.clone(), data.clone())
        };
        self.persist(snapshot).await?;
        Ok(updated)
    }

    /// Delete an account. Does **not** cascade to its `FileExpiration`
    /// records; the sweeper fail-softs on orphans.
    pub async fn delete_account(&self, id: Uuid) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            let before = data.accounts.len();
            data.accounts.retain(|a| a.id != id);
            if data.accounts.len() == before {
                return Err(FileFlowError::NotFound(format!("account {id}")));
            }
            data.clone()
        };
        self.persist(snapshot).await
    }

    // -- Tokens --------------------------------------------------------------

    /// All REST API tokens.
    #[must_use]
    pub fn list_tokens(&self) -> Vec<Token> {
        self.data.read().tokens.clone()
    }

    /// Look up a token by its secret value (bearer auth).
    #[must_use]
    pub fn find_token_by_secret(&self, secret: &str) -> Option<Token> {
        self.data.read().tokens.iter().find(|t| t.secret == secret).cloned()
    }

    /// Create a new token; the secret is returned once.
    pub async fn create_token(&self, mut token: Token) -> FileFlowResult<Token> {
        token.id = Uuid::new_v4();
        token.created_at = Utc::now();
        let snapshot = {
            let mut data = self.data.write();
            data.tokens.push(token.clone());
            data.clone()
        };
        self.persist(snapshot).await?;
        Ok(token)
    }

    /// Delete a token by id.
    pub async fn delete_token(&self, id: Uuid) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            let before = data.tokens.len();
            data.tokens.retain(|t| t.id != id);
            if data.tokens.len() == before {
                return Err(FileFlowError::NotFound(format!("token {id}")));
            }
            data.clone()
        };
        self.persist(snapshot).await
    }

    // -- S3 credentials -------------------------------------------------------

    /// All S3-plane credentials.
    #[must_use]
    pub fn list_s3_credentials(&self) -> Vec<S3Credential> {
        self.data.read().s3_credentials.clone()
    }

    /// Look up an active S3 credential by access key id.
    #[must_use]
    pub fn find_s3_credential(&self, access_key_id: &str) -> Option<S3Credential> {
        self.data
            .read()
            .s3_credentials
            .iter()
            .find(|c| c.access_key_id == access_key_id && c.active)
            .cloned()
    }

    /// Create a new S3 credential bound to `account_id`.
    pub async fn create_s3_credential(&self, mut cred: S3Credential) -> FileFlowResult<S3Credential> {
        cred.id = Uuid::new_v4();
        cred.created_at = Utc::now();
        let snapshot = {
            let mut data = self.data.write();
            data.s3_credentials.push(cred.clone());
            data.clone()
        };
        self.persist(snapshot).await?;
        Ok(cred)
    }

    /// Record that a credential was just used to authenticate a request.
    /// Called asynchronously (fire-and-forget from the caller's
    /// perspective) so the request hot path never waits on a store write.
    pub async fn touch_s3_credential_last_used(&self, access_key_id: &str) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            let Some(cred) = data
                .s3_credentials
                .iter_mut()
                .find(|c| c.access_key_id == access_key_id)
            else {
                return Ok(());
            };
            cred.last_used_at = Some(Utc::now());
            data.clone()
        };
        self.persist(snapshot).await
    }

    /// Delete an S3 credential by id.
    pub async fn delete_s3_credential(&self, id: Uuid) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            let before = data.s3_credentials.len();
            data.s3_credentials.retain(|c| c.id != id);
            if data.s3_credentials.len() == before {
                return Err(FileFlowError::NotFound(format!("s3 credential {id}")));
            }
            data.clone()
        };
        self.persist(snapshot).await
    }

    // -- WebDAV credentials ---------------------------------------------------

    /// All WebDAV-plane credentials.
    #[must_use]
    pub fn list_webdav_credentials(&self) -> Vec<WebDavCredential> {
        self.data.read().webdav_credentials.clone()
    }

    /// Look up an active WebDAV credential by username.
    #[must_use]
    pub fn find_webdav_credential(&self, username: &str) -> Option<WebDavCredential> {
        self.data
            .read()
            .webdav_credentials
            .iter()
            .find(|c| c.username == username && c.active)
            .cloned()
    }

    /// Create a new WebDAV credential. Usernames are globally unique.
    pub async fn create_webdav_credential(
        &self,
        mut cred: WebDavCredential,
    ) -> FileFlowResult<WebDavCredential> {
        cred.id = Uuid::new_v4();
        cred.created_at = Utc::now();
        let snapshot = {
            let mut data = self.data.write();
            if data.webdav_credentials.iter().any(|c| c.username == cred.username) {
                return Err(FileFlowError::Conflict(format!(
                    "webdav username {} already in use",
                    cred.username
                )));
            }
            data.webdav_credentials.push(cred.clone());
            data.clone()
        };
        self.persist(snapshot).await?;
        Ok(cred)
    }

    /// Delete a WebDAV credential by id.
    pub async fn delete_webdav_credential(&self, id: Uuid) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            let before = data.webdav_credentials.len();
            data.webdav_credentials.retain(|c| c.id != id);
            if data.webdav_credentials.len() == before {
                return Err(FileFlowError::NotFound(format!("webdav credential {id}")));
            }
            data.clone()
        };
        self.persist(snapshot).await
    }

    // -- File expirations -----------------------------------------------------

    /// All scheduled deletions.
    #[must_use]
    pub fn list_file_expirations(&self) -> Vec<FileExpiration> {
        self.data.read().file_expirations.clone()
    }

    /// Expirations due at or before `now`, for the expiration scheduler's
    /// sweep.
    #[must_use]
    pub fn due_file_expirations(&self, now: chrono::DateTime<Utc>) -> Vec<FileExpiration> {
        self.data
            .read()
            .file_expirations
            .iter()
            .filter(|e| e.expires_at <= now)
            .cloned()
            .collect()
    }

    /// Upsert by `(account_id, file_key)`: replaces `expires_at` and returns
    /// the existing id if a record is already present, otherwise creates a
    /// new one.
    pub async fn upsert_file_expiration(
        &self,
        account_id: Uuid,
        file_key: &str,
        expires_at: chrono::DateTime<Utc>,
    ) -> FileFlowResult<FileExpiration> {
        let (record, snapshot) = {
            let mut data = self.data.write();
            if let Some(existing) = data
                .file_expirations
                .iter_mut()
                .find(|e| e.account_id == account_id && e.file_key == file_key)
            {
                existing.expires_at = expires_at;
                (existing.clone(), data.clone())
            } else {
                let record = FileExpiration {
                    id: Uuid::new_v4(),
                    account_id,
                    file_key: file_key.to_owned(),
                    expires_at,
                    created_at: Utc::now(),
                };
                data.file_expirations.push(record.clone());
                (record, data.clone())
            }
        };
        self.persist(snapshot).await?;
        Ok(record)
    }

    /// Remove a file expiration record by id. Missing id is a no-op
    /// success.
    pub async fn delete_file_expiration(&self, id: Uuid) -> FileFlowResult<()> {
        let snapshot = {
            let mut data = self.data.write();
            data.file_expirations.retain(|e| e.id != id);
            data.clone()
        };
        self.persist(snapshot).await
    }

    // -- Settings --------------------------------------------------------------

    /// The current settings snapshot.
    #[must_use]
    pub fn settings(&self) -> Settings {
        self.data.read().settings.clone()
    }

    /// Apply `f` to the settings, normalize the result, persist, and
    /// publish a reload signal for the schedulers.
    pub async fn update_settings(
        &self,
        f: impl FnOnce(&mut Settings),
    ) -> FileFlowResult<Settings> {
        let (updated, snapshot) = {
            let mut data = self.data.write();
            f(&mut data.settings);
            data.settings.normalize();
            data.settings.updated_at = Utc::now();
            (data.settings.clone(), data.clone())
        };
        self.persist(snapshot).await?;
        let _ = self.reload_tx.send(updated.clone());
        Ok(updated)
    }

    // -- Usage sync ------------------------------------------------------------

    /// Write back a refreshed usage snapshot for one account.
    pub async fn update_account_usage(
        &self,
        account_id: Uuid,
        size_bytes: i64,
        class_a_ops: i64,
        class_b_ops: i64,
    ) -> FileFlowResult<()> {
        self.update_account(account_id, |a| {
            a.usage.size_bytes = size_bytes;
            a.usage.class_a_ops = class_a_ops;
            a.usage.class_b_ops = class_b_ops;
            a.usage.last_sync_at = Some(Utc::now());
        })
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        saved: Mutex<Vec<Data>>,
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn init(&self) -> FileFlowResult<()> {
            Ok(())
        }
        async fn load(&self) -> FileFlowResult<Data> {
            Ok(Data::default())
        }
        async fn save(&self, data: &Data) -> FileFlowResult<()> {
            self.saved.lock().unwrap().push(data.clone());
            Ok(())
        }
        async fn close(&self) -> FileFlowResult<()> {
            Ok(())
        }
    }

    fn test_account(name: &str) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::nil(),
            name: name.to_owned(),
            active: true,
            upstream_account_id: "a".into(),
            access_key_id: "ak".into(),
            secret_access_key: "sk".into(),
            bucket_name: "bucket".into(),
            endpoint_url: "https://example.com".into(),
            public_domain: "example.com".into(),
            analytics_token: None,
            quota: crate::model::Quota {
                max_size_bytes: 1000,
                max_class_a_ops: 100,
            },
            usage: crate::model::Usage::default(),
            capabilities: crate::model::Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_account_assigns_id_and_persists() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::default());
        let store = Store::new(Data::default(), backend);
        let created = store.create_account(test_account("A")).await.unwrap();
        assert_ne!(created.id, Uuid::nil());
        assert_eq!(store.list_accounts().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_account_does_not_cascade_expirations() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::default());
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A")).await.unwrap();
        store
            .upsert_file_expiration(account.id, "k", Utc::now())
            .await
            .unwrap();
        store.delete_account(account.id).await.unwrap();
        assert_eq!(store.list_file_expirations().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_file_expiration_replaces_existing() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::default());
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A")).await.unwrap();
        let first = store
            .upsert_file_expiration(account.id, "k", Utc::now())
            .await
            .unwrap();
        let later = Utc::now() + chrono::Duration::days(1);
        let second = store.upsert_file_expiration(account.id, "k", later).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_file_expirations().len(), 1);
        assert_eq!(store.list_file_expirations()[0].expires_at, later);
    }

    #[tokio::test]
    async fn test_webdav_username_uniqueness_enforced() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::default());
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A")).await.unwrap();
        let cred = WebDavCredential {
            id: Uuid::nil(),
            username: "dup".into(),
            password: "x".into(),
            account_id: account.id,
            description: String::new(),
            permissions: crate::model::PermissionSet::default(),
            active: true,
            created_at: Utc::now(),
            last_used_at: None,
        };
        store.create_webdav_credential(cred.clone()).await.unwrap();
        let err = store.create_webdav_credential(cred).await.unwrap_err();
        assert!(matches!(err, FileFlowError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_settings_update_publishes_reload() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::default());
        let store = Store::new(Data::default(), backend);
        let mut rx = store.subscribe_settings();
        store
            .update_settings(|s| s.sync_interval_minutes = 2)
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().sync_interval_minutes, 2);
    }

    #[test]
    fn test_paginate_out_of_range_page_returns_empty_with_correct_totals() {
        let items: Vec<i32> = (0..25).collect();
        let page = paginate(&items, Some(10), Some(10));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_paginate_defaults() {
        let items: Vec<i32> = (0..5).collect();
        let page = paginate(&items, None, None);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 10);
        assert_eq!(page.items.len(), 5);
    }
}
