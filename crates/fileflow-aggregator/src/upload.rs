//! Upload orchestrator: key selection, target-account selection, streaming
//! the body to the upstream, and scheduling the file's expiration.

use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use fileflow_core::{Account, FileFlowError, FileFlowResult, Plane, Settings, Store, pick_automatic_upload_target};

use crate::upstream::UpstreamClient;

/// What the caller wants uploaded and where.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub original_filename: String,
    /// Caller-supplied logical directory; `None` means auto-generate a
    /// dated key.
    pub path_prefix: Option<String>,
    /// Explicit target account; `None` triggers automatic selection.
    pub account_id: Option<Uuid>,
    /// Explicit expiration window in days; `None` falls back to
    /// `Settings.default_expiration_days`. `0` or negative means permanent.
    pub expiration_days: Option<i64>,
    /// The plane the upload request arrived on, used for capability checks.
    pub plane: Plane,
}

/// The result of a successful upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub id: Uuid,
    pub account_name: String,
    pub key: String,
    pub size: i64,
    pub url: String,
}

fn clean_path_segment(prefix: &str) -> String {
    prefix.trim_matches('/').to_owned()
}

fn dated_key(original_filename: &str) -> String {
    let now = Utc::now();
    let ext = std::path::Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    format!("{}/{}{ext}", now.format("%Y/%m/%d"), Uuid::new_v4())
}

fn select_key(request: &UploadRequest) -> String {
    match &request.path_prefix {
        Some(prefix) if !prefix.trim().is_empty() => {
            format!("{}/{}", clean_path_segment(prefix), request.original_filename)
        }
        _ => dated_key(&request.original_filename),
    }
}

fn select_target(store: &Store, request: &UploadRequest) -> FileFlowResult<Account> {
    let accounts = store.list_accounts();
    match request.account_id {
        Some(id) => {
            let account = accounts
                .into_iter()
                .find(|a| a.id == id)
                .ok_or_else(|| FileFlowError::NotFound(format!("account {id}")))?;
            if !account.is_available_for(request.plane) {
                return Err(FileFlowError::NoAvailableAccount);
            }
            Ok(account)
        }
        None => pick_automatic_upload_target(&accounts, request.plane),
    }
}

fn effective_expiration_days(request: &UploadRequest, settings: &Settings) -> i64 {
    request.expiration_days.unwrap_or(settings.default_expiration_days)
}

/// The public URL a client should use for `key` on `account`, honoring
/// `Settings.endpoint_proxy` to hide the upstream host when enabled.
#[must_use]
pub fn build_url(account: &Account, key: &str, settings: &Settings) -> String {
    if settings.endpoint_proxy && !settings.endpoint_proxy_url.is_empty() {
        let base = settings.endpoint_proxy_url.trim_end_matches('/');
        format!("{base}/{}/{key}", account.public_subdomain())
    } else {
        format!("{}/{key}", account.public_domain.trim_end_matches('/'))
    }
}

/// Upload `request.body` to the selected account and, if an expiration
/// window applies, schedule its deletion.
///
/// # Errors
/// Returns [`FileFlowError::NotFound`] if an explicit `account_id` doesn't
/// exist, [`FileFlowError::NoAvailableAccount`] if no account is eligible,
/// or [`FileFlowError::Upstream`] if the `PutObject` call fails.
pub async fn upload_file(
    store: &Store,
    client_for: impl FnOnce(&Account) -> Box<dyn UpstreamClient>,
    request: UploadRequest,
) -> FileFlowResult<UploadOutcome> {
    let account = select_target(store, &request)?;
    let key = select_key(&request);
    let settings = store.settings();

    let client = client_for(&account);
    let summary = client
        .put_object(&key, request.body.clone(), request.content_type.as_deref())
        .await?;

    let expiration_days = effective_expiration_days(&request, &settings);
    if expiration_days > 0 {
        let expires_at = Utc::now() + chrono::Duration::days(expiration_days);
        if let Err(err) = store.upsert_file_expiration(account.id, &key, expires_at).await {
            tracing::warn!(account = %account.name, %key, error = %err, "failed to record file expiration; upload still succeeded");
        }
    }

    Ok(UploadOutcome {
        id: Uuid::new_v4(),
        account_name: account.name.clone(),
        key: key.clone(),
        size: summary.size,
        url: build_url(&account, &key, &settings),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ListPage, ObjectBody, ObjectSummary, UploadedPart, UsageSnapshot};
    use async_trait::async_trait;
    use fileflow_core::{Backend, Capabilities, Data, Quota, Usage};
    use std::sync::Arc;

    struct FakeBackend;
    #[async_trait]
    impl Backend for FakeBackend {
        async fn init(&self) -> FileFlowResult<()> {
            Ok(())
        }
        async fn load(&self) -> FileFlowResult<Data> {
            Ok(Data::default())
        }
        async fn save(&self, _data: &Data) -> FileFlowResult<()> {
            Ok(())
        }
        async fn close(&self) -> FileFlowResult<()> {
            Ok(())
        }
    }

    struct FakeClient;
    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn list_objects_v2(&self, _: &str, _: Option<&str>, _: i32) -> FileFlowResult<ListPage> {
            unimplemented!()
        }
        async fn put_object(&self, key: &str, body: Bytes, _: Option<&str>) -> FileFlowResult<ObjectSummary> {
            Ok(ObjectSummary {
                key: key.to_owned(),
                size: body.len() as i64,
                last_modified: Some(Utc::now()),
                etag: Some("etag".into()),
            })
        }
        async fn get_object(&self, _: &str, _: Option<&str>) -> FileFlowResult<ObjectBody> {
            unimplemented!()
        }
        async fn head_object(&self, _: &str) -> FileFlowResult<ObjectSummary> {
            unimplemented!()
        }
        async fn delete_object(&self, _: &str) -> FileFlowResult<()> {
            unimplemented!()
        }
        async fn delete_objects(&self, _: &[String]) -> FileFlowResult<Vec<String>> {
            unimplemented!()
        }
        async fn copy_object(&self, _: &str, _: &str) -> FileFlowResult<ObjectSummary> {
            unimplemented!()
        }
        async fn create_multipart_upload(&self, _: &str, _: Option<&str>) -> FileFlowResult<String> {
            unimplemented!()
        }
        async fn upload_part(&self, _: &str, _: &str, _: i32, _: Bytes) -> FileFlowResult<UploadedPart> {
            unimplemented!()
        }
        async fn complete_multipart_upload(&self, _: &str, _: &str, _: &[(i32, String)]) -> FileFlowResult<ObjectSummary> {
            unimplemented!()
        }
        async fn abort_multipart_upload(&self, _: &str, _: &str) -> FileFlowResult<()> {
            unimplemented!()
        }
        async fn query_usage(&self, _: &str) -> FileFlowResult<UsageSnapshot> {
            unimplemented!()
        }
    }

    fn test_account(name: &str) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            active: true,
            upstream_account_id: "a".into(),
            access_key_id: "ak".into(),
            secret_access_key: "sk".into(),
            bucket_name: "bucket".into(),
            endpoint_url: "https://example.com".into(),
            public_domain: "files.example.com".into(),
            analytics_token: None,
            quota: Quota {
                max_size_bytes: 1_000_000,
                max_class_a_ops: 1000,
            },
            usage: Usage::default(),
            capabilities: Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn store_with_account(name: &str) -> (Store, Account) {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account(name)).await.unwrap();
        (store, account)
    }

    #[tokio::test]
    async fn test_upload_with_explicit_path_prefix_builds_flat_key() {
        let (store, account) = store_with_account("A").await;
        let request = UploadRequest {
            body: Bytes::from_static(b"hello"),
            content_type: Some("text/plain".into()),
            original_filename: "notes.txt".into(),
            path_prefix: Some("/docs/2026/".into()),
            account_id: Some(account.id),
            expiration_days: None,
            plane: Plane::Api,
        };
        let outcome = upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert_eq!(outcome.key, "docs/2026/notes.txt");
        assert_eq!(outcome.size, 5);
        assert_eq!(outcome.url, "files.example.com/docs/2026/notes.txt");
    }

    #[tokio::test]
    async fn test_upload_without_path_prefix_uses_dated_key() {
        let (store, account) = store_with_account("A").await;
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "photo.png".into(),
            path_prefix: None,
            account_id: Some(account.id),
            expiration_days: None,
            plane: Plane::Api,
        };
        let outcome = upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert!(outcome.key.ends_with(".png"));
        assert_eq!(outcome.key.matches('/').count(), 3);
    }

    #[tokio::test]
    async fn test_upload_schedules_expiration_when_days_positive() {
        let (store, account) = store_with_account("A").await;
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "f.txt".into(),
            path_prefix: Some("d".into()),
            account_id: Some(account.id),
            expiration_days: Some(7),
            plane: Plane::Api,
        };
        upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert_eq!(store.list_file_expirations().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_skips_expiration_when_effective_days_zero() {
        let (store, account) = store_with_account("A").await;
        store.update_settings(|s| s.default_expiration_days = 0).await.unwrap();
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "f.txt".into(),
            path_prefix: Some("d".into()),
            account_id: Some(account.id),
            expiration_days: None,
            plane: Plane::Api,
        };
        upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert!(store.list_file_expirations().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_explicit_account_without_capability() {
        let (store, account) = store_with_account("A").await;
        store
            .update_account(account.id, |a| a.capabilities.api_upload = false)
            .await
            .unwrap();
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "f.txt".into(),
            path_prefix: Some("d".into()),
            account_id: Some(account.id),
            expiration_days: None,
            plane: Plane::Api,
        };
        let err = upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap_err();
        assert!(matches!(err, FileFlowError::NoAvailableAccount));
    }

    #[tokio::test]
    async fn test_upload_auto_selects_when_no_account_supplied() {
        let (store, _account) = store_with_account("A").await;
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "f.txt".into(),
            path_prefix: Some("d".into()),
            account_id: None,
            expiration_days: None,
            plane: Plane::Auto,
        };
        let outcome = upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert_eq!(outcome.account_name, "A");
    }

    #[tokio::test]
    async fn test_upload_uses_proxy_url_when_endpoint_proxy_enabled() {
        let (store, account) = store_with_account("A").await;
        store
            .update_settings(|s| {
                s.endpoint_proxy = true;
                s.endpoint_proxy_url = "https://proxy.example.com".into();
            })
            .await
            .unwrap();
        let request = UploadRequest {
            body: Bytes::from_static(b"x"),
            content_type: None,
            original_filename: "f.txt".into(),
            path_prefix: Some("d".into()),
            account_id: Some(account.id),
            expiration_days: None,
            plane: Plane::Api,
        };
        let outcome = upload_file(&store, |_| Box::new(FakeClient), request).await.unwrap();
        assert_eq!(outcome.url, "https://proxy.example.com/files/d/f.txt");
    }
}
