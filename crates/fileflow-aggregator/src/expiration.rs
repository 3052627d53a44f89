//! Expiration scheduler: deletes objects whose scheduled lifetime has
//! elapsed and retires their `FileExpiration` record.

use std::sync::Arc;
use std::time::Duration;

use fileflow_core::{Account, FileFlowError, Store, UpstreamError};

use crate::upstream::UpstreamClient;

/// Run one sweep: snapshot due expirations, delete each upstream object,
/// and retire the record on success or "already gone". Records that fail
/// for any other reason are left for the next cycle.
pub async fn run_expiration_tick(store: &Store, client_for: impl Fn(&Account) -> Box<dyn UpstreamClient>) {
    let now = chrono::Utc::now();
    for expiration in store.due_file_expirations(now) {
        let Some(account) = store.get_account(expiration.account_id) else {
            tracing::warn!(expiration_id = %expiration.id, "file expiration references a missing account; dropping");
            if let Err(err) = store.delete_file_expiration(expiration.id).await {
                tracing::warn!(expiration_id = %expiration.id, error = %err, "failed to drop orphaned expiration record");
            }
            continue;
        };

        let client = client_for(&account);
        let outcome = client.delete_object(&expiration.file_key).await;
        let should_retire = match outcome {
            Ok(()) => true,
            Err(FileFlowError::Upstream(UpstreamError::NotFound(_))) => true,
            Err(err) => {
                tracing::warn!(
                    account = %account.name,
                    key = %expiration.file_key,
                    error = %err,
                    "expiration delete failed; retrying next cycle"
                );
                false
            }
        };

        if should_retire {
            if let Err(err) = store.delete_file_expiration(expiration.id).await {
                tracing::warn!(expiration_id = %expiration.id, error = %err, "failed to retire expiration record");
            }
        }
    }
}

/// Spawn the background expiration ticker. Exits when `store` is dropped.
/// Restarts itself with a new interval whenever
/// `Settings.expiration_check_minutes` changes, mirroring the usage-sync
/// scheduler's hot-reload loop so the two never share a ticker.
pub fn spawn_expiration_scheduler(
    store: Arc<Store>,
    client_for: impl Fn(&Account) -> Box<dyn UpstreamClient> + Send + Sync + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut settings_rx = store.subscribe_settings();
        let mut interval_minutes = settings_rx.borrow().expiration_check_minutes;

        loop {
            let mut ticker = tokio::time::interval(Duration::from_secs((interval_minutes.max(1) as u64) * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; skip it

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_expiration_tick(&store, &client_for).await;
                    }
                    changed = settings_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let new_interval = settings_rx.borrow().expiration_check_minutes;
                        if new_interval != interval_minutes {
                            interval_minutes = new_interval;
                            break;
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ListPage, ObjectBody, ObjectSummary, UploadedPart, UsageSnapshot};
    use async_trait::async_trait;
    use bytes::Bytes;
    use fileflow_core::{Backend, Data, FileFlowResult, Quota, Usage};
    use std::sync::Arc;
    use uuid::Uuid;

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

    enum DeleteBehavior {
        Success,
        NotFound,
        Retryable,
    }

    struct FakeClient {
        behavior: DeleteBehavior,
    }

    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn list_objects_v2(&self, _: &str, _: Option<&str>, _: i32) -> FileFlowResult<ListPage> {
            unimplemented!()
        }
        async fn put_object(&self, _: &str, _: Bytes, _: Option<&str>) -> FileFlowResult<ObjectSummary> {
            unimplemented!()
        }
        async fn get_object(&self, _: &str, _: Option<&str>) -> FileFlowResult<ObjectBody> {
            unimplemented!()
        }
        async fn head_object(&self, _: &str) -> FileFlowResult<ObjectSummary> {
            unimplemented!()
        }
        async fn delete_object(&self, _: &str) -> FileFlowResult<()> {
            match self.behavior {
                DeleteBehavior::Success => Ok(()),
                DeleteBehavior::NotFound => Err(FileFlowError::Upstream(UpstreamError::NotFound("gone".into()))),
                DeleteBehavior::Retryable => Err(FileFlowError::Upstream(UpstreamError::Retryable("boom".into()))),
            }
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
        let now = chrono::Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            active: true,
            upstream_account_id: "a".into(),
            access_key_id: "ak".into(),
            secret_access_key: "sk".into(),
            bucket_name: "bucket".into(),
            endpoint_url: "https://example.com".into(),
            public_domain: "example.com".into(),
            analytics_token: None,
            quota: Quota {
                max_size_bytes: 1000,
                max_class_a_ops: 100,
            },
            usage: Usage::default(),
            capabilities: fileflow_core::Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn store_with_due_expiration(behavior: DeleteBehavior) -> (Store, DeleteBehavior) {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A")).await.unwrap();
        store
            .upsert_file_expiration(account.id, "k.txt", chrono::Utc::now() - chrono::Duration::seconds(1))
            .await
            .unwrap();
        (store, behavior)
    }

    #[tokio::test]
    async fn test_successful_delete_retires_record() {
        let (store, behavior) = store_with_due_expiration(DeleteBehavior::Success).await;
        run_expiration_tick(&store, |_| Box::new(FakeClient { behavior: match behavior {
            DeleteBehavior::Success => DeleteBehavior::Success,
            DeleteBehavior::NotFound => DeleteBehavior::NotFound,
            DeleteBehavior::Retryable => DeleteBehavior::Retryable,
        }})).await;
        assert!(store.list_file_expirations().is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_treated_as_already_deleted() {
        let (store, _behavior) = store_with_due_expiration(DeleteBehavior::NotFound).await;
        run_expiration_tick(&store, |_| Box::new(FakeClient { behavior: DeleteBehavior::NotFound })).await;
        assert!(store.list_file_expirations().is_empty());
    }

    #[tokio::test]
    async fn test_other_errors_keep_record_for_next_cycle() {
        let (store, _behavior) = store_with_due_expiration(DeleteBehavior::Retryable).await;
        run_expiration_tick(&store, |_| Box::new(FakeClient { behavior: DeleteBehavior::Retryable })).await;
        assert_eq!(store.list_file_expirations().len(), 1);
    }

    #[tokio::test]
    async fn test_not_yet_due_expirations_are_left_alone() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A")).await.unwrap();
        store
            .upsert_file_expiration(account.id, "future.txt", chrono::Utc::now() + chrono::Duration::days(1))
            .await
            .unwrap();
        run_expiration_tick(&store, |_| Box::new(FakeClient { behavior: DeleteBehavior::Success })).await;
        assert_eq!(store.list_file_expirations().len(), 1);
    }
}
