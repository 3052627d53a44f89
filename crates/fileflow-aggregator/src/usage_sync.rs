//! Usage-sync scheduler: periodically refreshes each account's quota usage
//! from its upstream analytics endpoint.
//!
//! The background ticker and the manual `POST /accounts/sync` path share
//! [`run_usage_sync_tick`], but are never run concurrently against the same
//! account set from two different tickers — hot reconfiguration always
//! stops the old ticker before starting the new one.

use std::sync::Arc;
use std::time::Duration;

use fileflow_core::{Account, Store};

use crate::upstream::UpstreamClient;

/// Run one sync pass over every account that has an analytics token.
/// Per-account failures are logged and do not interrupt the others.
pub async fn run_usage_sync_tick(store: &Store, client_for: impl Fn(&Account) -> Box<dyn UpstreamClient>) {
    for account in store.list_accounts() {
        let Some(token) = account.analytics_token.clone() else {
            continue;
        };
        let client = client_for(&account);
        match client.query_usage(&token).await {
            Ok(usage) => {
                if let Err(err) = store
                    .update_account_usage(account.id, usage.size_bytes, usage.class_a_ops, usage.class_b_ops)
                    .await
                {
                    tracing::warn!(account = %account.name, error = %err, "failed to persist refreshed usage");
                }
            }
            Err(err) => {
                tracing::warn!(account = %account.name, error = %err, "usage query failed");
            }
        }
    }
}

/// Spawn the background ticker. Exits when `store` is dropped. Restarts
/// itself with a new interval whenever `Settings.sync_interval_minutes`
/// changes, via [`Store::subscribe_settings`].
pub fn spawn_usage_sync_scheduler(
    store: Arc<Store>,
    client_for: impl Fn(&Account) -> Box<dyn UpstreamClient> + Send + Sync + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut settings_rx = store.subscribe_settings();
        let mut interval_minutes = settings_rx.borrow().sync_interval_minutes;

        loop {
            let mut ticker = tokio::time::interval(Duration::from_secs((interval_minutes.max(1) as u64) * 60));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; skip it

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_usage_sync_tick(&store, &client_for).await;
                    }
                    changed = settings_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        let new_interval = settings_rx.borrow().sync_interval_minutes;
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
    use std::sync::atomic::{AtomicUsize, Ordering};
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

    struct CountingClient {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl UpstreamClient for CountingClient {
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
        async fn query_usage(&self, _token: &str) -> FileFlowResult<UsageSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(fileflow_core::FileFlowError::Upstream(
                    fileflow_core::UpstreamError::Retryable("boom".into()),
                ));
            }
            Ok(UsageSnapshot {
                size_bytes: 42,
                class_a_ops: 1,
                class_b_ops: 2,
            })
        }
    }

    fn test_account(name: &str, analytics_token: Option<&str>) -> Account {
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
            analytics_token: analytics_token.map(str::to_owned),
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

    #[tokio::test]
    async fn test_tick_skips_accounts_without_analytics_token() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        store.create_account(test_account("A", None)).await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        run_usage_sync_tick(&store, move |_| {
            Box::new(CountingClient {
                calls: calls2.clone(),
                fail: false,
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tick_updates_usage_for_accounts_with_token() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        let account = store.create_account(test_account("A", Some("tok"))).await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        run_usage_sync_tick(&store, move |_| {
            Box::new(CountingClient {
                calls: calls2.clone(),
                fail: false,
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let refreshed = store.get_account(account.id).unwrap();
        assert_eq!(refreshed.usage.size_bytes, 42);
        assert!(refreshed.usage.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_tick_continues_after_per_account_failure() {
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend);
        let store = Store::new(Data::default(), backend);
        store.create_account(test_account("A", Some("tok-a"))).await.unwrap();
        store.create_account(test_account("B", Some("tok-b"))).await.unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        run_usage_sync_tick(&store, move |_| {
            Box::new(CountingClient {
                calls: calls2.clone(),
                fail: true,
            })
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
