//! The gateway's concrete [`S3Handler`]: resolves the routed bucket to a
//! managed account, enforces that the signing credential owns that
//! account, and delegates each operation to the aggregator crate's
//! upstream client contract.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use fileflow_aggregator::UpstreamClient;
use fileflow_core::{Account, Store};
use fileflow_xml::{
    CommonPrefix, CompleteMultipartUploadResult, CopyObjectResult, DeleteError, DeletedObject,
    DeleteResult, InitiateMultipartUploadResult, ListBucketResult, ListPartsResult,
    ObjectContents, Part, parse_complete_multipart_upload, parse_delete_objects,
};
use percent_encoding::percent_decode_str;

use crate::body::S3ResponseBody;
use crate::dispatch::S3Handler;
use crate::error::{S3Error, S3ErrorCode};
use crate::multipart::MultipartSessions;
use crate::operation::S3Operation;
use crate::response::{
    ObjectMetadata, get_object_response, head_bucket_response, head_object_response,
    no_content_response, put_object_response, xml_ok,
};
use crate::router::RoutingContext;

/// Builds the upstream client for a managed account. A trait rather than a
/// bare function so tests can substitute a fake client without touching
/// `aws-sdk-s3`.
pub trait ClientFactory: Send + Sync + 'static {
    /// Build (or look up) the upstream client for `account`.
    fn client_for(&self, account: &Account) -> Arc<dyn UpstreamClient>;
}

/// Builds a fresh [`fileflow_aggregator::S3UpstreamClient`] per call.
#[derive(Debug, Default)]
pub struct DefaultClientFactory;

impl ClientFactory for DefaultClientFactory {
    fn client_for(&self, account: &Account) -> Arc<dyn UpstreamClient> {
        Arc::new(fileflow_aggregator::S3UpstreamClient::for_account(account))
    }
}

/// Resolves routed S3 requests against the store and dispatches to the
/// matched account's upstream bucket.
pub struct FileFlowS3Handler {
    store: Arc<Store>,
    multipart: Arc<MultipartSessions>,
    clients: Arc<dyn ClientFactory>,
}

impl std::fmt::Debug for FileFlowS3Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFlowS3Handler").finish_non_exhaustive()
    }
}

impl FileFlowS3Handler {
    #[must_use]
    pub fn new(store: Arc<Store>, multipart: Arc<MultipartSessions>) -> Self {
        Self::with_client_factory(store, multipart, Arc::new(DefaultClientFactory))
    }

    #[must_use]
    pub fn with_client_factory(
        store: Arc<Store>,
        multipart: Arc<MultipartSessions>,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self { store, multipart, clients }
    }

    /// Look up the account that owns `bucket` and confirm `access_key_id`'s
    /// credential belongs to it. A bucket owned by another managed account
    /// is reported as `NoSuchBucket`, not `AccessDenied`, so callers can't
    /// use it to enumerate other tenants' bucket names.
    fn authorize_bucket(&self, bucket: &str, access_key_id: &str) -> Result<Account, S3Error> {
        let account = self
            .store
            .list_accounts()
            .into_iter()
            .find(|a| a.bucket_name == bucket && a.active)
            .ok_or_else(|| S3Error::no_such_bucket(bucket))?;

        let credential = self
            .store
            .find_s3_credential(access_key_id)
            .ok_or_else(|| S3Error::access_denied(bucket))?;
        if credential.account_id != account.id {
            return Err(S3Error::no_such_bucket(bucket));
        }
        Ok(account)
    }
}

impl S3Handler for FileFlowS3Handler {
    fn handle_operation(
        &self,
        ctx: RoutingContext,
        parts: http::request::Parts,
        body: Bytes,
        access_key_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>> {
        let store = self.store.clone();
        let multipart = self.multipart.clone();
        let clients = self.clients.clone();
        let access_key_id = access_key_id.to_owned();
        Box::pin(async move {
            let handler = FileFlowS3Handler { store, multipart, clients };
            handler.run(ctx, parts, body, &access_key_id).await
        })
    }
}

fn query_value<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn parse_range_start(range_header: &str) -> Option<i64> {
    let spec = range_header.strip_prefix("bytes=")?;
    let (start, _end) = spec.split_once('-')?;
    start.parse().ok()
}

impl FileFlowS3Handler {
    async fn run(
        &self,
        ctx: RoutingContext,
        parts: http::request::Parts,
        body: Bytes,
        access_key_id: &str,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let bucket = ctx
            .bucket
            .as_deref()
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidRequest, "missing bucket"))?;
        let account = self.authorize_bucket(bucket, access_key_id)?;
        let client = self.clients.client_for(&account);

        match ctx.operation {
            S3Operation::HeadBucket => head_bucket_response(),
            S3Operation::ListObjectsV2 => self.list_objects_v2(&ctx, bucket, &account, client).await,
            S3Operation::GetObject => {
                let key = object_key(&ctx)?;
                let range = parts
                    .headers
                    .get(http::header::RANGE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let object = client.get_object(key, range.as_deref()).await?;
                let content_range = range.as_deref().and_then(|r| {
                    parse_range_start(r)
                        .map(|start| format!("bytes {start}-{}/*", start + object.bytes.len() as i64 - 1))
                });
                let meta = ObjectMetadata {
                    content_type: object.content_type.as_deref(),
                    etag: object.etag.as_deref(),
                    last_modified: object.last_modified.as_ref(),
                    content_length: Some(object.bytes.len() as i64),
                };
                get_object_response(&meta, content_range.as_deref(), object.bytes)
            }
            S3Operation::HeadObject => {
                let key = object_key(&ctx)?;
                let summary = client.head_object(key).await?;
                let meta = ObjectMetadata {
                    content_type: None,
                    etag: summary.etag.as_deref(),
                    last_modified: summary.last_modified.as_ref(),
                    content_length: Some(summary.size),
                };
                head_object_response(&meta)
            }
            S3Operation::PutObject => self.put_object(&ctx, &parts, body, &account, client).await,
            S3Operation::CopyObject => self.copy_object(&ctx, &parts, bucket, client).await,
            S3Operation::DeleteObject => {
                let key = object_key(&ctx)?;
                client.delete_object(key).await?;
                no_content_response()
            }
            S3Operation::DeleteObjects => self.delete_objects(body, client).await,
            S3Operation::CreateMultipartUpload => {
                self.create_multipart_upload(&ctx, &parts, bucket, client).await
            }
            S3Operation::UploadPart => self.upload_part(&ctx, body, client).await,
            S3Operation::CompleteMultipartUpload => {
                self.complete_multipart_upload(&ctx, body, bucket, client).await
            }
            S3Operation::AbortMultipartUpload => self.abort_multipart_upload(&ctx, client).await,
            S3Operation::ListParts => self.list_parts(&ctx, bucket),
        }
    }

    async fn list_objects_v2(
        &self,
        ctx: &RoutingContext,
        bucket: &str,
        account: &Account,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let prefix = query_value(&ctx.query_params, "prefix").unwrap_or_default().to_owned();
        let continuation_token = query_value(&ctx.query_params, "continuation-token").map(str::to_owned);
        let max_keys = query_value(&ctx.query_params, "max-keys")
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(1000);

        let mut cursors = std::collections::HashMap::new();
        if let Some(token) = &continuation_token {
            cursors.insert(account.id, token.clone());
        }
        let accounts = [account.clone()];
        let client_for: Box<dyn Fn(&Account) -> Arc<dyn UpstreamClient>> = Box::new(move |_| client.clone());
        let results = fileflow_aggregator::list_files(
            &accounts,
            &*client_for,
            &[account.id],
            &prefix,
            &cursors,
            max_keys,
        )
        .await;

        let mut contents = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut next_cursor = None;
        if let Some(account_files) = results.into_iter().next() {
            for entry in account_files.files {
                if entry.is_dir {
                    common_prefixes.push(CommonPrefix { prefix: format!("{prefix}{}/", entry.name) });
                } else {
                    contents.push(ObjectContents {
                        key: format!("{prefix}{}", entry.name),
                        size: entry.size,
                        last_modified: entry.last_modified.unwrap_or_else(Utc::now),
                        etag: None,
                    });
                }
            }
            next_cursor = account_files.next_cursor;
        }

        let result = ListBucketResult {
            name: bucket.to_owned(),
            prefix: prefix.clone(),
            delimiter: Some("/".to_owned()),
            max_keys,
            is_truncated: next_cursor.is_some(),
            key_count: (contents.len() + common_prefixes.len()) as i32,
            continuation_token,
            next_continuation_token: next_cursor,
            contents,
            common_prefixes,
        };
        xml_ok("ListBucketResult", &result)
    }

    async fn put_object(
        &self,
        ctx: &RoutingContext,
        parts: &http::request::Parts,
        body: Bytes,
        account: &Account,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let summary = client.put_object(key, body, content_type.as_deref()).await?;

        let settings = self.store.settings();
        if settings.default_expiration_days > 0 {
            let expires_at = Utc::now() + chrono::Duration::days(settings.default_expiration_days);
            if let Err(error) = self.store.upsert_file_expiration(account.id, key, expires_at).await {
                tracing::warn!(account = %account.name, %key, %error, "failed to record file expiration for S3 PutObject; upload still succeeded");
            }
        }
        put_object_response(summary.etag.as_deref())
    }

    async fn copy_object(
        &self,
        ctx: &RoutingContext,
        parts: &http::request::Parts,
        bucket: &str,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let dest_key = object_key(ctx)?;
        let header = parts
            .headers
            .get("x-amz-copy-source")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing x-amz-copy-source header"))?;
        let trimmed = header.trim_start_matches('/');
        let (src_bucket, src_key) = trimmed
            .split_once('/')
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "invalid x-amz-copy-source"))?;
        let src_bucket = percent_decode_str(src_bucket).decode_utf8_lossy();
        if src_bucket != bucket {
            return Err(S3Error::with_message(
                S3ErrorCode::InvalidArgument,
                "cross-bucket CopyObject is not supported",
            ));
        }
        let src_key = percent_decode_str(src_key).decode_utf8_lossy().into_owned();

        let summary = client.copy_object(&src_key, dest_key).await?;
        let result = CopyObjectResult {
            etag: summary.etag,
            last_modified: summary.last_modified.unwrap_or_else(Utc::now),
        };
        xml_ok("CopyObjectResult", &result)
    }

    async fn delete_objects(
        &self,
        body: Bytes,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let parsed = parse_delete_objects(&body)
            .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
        let keys: Vec<String> = parsed.objects.into_iter().map(|o| o.key).collect();
        let deleted = client.delete_objects(&keys).await?;
        let deleted: HashSet<&str> = deleted.iter().map(String::as_str).collect();

        let mut result = DeleteResult::default();
        for key in &keys {
            if deleted.contains(key.as_str()) {
                if !parsed.quiet {
                    result.deleted.push(DeletedObject { key: key.clone() });
                }
            } else {
                result.errors.push(DeleteError {
                    key: key.clone(),
                    code: "InternalError".to_owned(),
                    message: "failed to delete object".to_owned(),
                });
            }
        }
        xml_ok("DeleteResult", &result)
    }

    async fn create_multipart_upload(
        &self,
        ctx: &RoutingContext,
        parts: &http::request::Parts,
        bucket: &str,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let content_type = parts
            .headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let upload_id = client.create_multipart_upload(key, content_type).await?;
        self.multipart.create(bucket, key, &upload_id);
        let result = InitiateMultipartUploadResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id,
        };
        xml_ok("InitiateMultipartUploadResult", &result)
    }

    async fn upload_part(
        &self,
        ctx: &RoutingContext,
        body: Bytes,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let upload_id = query_value(&ctx.query_params, "uploadId")
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing uploadId"))?;
        let part_number: i32 = query_value(&ctx.query_params, "partNumber")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing or invalid partNumber"))?;
        let size = body.len() as i64;
        let uploaded = client.upload_part(key, upload_id, part_number, body).await?;
        self.multipart.record_part(upload_id, part_number, uploaded.etag.clone(), size)?;
        put_object_response(Some(&uploaded.etag))
    }

    async fn complete_multipart_upload(
        &self,
        ctx: &RoutingContext,
        body: Bytes,
        bucket: &str,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let upload_id = query_value(&ctx.query_params, "uploadId")
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing uploadId"))?;
        let parsed = parse_complete_multipart_upload(&body)
            .map_err(|e| S3Error::with_message(S3ErrorCode::MalformedXML, e.to_string()))?;
        let claimed: Vec<(i32, String)> = parsed.parts.into_iter().map(|p| (p.part_number, p.etag)).collect();

        self.multipart.complete(upload_id, &claimed)?;
        let summary = client.complete_multipart_upload(key, upload_id, &claimed).await?;
        let result = CompleteMultipartUploadResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            location: format!("/{bucket}/{key}"),
            etag: summary.etag,
        };
        xml_ok("CompleteMultipartUploadResult", &result)
    }

    async fn abort_multipart_upload(
        &self,
        ctx: &RoutingContext,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let upload_id = query_value(&ctx.query_params, "uploadId")
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing uploadId"))?;
        client.abort_multipart_upload(key, upload_id).await?;
        self.multipart.abort(upload_id);
        no_content_response()
    }

    fn list_parts(&self, ctx: &RoutingContext, bucket: &str) -> Result<http::Response<S3ResponseBody>, S3Error> {
        let key = object_key(ctx)?;
        let upload_id = query_value(&ctx.query_params, "uploadId")
            .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidArgument, "missing uploadId"))?;
        let session = self
            .multipart
            .get(upload_id)
            .ok_or_else(|| S3Error::no_such_upload(upload_id))?;
        let mut parts: Vec<Part> = session
            .parts
            .iter()
            .map(|p| Part {
                part_number: p.part_number,
                etag: p.etag.clone(),
                size: p.size,
                last_modified: None,
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);
        let result = ListPartsResult {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id: upload_id.to_owned(),
            parts,
        };
        xml_ok("ListPartsResult", &result)
    }
}

fn object_key(ctx: &RoutingContext) -> Result<&str, S3Error> {
    ctx.key
        .as_deref()
        .ok_or_else(|| S3Error::with_message(S3ErrorCode::InvalidRequest, "missing object key"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fileflow_core::{
        Backend, Capabilities, Data, FileFlowResult, Permission, PermissionSet, Quota,
        S3Credential, Settings, Usage,
    };
    use fileflow_aggregator::{ListPage, ObjectBody, ObjectSummary, UploadedPart, UsageSnapshot};
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct FakeBackend;

    #[async_trait]
    impl Backend for FakeBackend {
        async fn init(&self) -> FileFlowResult<()> {
            Ok(())
        }
        async fn load(&self) -> FileFlowResult<Data> {
            Ok(Data::default())
        }
        async fn save(&self, _snapshot: &Data) -> FileFlowResult<()> {
            Ok(())
        }
        async fn close(&self) -> FileFlowResult<()> {
            Ok(())
        }
    }

    struct FakeClient;

    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn list_objects_v2(&self, _p: &str, _c: Option<&str>, _m: i32) -> FileFlowResult<ListPage> {
            Ok(ListPage::default())
        }
        async fn put_object(&self, _k: &str, _b: Bytes, _c: Option<&str>) -> FileFlowResult<ObjectSummary> {
            Ok(ObjectSummary {
                key: "k".into(),
                size: 3,
                last_modified: None,
                etag: Some("etag".into()),
            })
        }
        async fn get_object(&self, _k: &str, _r: Option<&str>) -> FileFlowResult<ObjectBody> {
            Ok(ObjectBody {
                bytes: Bytes::from_static(b"hi!"),
                content_type: Some("text/plain".into()),
                etag: Some("etag".into()),
                last_modified: None,
            })
        }
        async fn head_object(&self, _k: &str) -> FileFlowResult<ObjectSummary> {
            Ok(ObjectSummary {
                key: "k".into(),
                size: 3,
                last_modified: None,
                etag: Some("etag".into()),
            })
        }
        async fn delete_object(&self, _k: &str) -> FileFlowResult<()> {
            Ok(())
        }
        async fn delete_objects(&self, keys: &[String]) -> FileFlowResult<Vec<String>> {
            Ok(keys.to_vec())
        }
        async fn copy_object(&self, _s: &str, _d: &str) -> FileFlowResult<ObjectSummary> {
            Ok(ObjectSummary {
                key: "d".into(),
                size: 3,
                last_modified: None,
                etag: Some("etag".into()),
            })
        }
        async fn create_multipart_upload(&self, _k: &str, _c: Option<&str>) -> FileFlowResult<String> {
            Ok("upload-1".into())
        }
        async fn upload_part(&self, _k: &str, _u: &str, n: i32, b: Bytes) -> FileFlowResult<UploadedPart> {
            Ok(UploadedPart { part_number: n, etag: format!("etag-{n}"), size: b.len() as i64 })
        }
        async fn complete_multipart_upload(
            &self,
            _k: &str,
            _u: &str,
            _p: &[(i32, String)],
        ) -> FileFlowResult<ObjectSummary> {
            Ok(ObjectSummary { key: "k".into(), size: 10, last_modified: None, etag: Some("final".into()) })
        }
        async fn abort_multipart_upload(&self, _k: &str, _u: &str) -> FileFlowResult<()> {
            Ok(())
        }
        async fn query_usage(&self, _t: &str) -> FileFlowResult<UsageSnapshot> {
            unimplemented!()
        }
    }

    struct FakeClientFactory;
    impl ClientFactory for FakeClientFactory {
        fn client_for(&self, _account: &Account) -> Arc<dyn UpstreamClient> {
            Arc::new(FakeClient)
        }
    }

    fn test_account(bucket: &str) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: "acct".into(),
            active: true,
            upstream_account_id: "a".into(),
            access_key_id: "ak".into(),
            secret_access_key: "sk".into(),
            bucket_name: bucket.to_owned(),
            endpoint_url: String::new(),
            public_domain: "example.com".into(),
            analytics_token: None,
            quota: Quota { max_size_bytes: 1000, max_class_a_ops: 1000 },
            usage: Usage::default(),
            capabilities: Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn handler_with_account(account: &Account) -> FileFlowS3Handler {
        let mut data = Data::default();
        data.accounts.push(account.clone());
        data.s3_credentials.push(S3Credential {
            id: Uuid::new_v4(),
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
            account_id: account.id,
            description: String::new(),
            permissions: PermissionSet(vec![Permission::Read, Permission::Write, Permission::Delete]),
            active: true,
            created_at: Utc::now(),
            last_used_at: None,
        });
        data.settings = Settings::default();
        let store = Arc::new(Store::new(data, Arc::new(FakeBackend)));
        FileFlowS3Handler::with_client_factory(store, MultipartSessions::new(), Arc::new(FakeClientFactory))
    }

    fn ctx(bucket: &str, key: Option<&str>, operation: S3Operation) -> RoutingContext {
        RoutingContext {
            bucket: Some(bucket.to_owned()),
            key: key.map(str::to_owned),
            operation,
            query_params: Vec::new(),
        }
    }

    fn parts() -> http::request::Parts {
        http::Request::builder().body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn rejects_bucket_owned_by_another_account() {
        let account = test_account("mine");
        let handler = handler_with_account(&account).await;
        let result = handler
            .run(ctx("someone-elses-bucket", Some("k"), S3Operation::HeadObject), parts(), Bytes::new(), "AKID")
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchBucket);
    }

    #[tokio::test]
    async fn rejects_unknown_access_key() {
        let account = test_account("bucket");
        let handler = handler_with_account(&account).await;
        let result = handler
            .run(ctx("bucket", Some("k"), S3Operation::HeadBucket), parts(), Bytes::new(), "unknown")
            .await;
        assert_eq!(result.unwrap_err().code, S3ErrorCode::AccessDenied);
    }

    #[tokio::test]
    async fn put_then_get_object_round_trips_through_fake_client() {
        let account = test_account("bucket");
        let handler = handler_with_account(&account).await;
        let put = handler
            .run(ctx("bucket", Some("k"), S3Operation::PutObject), parts(), Bytes::from_static(b"hi!"), "AKID")
            .await
            .unwrap();
        assert_eq!(put.status(), http::StatusCode::OK);

        let get = handler
            .run(ctx("bucket", Some("k"), S3Operation::GetObject), parts(), Bytes::new(), "AKID")
            .await
            .unwrap();
        assert_eq!(get.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn multipart_lifecycle_create_upload_complete() {
        let account = test_account("bucket");
        let handler = handler_with_account(&account).await;
        let create = handler
            .run(ctx("bucket", Some("k"), S3Operation::CreateMultipartUpload), parts(), Bytes::new(), "AKID")
            .await
            .unwrap();
        assert_eq!(create.status(), http::StatusCode::OK);

        let mut upload_ctx = ctx("bucket", Some("k"), S3Operation::UploadPart);
        upload_ctx.query_params = vec![("uploadId".into(), "upload-1".into()), ("partNumber".into(), "1".into())];
        let part = handler
            .run(upload_ctx, parts(), Bytes::from(vec![0u8; 5 * 1024 * 1024]), "AKID")
            .await
            .unwrap();
        assert_eq!(part.status(), http::StatusCode::OK);

        let mut complete_ctx = ctx("bucket", Some("k"), S3Operation::CompleteMultipartUpload);
        complete_ctx.query_params = vec![("uploadId".into(), "upload-1".into())];
        let body = Bytes::from(
            "<CompleteMultipartUpload><Part><PartNumber>1</PartNumber><ETag>etag-1</ETag></Part></CompleteMultipartUpload>",
        );
        let complete = handler.run(complete_ctx, parts(), body, "AKID").await.unwrap();
        assert_eq!(complete.status(), http::StatusCode::OK);
    }
}
