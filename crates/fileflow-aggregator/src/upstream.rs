//! Client contract against one managed account's upstream S3-compatible
//! bucket, plus a concrete `aws-sdk-s3` implementation.
//!
//! Each [`Account`] gets its own [`S3UpstreamClient`], built from the
//! account's access key, secret, endpoint URL, and bucket name — there is
//! no shared client, since every account may point at a different
//! provider (AWS itself, MinIO, Backblaze B2, Cloudflare R2, …) with its
//! own region string and path-style requirements.

use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

use fileflow_core::{Account, FileFlowError, FileFlowResult, UpstreamError};

const DEFAULT_RETRY_ATTEMPTS: u32 = 4;

/// One page of a bucket listing, already split into directories and
/// objects the way the aggregator wants to consume it.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Common prefixes ("directories") under the requested prefix.
    pub prefixes: Vec<String>,
    /// Objects directly under the requested prefix.
    pub objects: Vec<ObjectSummary>,
    /// Opaque continuation token for the next page, if the listing was truncated.
    pub next_cursor: Option<String>,
}

/// One object entry in a listing or a `HeadObject`/`GetObject` result.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// The bytes and metadata of a fetched object.
#[derive(Debug, Clone)]
pub struct ObjectBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Month-to-date usage figures reported by an account's analytics endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageSnapshot {
    pub size_bytes: i64,
    pub class_a_ops: i64,
    pub class_b_ops: i64,
}

/// One uploaded part, as reported by the upstream after `UploadPart`.
#[derive(Debug, Clone)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
}

/// Contract every upload/listing/expiration path in this crate talks to.
/// A fake implementation backs the aggregator's and scheduler's unit tests.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn list_objects_v2(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        max_keys: i32,
    ) -> FileFlowResult<ListPage>;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> FileFlowResult<ObjectSummary>;

    async fn get_object(&self, key: &str, range: Option<&str>) -> FileFlowResult<ObjectBody>;

    async fn head_object(&self, key: &str) -> FileFlowResult<ObjectSummary>;

    async fn delete_object(&self, key: &str) -> FileFlowResult<()>;

    /// Deletes every key, returning the subset that were actually removed
    /// (upstream services report per-key results; callers treat a missing
    /// key as already-deleted rather than an error).
    async fn delete_objects(&self, keys: &[String]) -> FileFlowResult<Vec<String>>;

    /// Same-bucket copy only — cross-account copy is out of scope.
    async fn copy_object(&self, source_key: &str, dest_key: &str) -> FileFlowResult<ObjectSummary>;

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> FileFlowResult<String>;

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> FileFlowResult<UploadedPart>;

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> FileFlowResult<ObjectSummary>;

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> FileFlowResult<()>;

    /// Query the account's analytics endpoint for month-to-date usage.
    /// `analytics_token` is `Account::analytics_token`; callers only
    /// invoke this when it is `Some`.
    async fn query_usage(&self, analytics_token: &str) -> FileFlowResult<UsageSnapshot>;
}

/// `UpstreamClient` backed by a real `aws-sdk-s3` client configured for
/// one account's bucket, credentials, and endpoint.
#[derive(Debug, Clone)]
pub struct S3UpstreamClient {
    client: Client,
    bucket: String,
    http: reqwest::Client,
    endpoint_url: String,
}

impl S3UpstreamClient {
    /// Build a client scoped to `account`. Path-style addressing is forced
    /// on since managed accounts may point at non-AWS providers that don't
    /// support virtual-hosted-style buckets.
    pub fn for_account(account: &Account) -> Self {
        let region = Region::new("us-east-1".to_owned());
        let credentials = Credentials::new(
            account.access_key_id.clone(),
            account.secret_access_key.clone(),
            None,
            None,
            "fileflow-aggregator",
        );
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(region)
            .retry_config(
                aws_config::retry::RetryConfig::standard()
                    .with_max_attempts(DEFAULT_RETRY_ATTEMPTS),
            )
            .force_path_style(true);
        if !account.endpoint_url.is_empty() {
            config_builder = config_builder.endpoint_url(&account.endpoint_url);
        }
        let client = Client::from_conf(config_builder.build());
        Self {
            client,
            bucket: account.bucket_name.clone(),
            http: reqwest::Client::new(),
            endpoint_url: account.endpoint_url.clone(),
        }
    }
}

#[async_trait]
impl UpstreamClient for S3UpstreamClient {
    async fn list_objects_v2(
        &self,
        prefix: &str,
        cursor: Option<&str>,
        max_keys: i32,
    ) -> FileFlowResult<ListPage> {
        let mut req = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .delimiter("/")
            .max_keys(max_keys);
        if let Some(token) = cursor {
            req = req.continuation_token(token);
        }
        let output = req.send().await.map_err(classify_sdk_error)?;

        let prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_owned))
            .collect();
        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?.to_owned();
                Some(ObjectSummary {
                    key,
                    size: obj.size().unwrap_or(0),
                    last_modified: obj.last_modified().and_then(parse_aws_datetime),
                    etag: obj.e_tag().map(|s| s.trim_matches('"').to_owned()),
                })
            })
            .collect();
        let next_cursor = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_owned)
        } else {
            None
        };

        Ok(ListPage {
            prefixes,
            objects,
            next_cursor,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> FileFlowResult<ObjectSummary> {
        let size = body.len() as i64;
        let mut req = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        let output = req.send().await.map_err(classify_sdk_error)?;
        Ok(ObjectSummary {
            key: key.to_owned(),
            size,
            last_modified: Some(Utc::now()),
            etag: output.e_tag().map(|s| s.trim_matches('"').to_owned()),
        })
    }

    async fn get_object(&self, key: &str, range: Option<&str>) -> FileFlowResult<ObjectBody> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(range) = range {
            req = req.range(range);
        }
        let mut output = req.send().await.map_err(classify_sdk_error)?;
        let content_type = output.content_type().map(str::to_owned);
        let etag = output.e_tag().map(|s| s.trim_matches('"').to_owned());
        let last_modified = output.last_modified().cloned().and_then(parse_aws_datetime);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| FileFlowError::Upstream(UpstreamError::Retryable(e.to_string())))?
            .into_bytes();
        Ok(ObjectBody {
            bytes,
            content_type,
            etag,
            last_modified,
        })
    }

    async fn head_object(&self, key: &str) -> FileFlowResult<ObjectSummary> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(ObjectSummary {
            key: key.to_owned(),
            size: output.content_length().unwrap_or(0),
            last_modified: output.last_modified().cloned().and_then(parse_aws_datetime),
            etag: output.e_tag().map(|s| s.trim_matches('"').to_owned()),
        })
    }

    async fn delete_object(&self, key: &str) -> FileFlowResult<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match classify_sdk_error::<aws_sdk_s3::operation::delete_object::DeleteObjectError>(e) {
                FileFlowError::Upstream(UpstreamError::NotFound(_)) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn delete_objects(&self, keys: &[String]) -> FileFlowResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let objects: Result<Vec<_>, _> = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect();
        let objects = objects.map_err(|e| FileFlowError::Internal(anyhow::anyhow!(e)))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| FileFlowError::Internal(anyhow::anyhow!(e)))?;
        let output = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        let errored: std::collections::HashSet<_> = output
            .errors()
            .iter()
            .filter_map(|e| e.key().map(str::to_owned))
            .collect();
        Ok(keys.iter().filter(|k| !errored.contains(*k)).cloned().collect())
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> FileFlowResult<ObjectSummary> {
        let copy_source = format!("{}/{}", self.bucket, percent_encode_copy_source(source_key));
        let output = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(dest_key)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        let etag = output
            .copy_object_result()
            .and_then(|r| r.e_tag())
            .map(|s| s.trim_matches('"').to_owned());
        Ok(ObjectSummary {
            key: dest_key.to_owned(),
            size: 0,
            last_modified: Some(Utc::now()),
            etag,
        })
    }

    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: Option<&str>,
    ) -> FileFlowResult<String> {
        let mut req = self.client.create_multipart_upload().bucket(&self.bucket).key(key);
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        let output = req.send().await.map_err(classify_sdk_error)?;
        output
            .upload_id()
            .map(str::to_owned)
            .ok_or_else(|| FileFlowError::Internal(anyhow::anyhow!("upstream omitted upload id")))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> FileFlowResult<UploadedPart> {
        let size = body.len() as i64;
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(classify_sdk_error)?;
        let etag = output
            .e_tag()
            .map(|s| s.trim_matches('"').to_owned())
            .ok_or_else(|| FileFlowError::Internal(anyhow::anyhow!("upstream omitted ETag")))?;
        Ok(UploadedPart {
            part_number,
            etag,
            size,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[(i32, String)],
    ) -> FileFlowResult<ObjectSummary> {
        let completed_parts: Result<Vec<_>, _> = parts
            .iter()
            .map(|(number, etag)| {
                CompletedPart::builder()
                    .part_number(*number)
                    .e_tag(etag)
                    .build()
            })
            .map(Ok)
            .collect();
        let completed_parts = completed_parts.map_err(|e: aws_sdk_s3::error::BuildError| {
            FileFlowError::Internal(anyhow::anyhow!(e))
        })?;
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();
        let output = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(ObjectSummary {
            key: key.to_owned(),
            size: 0,
            last_modified: Some(Utc::now()),
            etag: output.e_tag().map(|s| s.trim_matches('"').to_owned()),
        })
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> FileFlowResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(classify_sdk_error)?;
        Ok(())
    }

    async fn query_usage(&self, analytics_token: &str) -> FileFlowResult<UsageSnapshot> {
        let now = Utc::now();
        let month = now.format("%Y-%m").to_string();
        let url = format!("{}/analytics/usage?month={month}", self.endpoint_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .bearer_auth(analytics_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| FileFlowError::Upstream(UpstreamError::Retryable(e.to_string())))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(FileFlowError::Upstream(if status.is_server_error() {
                UpstreamError::Retryable(format!("analytics query failed: {status}"))
            } else {
                UpstreamError::Terminal(format!("analytics query failed: {status}"))
            }));
        }
        let payload: AnalyticsPayload = response
            .json()
            .await
            .map_err(|e| FileFlowError::Upstream(UpstreamError::Terminal(e.to_string())))?;
        Ok(UsageSnapshot {
            size_bytes: payload.size_bytes,
            class_a_ops: payload.class_a_ops,
            class_b_ops: payload.class_b_ops,
        })
    }
}

/// Delegating impl so an `Arc<dyn UpstreamClient>` (what every
/// `ClientFactory` hands back, since the same client is typically reused
/// across calls against one account) can stand in anywhere a
/// `Box<dyn UpstreamClient>` is expected, e.g. the upload orchestrator's
/// `client_for` closure.
#[async_trait]
impl UpstreamClient for Arc<dyn UpstreamClient> {
    async fn list_objects_v2(&self, prefix: &str, cursor: Option<&str>, max_keys: i32) -> FileFlowResult<ListPage> {
        (**self).list_objects_v2(prefix, cursor, max_keys).await
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: Option<&str>) -> FileFlowResult<ObjectSummary> {
        (**self).put_object(key, body, content_type).await
    }

    async fn get_object(&self, key: &str, range: Option<&str>) -> FileFlowResult<ObjectBody> {
        (**self).get_object(key, range).await
    }

    async fn head_object(&self, key: &str) -> FileFlowResult<ObjectSummary> {
        (**self).head_object(key).await
    }

    async fn delete_object(&self, key: &str) -> FileFlowResult<()> {
        (**self).delete_object(key).await
    }

    async fn delete_objects(&self, keys: &[String]) -> FileFlowResult<Vec<String>> {
        (**self).delete_objects(keys).await
    }

    async fn copy_object(&self, source_key: &str, dest_key: &str) -> FileFlowResult<ObjectSummary> {
        (**self).copy_object(source_key, dest_key).await
    }

    async fn create_multipart_upload(&self, key: &str, content_type: Option<&str>) -> FileFlowResult<String> {
        (**self).create_multipart_upload(key, content_type).await
    }

    async fn upload_part(&self, key: &str, upload_id: &str, part_number: i32, body: Bytes) -> FileFlowResult<UploadedPart> {
        (**self).upload_part(key, upload_id, part_number, body).await
    }

    async fn complete_multipart_upload(&self, key: &str, upload_id: &str, parts: &[(i32, String)]) -> FileFlowResult<ObjectSummary> {
        (**self).complete_multipart_upload(key, upload_id, parts).await
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> FileFlowResult<()> {
        (**self).abort_multipart_upload(key, upload_id).await
    }

    async fn query_usage(&self, analytics_token: &str) -> FileFlowResult<UsageSnapshot> {
        (**self).query_usage(analytics_token).await
    }
}

#[derive(serde::Deserialize)]
struct AnalyticsPayload {
    #[serde(default)]
    size_bytes: i64,
    #[serde(default)]
    class_a_ops: i64,
    #[serde(default)]
    class_b_ops: i64,
}

fn parse_aws_datetime(dt: aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.secs(), dt.subsec_nanos()).single()
}

fn percent_encode_copy_source(key: &str) -> String {
    percent_encoding::utf8_percent_encode(key, percent_encoding::NON_ALPHANUMERIC).to_string()
}

/// Map an `SdkError` into our transport-independent upstream error,
/// distinguishing not-found from other terminal/retryable failures.
fn classify_sdk_error<E: ProvideErrorMetadata + std::fmt::Debug>(
    err: SdkError<E, aws_smithy_runtime_api::client::orchestrator::HttpResponse>,
) -> FileFlowError {
    let is_not_found = matches!(
        err.code(),
        Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "404")
    );
    if is_not_found {
        return FileFlowError::Upstream(UpstreamError::NotFound(
            err.code().unwrap_or("NotFound").to_owned(),
        ));
    }
    let message = err
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| err.to_string());
    let retryable = matches!(&err, SdkError::TimeoutError(_) | SdkError::DispatchFailure(_))
        || err
            .raw_response()
            .is_some_and(|r| r.status().as_u16() >= 500);
    if retryable {
        FileFlowError::Upstream(UpstreamError::Retryable(message))
    } else {
        FileFlowError::Upstream(UpstreamError::Terminal(message))
    }
}
