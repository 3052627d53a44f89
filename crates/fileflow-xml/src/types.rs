//! Wire-shape types for the S3 operations this gateway exposes.
//!
//! These mirror AWS's XML shapes closely enough for off-the-shelf S3
//! clients (the `aws-sdk-s3`, `rclone`, `s3cmd`, ...) to parse them, but
//! carry only the fields the aggregator and upload orchestrator actually
//! produce.

use chrono::{DateTime, Utc};

/// One object entry in a `ListObjectsV2` response.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectContents {
    pub key: String,
    pub size: i64,
    pub last_modified: DateTime<Utc>,
    pub etag: Option<String>,
}

/// One common-prefix ("directory") entry in a `ListObjectsV2` response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommonPrefix {
    pub prefix: String,
}

/// The full `ListObjectsV2` response body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListBucketResult {
    pub name: String,
    pub prefix: String,
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub is_truncated: bool,
    pub continuation_token: Option<String>,
    pub next_continuation_token: Option<String>,
    pub key_count: i32,
    pub contents: Vec<ObjectContents>,
    pub common_prefixes: Vec<CommonPrefix>,
}

/// One object identifier in a `DeleteObjects` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectIdentifier {
    pub key: String,
}

/// A parsed `POST /bucket?delete` request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteObjectsRequest {
    pub objects: Vec<ObjectIdentifier>,
    pub quiet: bool,
}

/// One successfully deleted key in a `DeleteObjects` response.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedObject {
    pub key: String,
}

/// One failed key in a `DeleteObjects` response.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// The `DeleteObjects` response body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteResult {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteError>,
}

/// The `CreateMultipartUpload` response body.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiateMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
}

/// One part reference in a `CompleteMultipartUpload` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// A parsed `POST /bucket/key?uploadId=U` (Complete) request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompleteMultipartUploadRequest {
    pub parts: Vec<CompletedPart>,
}

/// The `CompleteMultipartUpload` response body.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteMultipartUploadResult {
    pub bucket: String,
    pub key: String,
    pub location: String,
    pub etag: Option<String>,
}

/// One part entry in a `ListParts` response.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// The `ListParts` response body.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPartsResult {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub parts: Vec<Part>,
}

/// The `CopyObject` response body.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyObjectResult {
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
}
