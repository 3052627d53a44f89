//! HTTP response construction for the gateway's 13 S3 operations.
//!
//! Two shapes cover everything this gateway returns: header-only responses
//! (object metadata, multipart acks) and XML-bodied responses built from
//! `fileflow_xml`'s `S3Serialize` types. `GetObject` is the only operation
//! that streams an actual payload.

use bytes::Bytes;
use fileflow_xml::S3Serialize;
use http::header::HeaderValue;

use crate::body::S3ResponseBody;
use crate::error::S3Error;

// ---------------------------------------------------------------------------
// Header-setter helpers
// ---------------------------------------------------------------------------

fn set_optional_header(
    builder: http::response::Builder,
    name: &str,
    value: Option<&str>,
) -> http::response::Builder {
    if let Some(v) = value {
        if let Ok(hv) = HeaderValue::from_str(v) {
            return builder.header(name, hv);
        }
    }
    builder
}

fn set_optional_int_header(
    builder: http::response::Builder,
    name: &str,
    value: Option<i64>,
) -> http::response::Builder {
    if let Some(v) = value {
        return builder.header(name, v);
    }
    builder
}

fn set_optional_timestamp_header(
    builder: http::response::Builder,
    name: &str,
    value: Option<&chrono::DateTime<chrono::Utc>>,
) -> http::response::Builder {
    if let Some(v) = value {
        let formatted = v.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(hv) = HeaderValue::from_str(&formatted) {
            return builder.header(name, hv);
        }
    }
    builder
}

fn quoted_etag(etag: &str) -> String {
    if etag.starts_with('"') { etag.to_owned() } else { format!("\"{etag}\"") }
}

fn build_response(
    builder: http::response::Builder,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    builder
        .body(body)
        .map_err(|e| S3Error::internal_error(format!("failed to build HTTP response: {e}")))
}

// ---------------------------------------------------------------------------
// XML responses
// ---------------------------------------------------------------------------

/// Build a `200 OK` response with an XML body serialized under `root_element`.
pub fn xml_ok<T: S3Serialize>(root_element: &str, value: &T) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let xml = fileflow_xml::to_xml(root_element, value)
        .map_err(|e| S3Error::internal_error(format!("failed to serialize XML response: {e}")))?;
    let builder = http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Content-Type", "application/xml");
    build_response(builder, S3ResponseBody::from_xml(xml))
}

/// The S3 `<Error>` envelope for a failed operation.
#[must_use]
pub fn error_to_response(err: &S3Error, request_id: &str) -> http::Response<S3ResponseBody> {
    let xml_bytes = fileflow_xml::error_to_xml(err.code.as_str(), &err.message, err.resource.as_deref(), request_id);
    let body = S3ResponseBody::from_bytes(Bytes::from(xml_bytes));

    http::Response::builder()
        .status(err.status_code)
        .header("Content-Type", "application/xml")
        .body(body)
        .unwrap_or_else(|_| {
            http::Response::builder()
                .status(http::StatusCode::INTERNAL_SERVER_ERROR)
                .body(S3ResponseBody::empty())
                .expect("static response should be valid")
        })
}

// ---------------------------------------------------------------------------
// Object metadata responses (HeadBucket, HeadObject, PutObject, CopyObject)
// ---------------------------------------------------------------------------

/// Metadata shared by `HeadObject` and `GetObject` responses.
#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata<'a> {
    pub content_type: Option<&'a str>,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a chrono::DateTime<chrono::Utc>>,
    pub content_length: Option<i64>,
}

/// `200 OK`, no body — used for `HeadBucket`.
pub fn head_bucket_response() -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(http::Response::builder().status(http::StatusCode::OK), S3ResponseBody::empty())
}

/// `200 OK`, metadata headers only, no body — `HeadObject`.
pub fn head_object_response(meta: &ObjectMetadata<'_>) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let mut builder = http::Response::builder().status(http::StatusCode::OK);
    builder = set_optional_header(builder, "Content-Type", meta.content_type);
    builder = set_optional_header(builder, "ETag", meta.etag.map(quoted_etag).as_deref());
    builder = set_optional_timestamp_header(builder, "Last-Modified", meta.last_modified);
    builder = set_optional_int_header(builder, "Content-Length", meta.content_length);
    builder = builder.header("Accept-Ranges", "bytes");
    build_response(builder, S3ResponseBody::empty())
}

/// `200 OK` (or `206 Partial Content` when `content_range` is set), streaming
/// the object body — `GetObject`.
pub fn get_object_response(
    meta: &ObjectMetadata<'_>,
    content_range: Option<&str>,
    body: Bytes,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let status = if content_range.is_some() {
        http::StatusCode::PARTIAL_CONTENT
    } else {
        http::StatusCode::OK
    };
    let mut builder = http::Response::builder().status(status);
    builder = set_optional_header(builder, "Content-Type", meta.content_type);
    builder = set_optional_header(builder, "ETag", meta.etag.map(quoted_etag).as_deref());
    builder = set_optional_timestamp_header(builder, "Last-Modified", meta.last_modified);
    builder = set_optional_header(builder, "Content-Range", content_range);
    builder = builder.header("Accept-Ranges", "bytes");
    build_response(builder, S3ResponseBody::from_bytes(body))
}

/// `200 OK`, `ETag` header only, empty body — `PutObject` and `UploadPart`.
pub fn put_object_response(etag: Option<&str>) -> Result<http::Response<S3ResponseBody>, S3Error> {
    let mut builder = http::Response::builder().status(http::StatusCode::OK);
    builder = set_optional_header(builder, "ETag", etag.map(quoted_etag).as_deref());
    build_response(builder, S3ResponseBody::empty())
}

/// `204 No Content` — `DeleteObject` and `AbortMultipartUpload`.
pub fn no_content_response() -> Result<http::Response<S3ResponseBody>, S3Error> {
    build_response(http::Response::builder().status(http::StatusCode::NO_CONTENT), S3ResponseBody::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fileflow_xml::{ListBucketResult, ObjectContents};
    use http_body_util::BodyExt;

    #[test]
    fn test_error_to_response_sets_status_from_code() {
        let err = S3Error::no_such_key("missing");
        let resp = error_to_response(&err, "req-1");
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(
            resp.headers().get("Content-Type").and_then(|v| v.to_str().ok()),
            Some("application/xml")
        );
    }

    #[test]
    fn test_head_object_response_sets_metadata_headers() {
        let last_modified = chrono::Utc.timestamp_opt(0, 0).unwrap();
        let meta = ObjectMetadata {
            content_type: Some("text/plain"),
            etag: Some("abc"),
            last_modified: Some(&last_modified),
            content_length: Some(42),
        };
        let resp = head_object_response(&meta).unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(resp.headers().get("ETag").and_then(|v| v.to_str().ok()), Some("\"abc\""));
        assert_eq!(resp.headers().get("Content-Length").and_then(|v| v.to_str().ok()), Some("42"));
    }

    #[test]
    fn test_get_object_response_sets_partial_content_when_range_present() {
        let meta = ObjectMetadata::default();
        let resp = get_object_response(&meta, Some("bytes 0-9/20"), Bytes::from_static(b"0123456789")).unwrap();
        assert_eq!(resp.status(), http::StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            resp.headers().get("Content-Range").and_then(|v| v.to_str().ok()),
            Some("bytes 0-9/20")
        );
    }

    #[tokio::test]
    async fn test_xml_ok_serializes_body() {
        let result = ListBucketResult {
            name: "bucket".into(),
            key_count: 1,
            contents: vec![ObjectContents {
                key: "a".into(),
                size: 1,
                last_modified: chrono::Utc::now(),
                etag: None,
            }],
            ..Default::default()
        };
        let resp = xml_ok("ListBucketResult", &result).unwrap();
        assert_eq!(resp.status(), http::StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("<Key>a</Key>"));
    }

    #[test]
    fn test_no_content_response_has_empty_body() {
        let resp = no_content_response().unwrap();
        assert_eq!(resp.status(), http::StatusCode::NO_CONTENT);
    }
}
