//! S3 request routing: virtual-hosted-style vs path-style bucket
//! resolution, and operation identification for the gateway's 13
//! supported operations.

use http::Method;
use percent_encoding::percent_decode_str;

use crate::error::{S3Error, S3ErrorCode};
use crate::operation::S3Operation;

/// Routing configuration, driven by `Settings.s3_virtual_hosted_style` /
/// `Settings.s3_base_domain`.
#[derive(Debug, Clone)]
pub struct S3Router {
    pub domain: String,
    pub virtual_hosting: bool,
}

/// The result of routing an HTTP request to an S3 operation.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub bucket: Option<String>,
    pub key: Option<String>,
    pub operation: S3Operation,
    pub query_params: Vec<(String, String)>,
}

impl S3Router {
    #[must_use]
    pub fn new(domain: impl Into<String>, virtual_hosting: bool) -> Self {
        Self {
            domain: domain.into(),
            virtual_hosting,
        }
    }

    /// # Errors
    /// Returns an [`S3Error`] if the request doesn't identify a bucket (and,
    /// for object-level operations, a key), or uses an unsupported method.
    pub fn resolve<B>(&self, req: &http::Request<B>) -> Result<RoutingContext, S3Error> {
        let method = req.method();
        let uri = req.uri();
        let headers = req.headers();

        let query_params = parse_query_params(uri.query().unwrap_or(""));

        let virtual_bucket = if self.virtual_hosting {
            extract_virtual_host_bucket(headers, &self.domain)
        } else {
            None
        };

        let path = uri.path();
        let (path_bucket, path_key) = parse_path(path);

        let (bucket, key) = if let Some(vhost_bucket) = virtual_bucket {
            let key = if path == "/" || path.is_empty() {
                None
            } else {
                let raw_key = &path[1..];
                if raw_key.is_empty() {
                    None
                } else {
                    Some(decode_uri_component(raw_key))
                }
            };
            (Some(vhost_bucket), key)
        } else {
            (path_bucket, path_key)
        };

        let bucket = bucket.ok_or_else(|| {
            S3Error::with_message(S3ErrorCode::InvalidRequest, "A bucket must be specified")
        })?;

        let operation = identify_operation(method, key.as_ref(), &query_params, headers)?;

        Ok(RoutingContext {
            bucket: Some(bucket),
            key,
            operation,
            query_params,
        })
    }
}

fn extract_virtual_host_bucket(headers: &http::HeaderMap, domain: &str) -> Option<String> {
    let host = headers.get(http::header::HOST).and_then(|v| v.to_str().ok())?;
    let host_without_port = host.split(':').next().unwrap_or(host);
    let suffix = format!(".{domain}");
    if host_without_port.ends_with(&suffix) && host_without_port.len() > suffix.len() {
        let bucket = &host_without_port[..host_without_port.len() - suffix.len()];
        if !bucket.is_empty() {
            return Some(bucket.to_owned());
        }
    }
    None
}

fn parse_path(path: &str) -> (Option<String>, Option<String>) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return (None, None);
    }
    if let Some(pos) = trimmed.find('/') {
        let bucket = decode_uri_component(&trimmed[..pos]);
        let key_raw = &trimmed[pos + 1..];
        let key = if key_raw.is_empty() {
            None
        } else {
            Some(decode_uri_component(key_raw))
        };
        (Some(bucket), key)
    } else {
        (Some(decode_uri_component(trimmed)), None)
    }
}

fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query_params(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            if let Some(pos) = pair.find('=') {
                (decode_uri_component(&pair[..pos]), decode_uri_component(&pair[pos + 1..]))
            } else {
                (decode_uri_component(pair), String::new())
            }
        })
        .collect()
}

fn query_has_key(params: &[(String, String)], key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}

fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn identify_operation(
    method: &Method,
    key: Option<&String>,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    match (method, key.is_some()) {
        (method, false) => identify_bucket_operation(method, params),
        (method, true) => identify_object_operation(method, params, headers),
    }
}

fn identify_bucket_operation(method: &Method, params: &[(String, String)]) -> Result<S3Operation, S3Error> {
    match *method {
        Method::HEAD => Ok(S3Operation::HeadBucket),
        Method::GET if query_value(params, "list-type") == Some("2") => Ok(S3Operation::ListObjectsV2),
        Method::POST if query_has_key(params, "delete") => Ok(S3Operation::DeleteObjects),
        _ => Err(S3Error::method_not_allowed(method.as_str())),
    }
}

fn identify_object_operation(
    method: &Method,
    params: &[(String, String)],
    headers: &http::HeaderMap,
) -> Result<S3Operation, S3Error> {
    let has_upload_id = query_has_key(params, "uploadId");
    let has_part_number = query_has_key(params, "partNumber");
    let has_copy_source = headers.contains_key("x-amz-copy-source");

    match *method {
        Method::GET if has_upload_id => Ok(S3Operation::ListParts),
        Method::GET => Ok(S3Operation::GetObject),
        Method::HEAD => Ok(S3Operation::HeadObject),
        Method::PUT if has_part_number && has_upload_id => Ok(S3Operation::UploadPart),
        Method::PUT if has_copy_source => Ok(S3Operation::CopyObject),
        Method::PUT => Ok(S3Operation::PutObject),
        Method::DELETE if has_upload_id => Ok(S3Operation::AbortMultipartUpload),
        Method::DELETE => Ok(S3Operation::DeleteObject),
        Method::POST if query_has_key(params, "uploads") => Ok(S3Operation::CreateMultipartUpload),
        Method::POST if has_upload_id => Ok(S3Operation::CompleteMultipartUpload),
        _ => Err(S3Error::method_not_allowed(method.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;

    fn router() -> S3Router {
        S3Router::new("s3.fileflow.test", true)
    }

    fn path_style_router() -> S3Router {
        S3Router::new("s3.fileflow.test", false)
    }

    fn req(method: Method, uri: &str, host: &str) -> Request<()> {
        let mut builder = Request::builder().method(method).uri(uri);
        if !host.is_empty() {
            builder = builder.header("Host", host);
        }
        builder.body(()).expect("valid request")
    }

    #[test]
    fn test_vhost_bucket_with_get_object() {
        let r = req(Method::GET, "/a/b", "mybucket.s3.fileflow.test");
        let ctx = router().resolve(&r).unwrap();
        assert_eq!(ctx.bucket.as_deref(), Some("mybucket"));
        assert_eq!(ctx.key.as_deref(), Some("a/b"));
        assert_eq!(ctx.operation, S3Operation::GetObject);
    }

    #[test]
    fn test_path_style_list_objects_v2() {
        let r = req(Method::GET, "/mybucket?list-type=2&prefix=docs/", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.bucket.as_deref(), Some("mybucket"));
        assert_eq!(ctx.operation, S3Operation::ListObjectsV2);
    }

    #[test]
    fn test_put_with_copy_source_is_copy_object() {
        let mut r = req(Method::PUT, "/mybucket/dest", "s3.fileflow.test");
        r.headers_mut().insert("x-amz-copy-source", "/mybucket/src".parse().unwrap());
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::CopyObject);
    }

    #[test]
    fn test_put_without_copy_source_is_put_object() {
        let r = req(Method::PUT, "/mybucket/dest", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::PutObject);
    }

    #[test]
    fn test_upload_part_requires_both_query_params() {
        let r = req(Method::PUT, "/mybucket/key?partNumber=1&uploadId=abc", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::UploadPart);
    }

    #[test]
    fn test_complete_multipart_upload() {
        let r = req(Method::POST, "/mybucket/key?uploadId=abc", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::CompleteMultipartUpload);
    }

    #[test]
    fn test_create_multipart_upload() {
        let r = req(Method::POST, "/mybucket/key?uploads", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::CreateMultipartUpload);
    }

    #[test]
    fn test_abort_multipart_upload() {
        let r = req(Method::DELETE, "/mybucket/key?uploadId=abc", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::AbortMultipartUpload);
    }

    #[test]
    fn test_list_parts() {
        let r = req(Method::GET, "/mybucket/key?uploadId=abc", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::ListParts);
    }

    #[test]
    fn test_delete_objects_batch() {
        let r = req(Method::POST, "/mybucket?delete", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.operation, S3Operation::DeleteObjects);
    }

    #[test]
    fn test_percent_decodes_key() {
        let r = req(Method::GET, "/mybucket/my%20key%2Fsub", "s3.fileflow.test");
        let ctx = path_style_router().resolve(&r).unwrap();
        assert_eq!(ctx.key.as_deref(), Some("my key/sub"));
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let r = req(Method::GET, "/", "s3.fileflow.test");
        let err = path_style_router().resolve(&r).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidRequest);
    }

    #[test]
    fn test_unsupported_method_rejected() {
        let r = req(Method::PATCH, "/mybucket/key", "s3.fileflow.test");
        let err = path_style_router().resolve(&r).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MethodNotAllowed);
    }
}
