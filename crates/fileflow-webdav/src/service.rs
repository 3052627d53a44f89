//! The WebDAV hyper service: HTTP Basic authentication, method dispatch,
//! and response construction against the flat key-space directory model.
//!
//! 1. Strip the mount prefix, decode the path into an object key.
//! 2. HTTP Basic auth against the store's `WebDavCredential` rows.
//! 3. Permission check against the method's required capability.
//! 4. Resolve the account bound to the credential, build its upstream client.
//! 5. Dispatch the method.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use fileflow_aggregator::UpstreamClient;
use fileflow_core::{Account, Store};
use http::header::HeaderValue;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use tracing::{debug, info, warn};

use crate::auth::authenticate;
use crate::body::WebDavBody;
use crate::error::DavError;
use crate::lock::{LockManager, LockScope};
use crate::multistatus::{PropfindEntry, build_multistatus, parse_propfind_body};
use crate::path::{
    ResourceKind, collect_recursive, directory_prefix, display_name, is_directory_key, key_from_request_path,
    resolve_kind,
};

/// Builds the upstream client for a managed account. Mirrors the S3 plane's
/// `ClientFactory` trait so each plane crate can substitute a fake client in
/// tests without depending on the other plane's crate.
pub trait ClientFactory: Send + Sync + 'static {
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

/// Static configuration for the WebDAV service.
#[derive(Debug, Clone)]
pub struct WebDavConfig {
    /// The path prefix the plane is mounted under, e.g. `/webdav`.
    pub mount_prefix: String,
}

impl Default for WebDavConfig {
    fn default() -> Self {
        Self { mount_prefix: "/webdav".to_owned() }
    }
}

/// The WebDAV plane's hyper `Service` implementation.
pub struct WebDavService {
    store: Arc<Store>,
    locks: Arc<LockManager>,
    clients: Arc<dyn ClientFactory>,
    config: Arc<WebDavConfig>,
}

impl WebDavService {
    #[must_use]
    pub fn new(store: Arc<Store>, locks: Arc<LockManager>, config: WebDavConfig) -> Self {
        Self::with_client_factory(store, locks, config, Arc::new(DefaultClientFactory))
    }

    #[must_use]
    pub fn with_client_factory(
        store: Arc<Store>,
        locks: Arc<LockManager>,
        config: WebDavConfig,
        clients: Arc<dyn ClientFactory>,
    ) -> Self {
        Self { store, locks, clients, config: Arc::new(config) }
    }
}

impl Clone for WebDavService {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: Arc::clone(&self.locks),
            clients: Arc::clone(&self.clients),
            config: Arc::clone(&self.config),
        }
    }
}

impl Service<http::Request<Incoming>> for WebDavService {
    type Response = http::Response<WebDavBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let store = Arc::clone(&self.store);
        let locks = Arc::clone(&self.locks);
        let clients = Arc::clone(&self.clients);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let response = process_request(req, &store, &locks, clients.as_ref(), &config).await;
            Ok(response)
        })
    }
}

async fn process_request(
    req: http::Request<Incoming>,
    store: &Arc<Store>,
    locks: &Arc<LockManager>,
    clients: &dyn ClientFactory,
    config: &WebDavConfig,
) -> http::Response<WebDavBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, "processing webdav request");

    let authorization = req.headers().get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let credential = match authenticate(store, authorization.as_deref(), &method) {
        Ok(cred) => cred,
        Err(err) => {
            warn!(%method, %uri, error = %err, "webdav authentication failed");
            return error_response(&err, &method);
        }
    };

    let Some(account) = store.get_account(credential.account_id) else {
        return error_response(&DavError::Internal("credential's account no longer exists".to_owned()), &method);
    };

    let key = key_from_request_path(uri.path(), &config.mount_prefix);
    let client = clients.client_for(&account);

    let (parts, incoming) = req.into_parts();
    let body = match read_body(incoming).await {
        Ok(body) => body,
        Err(err) => return error_response(&err, &method),
    };

    let result = dispatch(&method, &parts, body, &key, client.as_ref(), locks, &config.mount_prefix).await;

    match result {
        Ok(response) => {
            info!(%method, %uri, status = ?response.status(), "webdav request handled");
            response
        }
        Err(err) => error_response(&err, &method),
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    method: &Method,
    parts: &http::request::Parts,
    body: Bytes,
    key: &str,
    client: &dyn UpstreamClient,
    locks: &Arc<LockManager>,
    mount_prefix: &str,
) -> Result<http::Response<WebDavBody>, DavError> {
    match method.as_str() {
        "OPTIONS" => handle_options(client, key).await,
        "PROPFIND" => handle_propfind(parts, body, client, key, mount_prefix).await,
        "GET" => handle_get(parts, client, key).await,
        "HEAD" => handle_head(client, key).await,
        "PUT" => handle_put(parts, body, client, key, locks).await,
        "DELETE" => handle_delete(parts, client, key, locks).await,
        "MKCOL" => handle_mkcol(parts, body, client, key, locks).await,
        "COPY" => handle_copy_move(parts, client, key, false, locks).await,
        "MOVE" => handle_copy_move(parts, client, key, true, locks).await,
        "LOCK" => handle_lock(parts, body, locks, key).await,
        "UNLOCK" => handle_unlock(parts, locks, key).await,
        "PROPPATCH" => handle_proppatch(),
        other => Err(DavError::MethodNotAllowed(other.to_owned())),
    }
}

async fn read_body(incoming: Incoming) -> Result<Bytes, DavError> {
    incoming
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| DavError::Internal(format!("failed to read request body: {e}")))
}

fn response_builder(status: StatusCode) -> http::response::Builder {
    http::Response::builder().status(status).header("DAV", "1, 2")
}

fn empty_response(status: StatusCode) -> http::Response<WebDavBody> {
    response_builder(status).body(WebDavBody::empty()).expect("static webdav response is valid")
}

// ---------------------------------------------------------------------------
// OPTIONS
// ---------------------------------------------------------------------------

async fn handle_options(client: &dyn UpstreamClient, key: &str) -> Result<http::Response<WebDavBody>, DavError> {
    let kind = resolve_kind(client, key).await?;
    let allow = match kind {
        ResourceKind::Missing => "OPTIONS, PUT, MKCOL, LOCK",
        ResourceKind::File => "OPTIONS, GET, HEAD, PUT, DELETE, COPY, MOVE, LOCK, UNLOCK, PROPFIND, PROPPATCH",
        ResourceKind::Directory => "OPTIONS, GET, HEAD, DELETE, COPY, MOVE, LOCK, UNLOCK, PROPFIND, MKCOL",
    };
    Ok(response_builder(StatusCode::OK).header("Allow", allow).body(WebDavBody::empty()).expect("valid response"))
}

// ---------------------------------------------------------------------------
// PROPFIND
// ---------------------------------------------------------------------------

async fn handle_propfind(
    parts: &http::request::Parts,
    body: Bytes,
    client: &dyn UpstreamClient,
    key: &str,
    mount_prefix: &str,
) -> Result<http::Response<WebDavBody>, DavError> {
    let kind = resolve_kind(client, key).await?;
    if kind == ResourceKind::Missing {
        return Err(DavError::NotFound(key.to_owned()));
    }

    let depth = parse_depth(parts);
    let request = parse_propfind_body(&body);

    let mut entries = vec![self_entry(client, key, mount_prefix).await?];

    if kind == ResourceKind::Directory && depth != Depth::Zero {
        let prefix = directory_prefix(key);
        let page = client.list_objects_v2(&prefix, None, 1000).await?;
        for child_prefix in page.prefixes {
            let href = href_for(mount_prefix, &child_prefix);
            entries.push(PropfindEntry {
                href,
                display_name: display_name(&child_prefix),
                is_collection: true,
                content_length: None,
                content_type: None,
                last_modified: None,
                etag: None,
            });
        }
        for object in page.objects {
            if object.key == prefix {
                continue;
            }
            let href = href_for(mount_prefix, &object.key);
            entries.push(PropfindEntry {
                href,
                display_name: display_name(&object.key),
                is_collection: false,
                content_length: Some(object.size),
                content_type: None,
                last_modified: object.last_modified,
                etag: object.etag,
            });
        }
    }

    let xml = build_multistatus(&entries, &request);
    Ok(http::Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header("Content-Type", "application/xml; charset=utf-8")
        .header("DAV", "1, 2")
        .body(WebDavBody::from_xml(xml))
        .expect("valid multistatus response"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Zero,
    One,
}

/// `Depth: infinity` is silently clamped to `1` to bound fan-out.
fn parse_depth(parts: &http::request::Parts) -> Depth {
    match parts.headers.get("Depth").and_then(|v| v.to_str().ok()) {
        Some("0") => Depth::Zero,
        _ => Depth::One,
    }
}

fn href_for(mount_prefix: &str, key: &str) -> String {
    format!("{mount_prefix}/{key}")
}

async fn self_entry(client: &dyn UpstreamClient, key: &str, mount_prefix: &str) -> Result<PropfindEntry, DavError> {
    if key.is_empty() {
        return Ok(PropfindEntry {
            href: format!("{mount_prefix}/"),
            display_name: "/".to_owned(),
            is_collection: true,
            content_length: None,
            content_type: None,
            last_modified: None,
            etag: None,
        });
    }

    if is_directory_key(key) {
        return Ok(PropfindEntry {
            href: href_for(mount_prefix, key),
            display_name: display_name(key),
            is_collection: true,
            content_length: None,
            content_type: None,
            last_modified: None,
            etag: None,
        });
    }

    let summary = client.head_object(key).await?;
    Ok(PropfindEntry {
        href: href_for(mount_prefix, key),
        display_name: display_name(key),
        is_collection: false,
        content_length: Some(summary.size),
        content_type: None,
        last_modified: summary.last_modified,
        etag: summary.etag,
    })
}

// ---------------------------------------------------------------------------
// GET / HEAD
// ---------------------------------------------------------------------------

async fn handle_get(
    parts: &http::request::Parts,
    client: &dyn UpstreamClient,
    key: &str,
) -> Result<http::Response<WebDavBody>, DavError> {
    if is_directory_key(key) {
        return Err(DavError::MethodNotAllowed("GET".to_owned()));
    }
    let range = parts.headers.get(http::header::RANGE).and_then(|v| v.to_str().ok());
    let body = client.get_object(key, range).await?;
    let mut builder = http::Response::builder().status(StatusCode::OK).header("DAV", "1, 2");
    builder = apply_object_headers(builder, body.content_type.as_deref(), body.etag.as_deref(), body.last_modified);
    Ok(builder.body(WebDavBody::from_bytes(body.bytes)).expect("valid get response"))
}

async fn handle_head(client: &dyn UpstreamClient, key: &str) -> Result<http::Response<WebDavBody>, DavError> {
    if is_directory_key(key) {
        return Ok(empty_response(StatusCode::OK));
    }
    let summary = client.head_object(key).await?;
    let mut builder = http::Response::builder().status(StatusCode::OK).header("DAV", "1, 2");
    builder = apply_object_headers(builder, None, summary.etag.as_deref(), summary.last_modified);
    builder = builder.header("Content-Length", summary.size);
    Ok(builder.body(WebDavBody::empty()).expect("valid head response"))
}

fn apply_object_headers(
    mut builder: http::response::Builder,
    content_type: Option<&str>,
    etag: Option<&str>,
    last_modified: Option<chrono::DateTime<Utc>>,
) -> http::response::Builder {
    if let Some(ct) = content_type {
        if let Ok(hv) = HeaderValue::from_str(ct) {
            builder = builder.header("Content-Type", hv);
        }
    }
    if let Some(tag) = etag {
        let quoted = format!("\"{tag}\"");
        if let Ok(hv) = HeaderValue::from_str(&quoted) {
            builder = builder.header("ETag", hv);
        }
    }
    if let Some(lm) = last_modified {
        let formatted = lm.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(hv) = HeaderValue::from_str(&formatted) {
            builder = builder.header("Last-Modified", hv);
        }
    }
    builder
}

// ---------------------------------------------------------------------------
// PUT
// ---------------------------------------------------------------------------

/// Reject the request with 423 Locked if `key` carries a lock the
/// request's `If:` header doesn't name.
fn check_lock(locks: &LockManager, parts: &http::request::Parts, key: &str) -> Result<(), DavError> {
    let if_header = parts.headers.get("If").and_then(|v| v.to_str().ok());
    if locks.check_if_header(key, if_header) {
        Ok(())
    } else {
        Err(DavError::Locked(key.to_owned()))
    }
}

async fn handle_put(
    parts: &http::request::Parts,
    body: Bytes,
    client: &dyn UpstreamClient,
    key: &str,
    locks: &LockManager,
) -> Result<http::Response<WebDavBody>, DavError> {
    if is_directory_key(key) {
        return Err(DavError::Conflict("cannot PUT a collection resource".to_owned()));
    }
    check_lock(locks, parts, key)?;
    let existed = matches!(resolve_kind(client, key).await?, ResourceKind::File);
    let content_type = parts.headers.get(http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    client.put_object(key, body, content_type).await?;
    Ok(empty_response(if existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED }))
}

// ---------------------------------------------------------------------------
// DELETE
// ---------------------------------------------------------------------------

async fn handle_delete(
    parts: &http::request::Parts,
    client: &dyn UpstreamClient,
    key: &str,
    locks: &LockManager,
) -> Result<http::Response<WebDavBody>, DavError> {
    let kind = resolve_kind(client, key).await?;
    if kind == ResourceKind::Missing {
        return Err(DavError::NotFound(key.to_owned()));
    }
    check_lock(locks, parts, key)?;

    if kind == ResourceKind::Directory {
        let prefix = directory_prefix(key);
        let mut keys = collect_recursive(client, &prefix).await?;
        keys.push(prefix);
        delete_in_batches(client, &keys).await?;
    } else {
        client.delete_object(key).await?;
    }
    Ok(empty_response(StatusCode::NO_CONTENT))
}

async fn delete_in_batches(client: &dyn UpstreamClient, keys: &[String]) -> Result<(), DavError> {
    for chunk in keys.chunks(1000) {
        client.delete_objects(chunk).await?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MKCOL
// ---------------------------------------------------------------------------

async fn handle_mkcol(
    parts: &http::request::Parts,
    body: Bytes,
    client: &dyn UpstreamClient,
    key: &str,
    locks: &LockManager,
) -> Result<http::Response<WebDavBody>, DavError> {
    if let Some(len) = parts.headers.get(http::header::CONTENT_LENGTH).and_then(|v| v.to_str().ok()) {
        if len.parse::<u64>().unwrap_or(0) > 0 {
            return Err(DavError::UnsupportedMediaType);
        }
    }
    if !body.is_empty() {
        return Err(DavError::UnsupportedMediaType);
    }
    check_lock(locks, parts, key)?;

    let prefix = directory_prefix(key);
    if resolve_kind(client, &prefix).await? != ResourceKind::Missing {
        return Err(DavError::MethodNotAllowed("MKCOL".to_owned()));
    }
    client.put_object(&prefix, Bytes::new(), None).await?;
    Ok(empty_response(StatusCode::CREATED))
}

// ---------------------------------------------------------------------------
// COPY / MOVE
// ---------------------------------------------------------------------------

async fn handle_copy_move(
    parts: &http::request::Parts,
    client: &dyn UpstreamClient,
    key: &str,
    is_move: bool,
    locks: &LockManager,
) -> Result<http::Response<WebDavBody>, DavError> {
    let destination_header = parts
        .headers
        .get("Destination")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DavError::BadRequest("missing Destination header".to_owned()))?;
    let dest_key = destination_key(destination_header)?;

    if dest_key == key {
        return Err(DavError::Forbidden("source and destination are the same resource".to_owned()));
    }

    if is_move {
        check_lock(locks, parts, key)?;
    }
    check_lock(locks, parts, &dest_key)?;

    let overwrite_allowed = !parts.headers.get("Overwrite").and_then(|v| v.to_str().ok()).is_some_and(|v| v.eq_ignore_ascii_case("F"));

    let kind = resolve_kind(client, key).await?;
    if kind == ResourceKind::Missing {
        return Err(DavError::NotFound(key.to_owned()));
    }

    let dest_existed = resolve_kind(client, &dest_key).await? != ResourceKind::Missing;
    if dest_existed && !overwrite_allowed {
        return Err(DavError::PreconditionFailed("destination exists and Overwrite: F was set".to_owned()));
    }

    if kind == ResourceKind::Directory {
        copy_directory(client, key, &dest_key).await?;
        if is_move {
            let source_prefix = directory_prefix(key);
            let mut keys = collect_recursive(client, &source_prefix).await?;
            keys.push(source_prefix);
            delete_in_batches(client, &keys).await?;
        }
    } else {
        client.copy_object(key, &dest_key).await?;
        if is_move {
            client.delete_object(key).await?;
        }
    }

    Ok(empty_response(if dest_existed { StatusCode::NO_CONTENT } else { StatusCode::CREATED }))
}

async fn copy_directory(client: &dyn UpstreamClient, source_key: &str, dest_key: &str) -> Result<(), DavError> {
    let source_prefix = directory_prefix(source_key);
    let dest_prefix = directory_prefix(dest_key);
    client.put_object(&dest_prefix, Bytes::new(), None).await?;
    let keys = collect_recursive(client, &source_prefix).await?;
    for source in keys {
        let Some(relative) = source.strip_prefix(&source_prefix) else { continue };
        let dest = format!("{dest_prefix}{relative}");
        client.copy_object(&source, &dest).await?;
    }
    Ok(())
}

/// Parse the `Destination` header into a relative object key. COPY/MOVE are
/// same-host only, so any scheme and authority are discarded rather than
/// validated against the current request's host.
fn destination_key(header_value: &str) -> Result<String, DavError> {
    let path = header_value
        .parse::<http::Uri>()
        .map(|uri| uri.path().to_owned())
        .unwrap_or_else(|_| header_value.to_owned());
    let trimmed = path.trim_start_matches('/');
    Ok(trimmed.split_once('/').map_or(String::new(), |(_, rest)| rest.to_owned()))
}

// ---------------------------------------------------------------------------
// LOCK / UNLOCK
// ---------------------------------------------------------------------------

async fn handle_lock(
    parts: &http::request::Parts,
    body: Bytes,
    locks: &Arc<LockManager>,
    key: &str,
) -> Result<http::Response<WebDavBody>, DavError> {
    if let Some(if_header) = parts.headers.get("If").and_then(|v| v.to_str().ok()) {
        let token = extract_token(if_header);
        let timeout = parse_timeout(parts);
        if let Some(token) = token {
            let refreshed = locks.refresh(key, &token, timeout).map_err(|e| DavError::Locked(e.to_string()))?;
            return Ok(lock_response(StatusCode::OK, &refreshed.token, refreshed.depth_infinity));
        }
    }

    let scope = if String::from_utf8_lossy(&body).contains("<D:shared") { LockScope::Shared } else { LockScope::Exclusive };
    let depth_infinity = parts.headers.get("Depth").and_then(|v| v.to_str().ok()) != Some("0");
    let timeout = parse_timeout(parts);

    let lock = locks.acquire(key, scope, depth_infinity, None, timeout).map_err(|e| DavError::Locked(e.to_string()))?;
    Ok(lock_response(StatusCode::OK, &lock.token, lock.depth_infinity))
}

fn lock_response(status: StatusCode, token: &str, depth_infinity: bool) -> http::Response<WebDavBody> {
    let depth = if depth_infinity { "infinity" } else { "0" };
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<D:prop xmlns:D=\"DAV:\"><D:lockdiscovery><D:activelock>\
<D:locktype><D:write/></D:locktype><D:lockscope><D:exclusive/></D:lockscope>\
<D:depth>{depth}</D:depth><D:locktoken><D:href>{token}</D:href></D:locktoken>\
</D:activelock></D:lockdiscovery></D:prop>"
    );
    http::Response::builder()
        .status(status)
        .header("Content-Type", "application/xml; charset=utf-8")
        .header("Lock-Token", format!("<{token}>"))
        .header("DAV", "1, 2")
        .body(WebDavBody::from_xml(xml.into_bytes()))
        .expect("valid lock response")
}

async fn handle_unlock(
    parts: &http::request::Parts,
    locks: &Arc<LockManager>,
    key: &str,
) -> Result<http::Response<WebDavBody>, DavError> {
    let header = parts
        .headers
        .get("Lock-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| DavError::BadRequest("missing Lock-Token header".to_owned()))?;
    let token = header.trim_start_matches('<').trim_end_matches('>');
    locks.release(key, token).map_err(|e| DavError::Conflict(e.to_string()))?;
    Ok(empty_response(StatusCode::NO_CONTENT))
}

fn extract_token(if_header: &str) -> Option<String> {
    let start = if_header.find("urn:uuid:")?;
    let rest = &if_header[start..];
    let end = rest.find('>').unwrap_or(rest.len());
    Some(rest[..end].to_owned())
}

fn parse_timeout(parts: &http::request::Parts) -> Option<i64> {
    let value = parts.headers.get("Timeout").and_then(|v| v.to_str().ok())?;
    value.strip_prefix("Second-").and_then(|n| n.parse::<i64>().ok())
}

// ---------------------------------------------------------------------------
// PROPPATCH — accepted but not persisted; no custom dead properties exist
// to store against the flat key-space model.
// ---------------------------------------------------------------------------

fn handle_proppatch() -> Result<http::Response<WebDavBody>, DavError> {
    Ok(empty_response(StatusCode::MULTI_STATUS))
}

// ---------------------------------------------------------------------------
// Error rendering
// ---------------------------------------------------------------------------

fn error_response(err: &DavError, method: &Method) -> http::Response<WebDavBody> {
    let status = err.status_code();
    if method.as_str() == "PROPFIND" {
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><D:error xmlns:D=\"DAV:\"><D:message>{err}</D:message></D:error>"
        );
        return http::Response::builder()
            .status(status)
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(WebDavBody::from_xml(xml.into_bytes()))
            .expect("valid error response");
    }
    let mut builder = response_builder(status);
    if status == StatusCode::UNAUTHORIZED {
        builder = builder.header("WWW-Authenticate", "Basic realm=\"FileFlow WebDAV\"");
    }
    builder.body(WebDavBody::empty()).expect("valid error response")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use fileflow_aggregator::{ListPage, ObjectBody, ObjectSummary, UsageSnapshot, UploadedPart};
    use fileflow_core::{
        Backend, Capabilities, Data, FileFlowError, FileFlowResult, Permission, PermissionSet, Quota, Usage,
        UpstreamError, WebDavCredential,
    };
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use uuid::Uuid;

    use super::*;

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

    /// An in-memory key-value store standing in for an upstream bucket,
    /// good enough to exercise every handler's directory-model logic.
    #[derive(Default)]
    struct FakeClient {
        objects: Mutex<HashMap<String, Bytes>>,
    }

    fn summary_for(key: &str, bytes: &Bytes) -> ObjectSummary {
        ObjectSummary { key: key.to_owned(), size: bytes.len() as i64, last_modified: None, etag: Some("etag".to_owned()) }
    }

    #[async_trait]
    impl UpstreamClient for FakeClient {
        async fn list_objects_v2(&self, prefix: &str, _cursor: Option<&str>, _max: i32) -> FileFlowResult<ListPage> {
            let objects = self.objects.lock();
            let mut prefixes = std::collections::BTreeSet::new();
            let mut entries = Vec::new();
            for (key, bytes) in objects.iter() {
                let Some(rest) = key.strip_prefix(prefix) else { continue };
                if rest.is_empty() {
                    entries.push(summary_for(key, bytes));
                    continue;
                }
                match rest.find('/') {
                    Some(slash) => {
                        prefixes.insert(format!("{prefix}{}/", &rest[..slash]));
                    }
                    None => entries.push(summary_for(key, bytes)),
                }
            }
            Ok(ListPage { prefixes: prefixes.into_iter().collect(), objects: entries, next_cursor: None })
        }

        async fn put_object(&self, key: &str, body: Bytes, _content_type: Option<&str>) -> FileFlowResult<ObjectSummary> {
            let summary = summary_for(key, &body);
            self.objects.lock().insert(key.to_owned(), body);
            Ok(summary)
        }

        async fn get_object(&self, key: &str, _range: Option<&str>) -> FileFlowResult<ObjectBody> {
            let objects = self.objects.lock();
            let bytes = objects.get(key).cloned().ok_or_else(|| FileFlowError::Upstream(UpstreamError::NotFound(key.to_owned())))?;
            Ok(ObjectBody { bytes, content_type: Some("text/plain".to_owned()), etag: Some("etag".to_owned()), last_modified: None })
        }

        async fn head_object(&self, key: &str) -> FileFlowResult<ObjectSummary> {
            let objects = self.objects.lock();
            let bytes = objects.get(key).ok_or_else(|| FileFlowError::Upstream(UpstreamError::NotFound(key.to_owned())))?;
            Ok(summary_for(key, bytes))
        }

        async fn delete_object(&self, key: &str) -> FileFlowResult<()> {
            self.objects.lock().remove(key);
            Ok(())
        }

        async fn delete_objects(&self, keys: &[String]) -> FileFlowResult<Vec<String>> {
            let mut objects = self.objects.lock();
            for key in keys {
                objects.remove(key);
            }
            Ok(keys.to_vec())
        }

        async fn copy_object(&self, source: &str, dest: &str) -> FileFlowResult<ObjectSummary> {
            let mut objects = self.objects.lock();
            let bytes = objects.get(source).cloned().ok_or_else(|| FileFlowError::Upstream(UpstreamError::NotFound(source.to_owned())))?;
            let summary = summary_for(dest, &bytes);
            objects.insert(dest.to_owned(), bytes);
            Ok(summary)
        }

        async fn create_multipart_upload(&self, _key: &str, _content_type: Option<&str>) -> FileFlowResult<String> {
            unimplemented!("not exercised by the webdav plane")
        }
        async fn upload_part(&self, _key: &str, _upload_id: &str, _part_number: i32, _body: Bytes) -> FileFlowResult<UploadedPart> {
            unimplemented!("not exercised by the webdav plane")
        }
        async fn complete_multipart_upload(&self, _key: &str, _upload_id: &str, _parts: &[(i32, String)]) -> FileFlowResult<ObjectSummary> {
            unimplemented!("not exercised by the webdav plane")
        }
        async fn abort_multipart_upload(&self, _key: &str, _upload_id: &str) -> FileFlowResult<()> {
            unimplemented!("not exercised by the webdav plane")
        }
        async fn query_usage(&self, _upstream_account_id: &str) -> FileFlowResult<UsageSnapshot> {
            unimplemented!("not exercised by the webdav plane")
        }
    }

    struct FakeClientFactory(Arc<FakeClient>);

    impl ClientFactory for FakeClientFactory {
        fn client_for(&self, _account: &Account) -> Arc<dyn UpstreamClient> {
            Arc::clone(&self.0) as Arc<dyn UpstreamClient>
        }
    }

    fn test_account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: "acct".to_owned(),
            active: true,
            upstream_account_id: "a".to_owned(),
            access_key_id: "ak".to_owned(),
            secret_access_key: "sk".to_owned(),
            bucket_name: "bucket".to_owned(),
            endpoint_url: String::new(),
            public_domain: "example.com".to_owned(),
            analytics_token: None,
            quota: Quota { max_size_bytes: 1000, max_class_a_ops: 1000 },
            usage: Usage::default(),
            capabilities: Capabilities::default(),
            created_at: now,
            updated_at: now,
        }
    }

    struct Harness {
        store: Arc<Store>,
        locks: Arc<LockManager>,
        client: Arc<FakeClient>,
        config: WebDavConfig,
    }

    impl Harness {
        fn new(permissions: &[Permission]) -> Self {
            let account = test_account();
            let mut data = Data::default();
            data.accounts.push(account.clone());
            data.webdav_credentials.push(WebDavCredential {
                id: Uuid::new_v4(),
                username: "alice".to_owned(),
                password: "secret".to_owned(),
                account_id: account.id,
                description: String::new(),
                permissions: PermissionSet(permissions.to_vec()),
                active: true,
                created_at: Utc::now(),
                last_used_at: None,
            });
            let store = Arc::new(Store::new(data, Arc::new(FakeBackend)));
            Harness {
                store,
                locks: LockManager::new(),
                client: Arc::new(FakeClient::default()),
                config: WebDavConfig::default(),
            }
        }

        async fn authenticated(&self, method: &str, path: &str, body: &'static [u8], headers: &[(&str, &str)]) -> http::Response<WebDavBody> {
            let req = http::Request::builder()
                .method(method)
                .uri(path)
                .header(http::header::AUTHORIZATION, basic_auth("alice", "secret"));
            let req = headers.iter().fold(req, |b, (k, v)| b.header(*k, *v)).body(()).unwrap();
            let (parts, _) = req.into_parts();
            let authorization = parts.headers.get(http::header::AUTHORIZATION).unwrap().to_str().unwrap().to_owned();
            let credential = authenticate(&self.store, Some(authorization.as_str()), &parts.method).expect("auth should succeed in this harness");
            let account = self.store.get_account(credential.account_id).expect("account exists");
            let _ = account;
            let key = key_from_request_path(parts.uri.path(), &self.config.mount_prefix);
            let client = Arc::clone(&self.client) as Arc<dyn UpstreamClient>;
            let method = parts.method.clone();
            dispatch(&method, &parts, Bytes::from_static(body), &key, client.as_ref(), &self.locks, &self.config.mount_prefix)
                .await
                .unwrap_or_else(|err| error_response(&err, &method))
        }
    }

    fn basic_auth(user: &str, pass: &str) -> String {
        use base64::Engine;
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(format!("{user}:{pass}")))
    }

    async fn body_text(response: http::Response<WebDavBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn mkcol_then_put_then_propfind_depth_one_lists_child() {
        let harness = Harness::new(&[Permission::Read, Permission::Write, Permission::Delete]);

        let mkcol = harness.authenticated("MKCOL", "/webdav/new/", b"", &[]).await;
        assert_eq!(mkcol.status(), StatusCode::CREATED);

        let put = harness.authenticated("PUT", "/webdav/new/a.txt", b"hello", &[]).await;
        assert_eq!(put.status(), StatusCode::CREATED);

        let propfind = harness.authenticated("PROPFIND", "/webdav/new/", b"", &[("Depth", "1")]).await;
        assert_eq!(propfind.status(), StatusCode::MULTI_STATUS);
        let text = body_text(propfind).await;
        assert_eq!(text.matches("<D:href>").count(), 2);
        assert!(text.contains("a.txt"));
        assert!(text.contains("<D:getcontentlength>5</D:getcontentlength>"));
    }

    #[tokio::test]
    async fn propfind_depth_zero_reports_only_self() {
        let harness = Harness::new(&[Permission::Read, Permission::Write]);
        harness.authenticated("MKCOL", "/webdav/dir/", b"", &[]).await;
        harness.authenticated("PUT", "/webdav/dir/a.txt", b"hi", &[]).await;

        let propfind = harness.authenticated("PROPFIND", "/webdav/dir/", b"", &[("Depth", "0")]).await;
        let text = body_text(propfind).await;
        assert_eq!(text.matches("<D:href>").count(), 1);
    }

    #[tokio::test]
    async fn put_overwrite_returns_no_content() {
        let harness = Harness::new(&[Permission::Write]);
        let first = harness.authenticated("PUT", "/webdav/a.txt", b"one", &[]).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = harness.authenticated("PUT", "/webdav/a.txt", b"two-two", &[]).await;
        assert_eq!(second.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn mkcol_on_existing_directory_is_rejected() {
        let harness = Harness::new(&[Permission::Write]);
        let first = harness.authenticated("MKCOL", "/webdav/dir/", b"", &[]).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = harness.authenticated("MKCOL", "/webdav/dir/", b"", &[]).await;
        assert_eq!(second.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn mkcol_with_body_is_rejected() {
        let harness = Harness::new(&[Permission::Write]);
        let response = harness.authenticated("MKCOL", "/webdav/dir2/", b"<xml/>", &[]).await;
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn delete_on_directory_removes_every_descendant() {
        let harness = Harness::new(&[Permission::Read, Permission::Write, Permission::Delete]);
        harness.authenticated("MKCOL", "/webdav/dir/", b"", &[]).await;
        harness.authenticated("PUT", "/webdav/dir/a.txt", b"hi", &[]).await;
        harness.authenticated("PUT", "/webdav/dir/b.txt", b"yo", &[]).await;

        let delete = harness.authenticated("DELETE", "/webdav/dir/", b"", &[]).await;
        assert_eq!(delete.status(), StatusCode::NO_CONTENT);

        let head = harness.authenticated("HEAD", "/webdav/dir/a.txt", b"", &[]).await;
        assert_eq!(head.status(), StatusCode::NOT_FOUND);
        assert!(harness.client.objects.lock().is_empty());
    }

    #[tokio::test]
    async fn copy_then_move_relocate_a_file() {
        let harness = Harness::new(&[Permission::Read, Permission::Write, Permission::Delete]);
        harness.authenticated("PUT", "/webdav/a.txt", b"content", &[]).await;

        let copy = harness.authenticated("COPY", "/webdav/a.txt", b"", &[("Destination", "/webdav/b.txt")]).await;
        assert_eq!(copy.status(), StatusCode::CREATED);
        assert!(harness.client.objects.lock().contains_key("b.txt"));
        assert!(harness.client.objects.lock().contains_key("a.txt"));

        let move_resp = harness.authenticated("MOVE", "/webdav/b.txt", b"", &[("Destination", "/webdav/c.txt")]).await;
        assert_eq!(move_resp.status(), StatusCode::CREATED);
        assert!(!harness.client.objects.lock().contains_key("b.txt"));
        assert!(harness.client.objects.lock().contains_key("c.txt"));
    }

    #[tokio::test]
    async fn copy_with_overwrite_false_against_existing_destination_fails() {
        let harness = Harness::new(&[Permission::Read, Permission::Write]);
        harness.authenticated("PUT", "/webdav/a.txt", b"1", &[]).await;
        harness.authenticated("PUT", "/webdav/b.txt", b"2", &[]).await;

        let response = harness
            .authenticated("COPY", "/webdav/a.txt", b"", &[("Destination", "/webdav/b.txt"), ("Overwrite", "F")])
            .await;
        assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);
    }

    #[tokio::test]
    async fn lock_then_unlock_round_trips() {
        let harness = Harness::new(&[Permission::Write]);
        harness.authenticated("PUT", "/webdav/a.txt", b"1", &[]).await;

        let lock = harness.authenticated("LOCK", "/webdav/a.txt", b"<D:lockinfo/>", &[]).await;
        assert_eq!(lock.status(), StatusCode::OK);
        let token = lock.headers().get("Lock-Token").unwrap().to_str().unwrap().trim_start_matches('<').trim_end_matches('>').to_owned();

        let blocked = harness.authenticated("PUT", "/webdav/a.txt", b"2", &[]).await;
        assert_eq!(blocked.status(), StatusCode::LOCKED);

        let allowed = harness.authenticated("PUT", "/webdav/a.txt", b"3", &[("If", &format!("(<{token}>)"))]).await;
        assert_eq!(allowed.status(), StatusCode::NO_CONTENT);

        let unlock = harness
            .authenticated("UNLOCK", "/webdav/a.txt", b"", &[("Lock-Token", &format!("<{token}>"))])
            .await;
        assert_eq!(unlock.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn options_reports_method_list_per_resource_kind() {
        let harness = Harness::new(&[Permission::Read]);
        let missing = harness.authenticated("OPTIONS", "/webdav/ghost.txt", b"", &[]).await;
        let allow = missing.headers().get("Allow").unwrap().to_str().unwrap();
        assert!(allow.contains("MKCOL"));
    }

    #[tokio::test]
    async fn read_only_credential_cannot_put() {
        let harness = Harness::new(&[Permission::Read]);
        let authorization = basic_auth("alice", "secret");
        let err = authenticate(&harness.store, Some(authorization.as_str()), &Method::PUT).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let harness = Harness::new(&[Permission::Read]);
        let authorization = basic_auth("alice", "wrong");
        let err = authenticate(&harness.store, Some(authorization.as_str()), &Method::GET).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
