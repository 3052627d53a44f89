//! The REST/public-proxy hyper `Service`: JSON admin/tenant routing, plus
//! the unauthenticated `/p/{subdomain}/{*path}` passthrough.
//!
//! 1. Route method + path (query stripped) onto an [`Operation`].
//! 2. `Login` and `Proxy` bypass authentication entirely; every other
//!    operation requires an admin JWT (admin-only endpoints) or either an
//!    admin JWT or a tenant [`Token`](fileflow_core::Token) bearer secret,
//!    gated by that token's permission set (tenant endpoints).
//! 3. Dispatch to the matching `handlers::*` function.
//! 4. Render the result as JSON, or as a streamed passthrough for the
//!    proxy plane.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use fileflow_aggregator::UpstreamClient;
use fileflow_core::{Account, Permission, Store};
use futures::StreamExt;
use http::StatusCode;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth;
use crate::body::RestBody;
use crate::error::{RestError, error_to_json};
use crate::handlers;
use crate::multipart;
use crate::query;
use crate::router::{self, Operation};

/// Builds the upstream client for a managed account. Mirrors the S3 and
/// WebDAV planes' `ClientFactory` trait so each plane crate can substitute
/// a fake client in tests without depending on the others.
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

/// Static REST-plane configuration.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub admin_username: String,
    pub admin_password: String,
    pub jwt_secret: String,
    /// Fixed upstream host template for the public proxy plane.
    pub proxy_upstream_host: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_owned(),
            admin_password: "admin".to_owned(),
            jwt_secret: "change-me-in-production".to_owned(),
            proxy_upstream_host: "r2.dev".to_owned(),
        }
    }
}

/// The REST plane's hyper `Service` implementation.
pub struct RestService {
    store: Arc<Store>,
    clients: Arc<dyn ClientFactory>,
    config: Arc<RestConfig>,
    http: reqwest::Client,
}

impl std::fmt::Debug for RestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestService").finish_non_exhaustive()
    }
}

impl RestService {
    #[must_use]
    pub fn new(store: Arc<Store>, config: RestConfig) -> Self {
        Self::with_client_factory(store, config, Arc::new(DefaultClientFactory))
    }

    #[must_use]
    pub fn with_client_factory(store: Arc<Store>, config: RestConfig, clients: Arc<dyn ClientFactory>) -> Self {
        Self { store, clients, config: Arc::new(config), http: reqwest::Client::new() }
    }
}

impl Clone for RestService {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clients: Arc::clone(&self.clients),
            config: Arc::clone(&self.config),
            http: self.http.clone(),
        }
    }
}

impl Service<http::Request<Incoming>> for RestService {
    type Response = http::Response<RestBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let store = Arc::clone(&self.store);
        let clients = Arc::clone(&self.clients);
        let config = Arc::clone(&self.config);
        let http = self.http.clone();
        Box::pin(async move { Ok(process_request(req, &store, clients.as_ref(), &config, &http).await) })
    }
}

/// Tenant endpoints' required permission, for the handful that carry one.
fn required_permission(operation: &Operation) -> Option<Permission> {
    match operation {
        Operation::ListFiles | Operation::Link => Some(Permission::Read),
        Operation::Upload => Some(Permission::Write),
        Operation::DeleteFile => Some(Permission::Delete),
        _ => None,
    }
}

async fn process_request(
    req: http::Request<Incoming>,
    store: &Arc<Store>,
    clients: &dyn ClientFactory,
    config: &RestConfig,
    http: &reqwest::Client,
) -> http::Response<RestBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let path = uri.path().to_owned();
    let query_params = query::parse(uri.query().unwrap_or(""));
    debug!(%method, %path, "processing REST request");

    let operation = match router::resolve(&method, &path) {
        Ok(op) => op,
        Err(err) => return error_response(&err),
    };

    if let Operation::Proxy { subdomain, path } = &operation {
        return serve_proxy(store, http, config, subdomain, path, req.headers()).await;
    }

    let authorization = req.headers().get(http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_owned);

    if matches!(operation, Operation::Login) {
        let (_, incoming) = req.into_parts();
        let body = match collect_body(incoming).await {
            Ok(b) => b,
            Err(_) => return error_response(&RestError::BadRequest("failed to read request body".into())),
        };
        return handle_login(&body, store, config).await;
    }

    if router::is_admin_only(&operation) {
        if let Err(err) = auth::authenticate_admin(authorization.as_deref(), &config.jwt_secret) {
            return error_response(&err);
        }
    } else {
        let principal = match auth::authenticate_tenant(authorization.as_deref(), &config.jwt_secret, store) {
            Ok(p) => p,
            Err(err) => return error_response(&err),
        };
        if let Some(perm) = required_permission(&operation) {
            if let Err(err) = auth::require_permission(&principal, perm) {
                return error_response(&err);
            }
        }
    }

    let (parts, incoming) = req.into_parts();
    let body = match collect_body(incoming).await {
        Ok(b) => b,
        Err(_) => return error_response(&RestError::BadRequest("failed to read request body".into())),
    };

    match dispatch(operation, &parts, body, &query_params, store, clients).await {
        Ok(response) => response,
        Err(err) => error_response(&err),
    }
}

async fn handle_login(body: &Bytes, store: &Arc<Store>, config: &RestConfig) -> http::Response<RestBody> {
    let _ = store;
    let req: crate::dto::LoginRequest = match parse_json(body) {
        Ok(r) => r,
        Err(err) => return error_response(&err),
    };
    match auth::login(&req.username, &req.password, &config.admin_username, &config.admin_password, &config.jwt_secret) {
        Ok(token) => json_response(StatusCode::OK, &crate::dto::LoginResponse { token }),
        Err(err) => error_response(&err),
    }
}

#[allow(clippy::too_many_lines)]
async fn dispatch(
    operation: Operation,
    parts: &http::request::Parts,
    body: Bytes,
    query_params: &[(String, String)],
    store: &Arc<Store>,
    clients: &dyn ClientFactory,
) -> Result<http::Response<RestBody>, RestError> {
    match operation {
        Operation::Login | Operation::Proxy { .. } => unreachable!("handled before dispatch"),

        Operation::ListAccounts => Ok(json_response(StatusCode::OK, &handlers::accounts::list(store).await?)),
        Operation::CreateAccount => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::CREATED, &handlers::accounts::create(store, req).await?))
        }
        Operation::GetAccount(id) => Ok(json_response(StatusCode::OK, &handlers::accounts::get(store, id).await?)),
        Operation::UpdateAccount(id) => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::OK, &handlers::accounts::update(store, id, req).await?))
        }
        Operation::DeleteAccount(id) => {
            handlers::accounts::delete(store, id).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }
        Operation::SyncAccounts => {
            let req = if body.is_empty() { crate::dto::SyncRequest::default() } else { parse_json(&body)? };
            Ok(json_response(StatusCode::OK, &handlers::accounts::sync(store, clients, req).await?))
        }
        Operation::ClearAccount(id) => Ok(json_response(StatusCode::OK, &handlers::accounts::clear(store, clients, id).await?)),
        Operation::DeleteOldFiles => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::OK, &handlers::accounts::delete_old_files(store, clients, req).await?))
        }

        Operation::ListTokens => Ok(json_response(StatusCode::OK, &handlers::tokens::list(store).await?)),
        Operation::CreateToken => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::CREATED, &handlers::tokens::create(store, req).await?))
        }
        Operation::DeleteToken(id) => {
            handlers::tokens::delete(store, id).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }

        Operation::ListS3Credentials => Ok(json_response(StatusCode::OK, &handlers::credentials::s3::list(store).await?)),
        Operation::CreateS3Credential => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::CREATED, &handlers::credentials::s3::create(store, req).await?))
        }
        Operation::DeleteS3Credential(id) => {
            handlers::credentials::s3::delete(store, id).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }

        Operation::ListWebDavCredentials => Ok(json_response(StatusCode::OK, &handlers::credentials::webdav::list(store).await?)),
        Operation::CreateWebDavCredential => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::CREATED, &handlers::credentials::webdav::create(store, req).await?))
        }
        Operation::DeleteWebDavCredential(id) => {
            handlers::credentials::webdav::delete(store, id).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }

        Operation::GetSettings => Ok(json_response(StatusCode::OK, &handlers::settings::get(store).await?)),
        Operation::UpdateSettings => {
            let req = parse_json(&body)?;
            Ok(json_response(StatusCode::OK, &handlers::settings::update(store, req).await?))
        }

        Operation::ListFiles => {
            let id_group: Vec<Uuid> = query::values(query_params, "idGroup").filter_map(|v| v.parse().ok()).collect();
            let prefix = query::value(query_params, "prefix").unwrap_or("");
            let cursor = query::value(query_params, "cursor");
            let limit: i32 = query::value(query_params, "limit").and_then(|v| v.parse().ok()).unwrap_or(100);
            Ok(json_response(StatusCode::OK, &handlers::files::list(store, clients, &id_group, prefix, cursor, limit).await?))
        }
        Operation::Upload => handle_upload(parts, body, store, clients).await,
        Operation::DeleteFile => {
            let account_id = required_uuid(query_params, "idGroup")?;
            let key = required_str(query_params, "key")?;
            handlers::files::delete_file(store, clients, account_id, key).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }
        Operation::Link => {
            let account_id = required_uuid(query_params, "idGroup")?;
            let key = required_str(query_params, "key")?;
            Ok(json_response(StatusCode::OK, &handlers::files::link(store, account_id, key).await?))
        }

        Operation::ListExpirations => Ok(json_response(StatusCode::OK, &handlers::files::list_expirations(store).await?)),
        Operation::DeleteExpiration(id) => {
            handlers::files::delete_expiration(store, id).await?;
            Ok(empty_response(StatusCode::NO_CONTENT))
        }
    }
}

async fn handle_upload(
    parts: &http::request::Parts,
    body: Bytes,
    store: &Arc<Store>,
    clients: &dyn ClientFactory,
) -> Result<http::Response<RestBody>, RestError> {
    let content_type = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RestError::BadRequest("missing Content-Type".to_owned()))?;
    let boundary = multipart::boundary_from_content_type(content_type)
        .ok_or_else(|| RestError::BadRequest("Content-Type is not multipart/form-data".to_owned()))?;
    let form_parts = multipart::parse(&body, &boundary)?;

    let file_part = form_parts
        .iter()
        .find(|p| p.name == "file")
        .ok_or_else(|| RestError::BadRequest("missing required 'file' part".to_owned()))?;
    let original_filename = file_part.filename.clone().ok_or_else(|| RestError::BadRequest("'file' part missing filename".to_owned()))?;

    let path_prefix = form_parts.iter().find(|p| p.name == "path").map(|p| String::from_utf8_lossy(&p.data).into_owned());
    let account_id = form_parts
        .iter()
        .find(|p| p.name == "idGroup")
        .map(|p| String::from_utf8_lossy(&p.data).into_owned())
        .filter(|s| !s.is_empty())
        .map(|s| Uuid::parse_str(&s).map_err(|_| RestError::BadRequest("invalid idGroup".to_owned())))
        .transpose()?;
    let expiration_days = form_parts
        .iter()
        .find(|p| p.name == "expirationDays")
        .map(|p| String::from_utf8_lossy(&p.data).into_owned())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| RestError::BadRequest("invalid expirationDays".to_owned())))
        .transpose()?;

    let request = handlers::files::build_upload_request(
        file_part.data.clone(),
        file_part.content_type.clone(),
        original_filename,
        path_prefix,
        account_id,
        expiration_days,
    );
    let outcome = handlers::files::upload(store, clients, request).await?;
    Ok(json_response(StatusCode::CREATED, &crate::dto::UploadResponse::from(outcome)))
}

async fn serve_proxy(
    store: &Arc<Store>,
    http: &reqwest::Client,
    config: &RestConfig,
    subdomain: &str,
    path: &str,
    headers: &http::HeaderMap,
) -> http::Response<RestBody> {
    if !store.settings().endpoint_proxy {
        return error_response(&RestError::NotFound("proxy plane is disabled".to_owned()));
    }

    let url = format!("https://{subdomain}.{}/{path}", config.proxy_upstream_host);
    let mut upstream_req = http.get(&url);
    for name in ["range", "if-none-match", "if-modified-since"] {
        if let Some(value) = headers.get(name) {
            upstream_req = upstream_req.header(name, value.clone());
        }
    }

    let upstream_resp = match upstream_req.send().await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(error = %err, %url, "proxy upstream request failed");
            return error_response(&RestError::Internal("proxy upstream unreachable".to_owned()));
        }
    };

    let status = StatusCode::from_u16(upstream_resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = http::Response::builder().status(status).header("Cache-Control", "public, max-age=31536000");
    for name in ["content-type", "content-length", "etag", "last-modified", "content-range", "accept-ranges"] {
        if let Some(value) = upstream_resp.headers().get(name) {
            builder = builder.header(name, value.clone());
        }
    }

    let stream = upstream_resp.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    builder.body(RestBody::from_stream(stream)).unwrap_or_else(|_| {
        http::Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).body(RestBody::empty()).expect("static response is valid")
    })
}

fn required_uuid(params: &[(String, String)], key: &str) -> Result<Uuid, RestError> {
    let raw = required_str(params, key)?;
    Uuid::parse_str(raw).map_err(|_| RestError::BadRequest(format!("invalid {key}")))
}

fn required_str<'a>(params: &'a [(String, String)], key: &str) -> Result<&'a str, RestError> {
    query::value(params, key).filter(|v| !v.is_empty()).ok_or_else(|| RestError::BadRequest(format!("missing required query parameter: {key}")))
}

fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, RestError> {
    serde_json::from_slice(body).map_err(|err| RestError::BadRequest(format!("malformed request body: {err}")))
}

fn json_response(status: StatusCode, value: &impl serde::Serialize) -> http::Response<RestBody> {
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(RestBody::from_json(value))
        .unwrap_or_else(|_| http::Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).body(RestBody::empty()).expect("static response is valid"))
}

fn empty_response(status: StatusCode) -> http::Response<RestBody> {
    http::Response::builder().status(status).body(RestBody::empty()).expect("static response is valid")
}

fn error_response(err: &RestError) -> http::Response<RestBody> {
    let status = StatusCode::from_u16(err.status_code().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    http::Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(RestBody::from_bytes(error_to_json(err)))
        .unwrap_or_else(|_| http::Response::builder().status(StatusCode::INTERNAL_SERVER_ERROR).body(RestBody::empty()).expect("static response is valid"))
}

async fn collect_body(incoming: Incoming) -> Result<Bytes, hyper::Error> {
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_permission_maps_tenant_endpoints() {
        assert_eq!(required_permission(&Operation::ListFiles), Some(Permission::Read));
        assert_eq!(required_permission(&Operation::Upload), Some(Permission::Write));
        assert_eq!(required_permission(&Operation::DeleteFile), Some(Permission::Delete));
        assert_eq!(required_permission(&Operation::ListAccounts), None);
    }

    #[test]
    fn test_required_uuid_rejects_non_uuid() {
        let params = query::parse("idGroup=not-a-uuid");
        assert!(required_uuid(&params, "idGroup").is_err());
    }

    #[test]
    fn test_required_str_rejects_missing_key() {
        let params = query::parse("key=a");
        assert!(required_str(&params, "other").is_err());
    }
}
