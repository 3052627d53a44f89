//! The main S3 HTTP service implementing hyper's `Service` trait.
//!
//! Ties routing, mandatory SigV4 authentication, operation dispatch, and
//! response serialization into a single hyper-compatible service:
//!
//! 1. CORS preflight (`OPTIONS`)
//! 2. Request routing via [`S3Router`]
//! 3. Request body collection and `x-amz-content-sha256` validation
//! 4. SigV4 verification against the store's `S3Credential` rows, decoding
//!    `aws-chunked` bodies when present
//! 5. Permission check against the routed operation
//! 6. Operation dispatch to the [`S3Handler`]
//! 7. Common response headers (`x-amz-request-id`, `Server`, `Date`)

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use fileflow_core::Store;
use fileflow_s3_auth::credentials::CredentialProvider;
use fileflow_s3_auth::sigv4::{derive_signing_key, parse_authorization_header};
use fileflow_s3_auth::streaming::{self, STREAMING_SENTINEL};
use fileflow_s3_auth::{AuthError, hash_payload, verify_sigv4};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::body::S3ResponseBody;
use crate::dispatch::{S3Handler, dispatch_operation};
use crate::error::{S3Error, S3ErrorCode};
use crate::response::error_to_response;
use crate::router::S3Router;

/// Configuration for the S3 HTTP service, driven by [`fileflow_core::Settings`].
#[derive(Debug, Clone)]
pub struct S3HttpConfig {
    /// The base domain for virtual-hosted-style requests.
    pub domain: String,
    /// Whether to recognize virtual-hosted-style bucket addressing.
    pub virtual_hosting: bool,
}

/// Resolves S3 secret keys from the store's `S3Credential` rows.
struct StoreCredentialProvider {
    store: Arc<Store>,
}

impl CredentialProvider for StoreCredentialProvider {
    fn get_secret_key(&self, access_key_id: &str) -> Result<String, AuthError> {
        self.store
            .find_s3_credential(access_key_id)
            .map(|cred| cred.secret_access_key)
            .ok_or_else(|| AuthError::AccessKeyNotFound(access_key_id.to_owned()))
    }
}

/// The S3 HTTP service that implements hyper's `Service` trait.
pub struct S3HttpService<H: S3Handler> {
    handler: Arc<H>,
    router: S3Router,
    store: Arc<Store>,
    config: Arc<S3HttpConfig>,
}

impl<H: S3Handler> S3HttpService<H> {
    #[must_use]
    pub fn new(handler: Arc<H>, store: Arc<Store>, config: S3HttpConfig) -> Self {
        let router = S3Router::new(&config.domain, config.virtual_hosting);
        Self {
            handler,
            router,
            store,
            config: Arc::new(config),
        }
    }
}

impl<H: S3Handler> Clone for S3HttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            router: self.router.clone(),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for S3HttpService<H> {
    type Response = http::Response<S3ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let router = self.router.clone();
        let store = Arc::clone(&self.store);

        Box::pin(async move {
            let request_id = Uuid::new_v4().to_string();
            let response = process_request(req, handler.as_ref(), &router, &store, &request_id).await;
            let response = add_common_headers(response, &request_id);
            Ok(response)
        })
    }
}

async fn process_request<H: S3Handler>(
    req: http::Request<Incoming>,
    handler: &H,
    router: &S3Router,
    store: &Arc<Store>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!(%method, %uri, request_id, "processing S3 request");

    if method == http::Method::OPTIONS {
        return cors_preflight_response();
    }

    let ctx = match router.resolve(&req) {
        Ok(ctx) => ctx,
        Err(err) => {
            warn!(%method, %uri, error = %err, request_id, "failed to route S3 request");
            return error_to_response(&err, request_id);
        }
    };

    info!(operation = ?ctx.operation, bucket = ?ctx.bucket, key = ?ctx.key, request_id, "routed S3 request");

    let (parts, incoming) = req.into_parts();
    let raw_body = match collect_body(incoming).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, request_id, "failed to collect request body");
            return error_to_response(&S3Error::internal_error("failed to read request body"), request_id);
        }
    };

    if let Err(err) = validate_content_sha256(&parts, &raw_body) {
        warn!(error = %err.message, request_id, "content SHA256 mismatch");
        return error_to_response(&err, request_id);
    }

    let provider = StoreCredentialProvider { store: Arc::clone(store) };
    let (auth_result, body) = match authenticate(&parts, raw_body, &provider) {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, request_id, "authentication failed");
            let s3_err = S3Error::with_message(S3ErrorCode::AccessDenied, err.to_string());
            return error_to_response(&s3_err, request_id);
        }
    };

    let Some(credential) = store.find_s3_credential(&auth_result.access_key_id) else {
        return error_to_response(&S3Error::access_denied(auth_result.access_key_id), request_id);
    };
    if !credential.permissions.allows(ctx.operation.required_permission()) {
        return error_to_response(&S3Error::access_denied(auth_result.access_key_id), request_id);
    }

    let store_for_touch = Arc::clone(store);
    let access_key_id = auth_result.access_key_id.clone();
    tokio::spawn(async move {
        if let Err(err) = store_for_touch.touch_s3_credential_last_used(&access_key_id).await {
            warn!(error = %err, "failed to record S3 credential last-used timestamp");
        }
    });

    match dispatch_operation(handler, ctx, parts, body, &auth_result.access_key_id).await {
        Ok(response) => response,
        Err(err) => {
            debug!(error = %err, request_id, "S3 operation returned error");
            error_to_response(&err, request_id)
        }
    }
}

/// Verify the request's SigV4 signature, decoding an `aws-chunked` body into
/// its plaintext if present.
fn authenticate(
    parts: &http::request::Parts,
    raw_body: Bytes,
    provider: &dyn CredentialProvider,
) -> Result<(fileflow_s3_auth::AuthResult, Bytes), AuthError> {
    let content_sha256 = parts.headers.get("x-amz-content-sha256").and_then(|v| v.to_str().ok());
    let body_hash = content_sha256.map(str::to_owned).unwrap_or_else(|| hash_payload(&raw_body));

    let auth_result = verify_sigv4(parts, &body_hash, provider)?;

    if content_sha256 == Some(STREAMING_SENTINEL) {
        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingAuthHeader)?;
        let parsed = parse_authorization_header(auth_header)?;
        let secret_key = provider.get_secret_key(&parsed.access_key_id)?;
        let signing_key = derive_signing_key(&secret_key, &parsed.date, &parsed.region, &parsed.service);
        let date_scope = format!("{}/{}/{}/aws4_request", parsed.date, parsed.region, parsed.service);
        let decoded = streaming::decode_and_verify_chunked(&raw_body, &signing_key, &date_scope, &parsed.signature)?;
        Ok((auth_result, Bytes::from(decoded)))
    } else {
        Ok((auth_result, raw_body))
    }
}

async fn collect_body(incoming: Incoming) -> Result<Bytes, hyper::Error> {
    let collected = incoming.collect().await?;
    Ok(collected.to_bytes())
}

/// Validate `x-amz-content-sha256` against the actual body, when it's a
/// concrete hex digest rather than the streaming/unsigned sentinels.
fn validate_content_sha256(parts: &http::request::Parts, body: &[u8]) -> Result<(), S3Error> {
    let Some(header_value) = parts.headers.get("x-amz-content-sha256") else {
        return Ok(());
    };
    let hash_str = header_value.to_str().map_err(|_| {
        S3Error::with_message(S3ErrorCode::XAmzContentSHA256Mismatch, "invalid x-amz-content-sha256 header encoding")
    })?;

    if matches!(hash_str, "UNSIGNED-PAYLOAD") || hash_str.starts_with("STREAMING-") {
        return Ok(());
    }

    if hash_str.len() != 64 || !hash_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(S3Error::with_message(
            S3ErrorCode::XAmzContentSHA256Mismatch,
            format!("the provided x-amz-content-sha256 header is not valid: {hash_str}"),
        ));
    }

    let actual = hex::encode(Sha256::digest(body));
    if actual != hash_str {
        return Err(S3Error::with_message(
            S3ErrorCode::XAmzContentSHA256Mismatch,
            "the provided x-amz-content-sha256 header does not match the computed digest",
        ));
    }

    Ok(())
}

fn cors_preflight_response() -> http::Response<S3ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, PUT, POST, DELETE, HEAD, OPTIONS")
        .header("Access-Control-Allow-Headers", "*, Authorization, Content-Type, x-amz-*")
        .header("Access-Control-Max-Age", "86400")
        .body(S3ResponseBody::empty())
        .expect("static CORS response should be valid")
}

fn add_common_headers(mut response: http::Response<S3ResponseBody>, request_id: &str) -> http::Response<S3ResponseBody> {
    let headers = response.headers_mut();
    if let Ok(hv) = http::header::HeaderValue::from_str(request_id) {
        headers.insert("x-amz-request-id", hv.clone());
        headers.insert("x-amz-id-2", hv);
    }
    headers.insert("Server", http::header::HeaderValue::from_static("FileFlowS3"));
    headers.insert("Access-Control-Allow-Origin", http::header::HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Expose-Headers",
        http::header::HeaderValue::from_static("x-amz-request-id, x-amz-id-2, ETag"),
    );
    response
}
