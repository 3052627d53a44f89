//! Gateway service that dispatches each request to the REST, S3, or
//! WebDAV access plane.
//!
//! Routing precedence:
//! 1. Virtual-hosted-style S3 (`Host: {bucket}.{s3_base_domain}`), when
//!    `Settings.s3_virtual_hosted_style` is enabled — the bucket travels in
//!    the `Host` header, so the request is forwarded untouched.
//! 2. Path-style S3, mounted at `/s3` — the prefix is stripped before the
//!    S3 router resolves the first remaining segment as the bucket.
//! 3. WebDAV, mounted at `/webdav` — forwarded untouched; the plane strips
//!    its own mount prefix while building object keys.
//! 4. Everything else falls through to the REST plane (admin/tenant JSON
//!    API, plus the unauthenticated `/p/{subdomain}/{*path}` proxy).

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use fileflow_core::Store;
use fileflow_rest::RestService;
use fileflow_s3::dispatch::S3Handler;
use fileflow_s3::service::S3HttpService;
use fileflow_webdav::WebDavService;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::Service;

/// Type-erased response body shared by all three access planes.
pub type GatewayBody = BoxBody<Bytes, io::Error>;

/// Routes requests across the REST, S3, and WebDAV planes and normalizes
/// their distinct response body types into [`GatewayBody`].
pub struct GatewayService<H: S3Handler> {
    store: Arc<Store>,
    s3: S3HttpService<H>,
    webdav: WebDavService,
    rest: RestService,
}

impl<H: S3Handler> GatewayService<H> {
    #[must_use]
    pub fn new(store: Arc<Store>, s3: S3HttpService<H>, webdav: WebDavService, rest: RestService) -> Self {
        Self { store, s3, webdav, rest }
    }
}

impl<H: S3Handler> Clone for GatewayService<H> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            s3: self.s3.clone(),
            webdav: self.webdav.clone(),
            rest: self.rest.clone(),
        }
    }
}

impl<H: S3Handler> Service<http::Request<Incoming>> for GatewayService<H> {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, mut req: http::Request<Incoming>) -> Self::Future {
        let settings = self.store.settings();
        let vhs_bucket = settings
            .s3_virtual_hosted_style
            .then(|| extract_vhost_label(&req, &settings.s3_base_domain))
            .flatten();

        if vhs_bucket.is_some() {
            let s3 = self.s3.clone();
            return Box::pin(async move {
                let resp = s3.call(req).await;
                Ok(resp.unwrap_or_else(|e| match e {}).map(BodyExt::boxed))
            });
        }

        let path = req.uri().path();
        if path == "/s3" || path.starts_with("/s3/") {
            strip_prefix(&mut req, "/s3");
            let s3 = self.s3.clone();
            return Box::pin(async move {
                let resp = s3.call(req).await;
                Ok(resp.unwrap_or_else(|e| match e {}).map(BodyExt::boxed))
            });
        }

        if path == "/webdav" || path.starts_with("/webdav/") {
            let webdav = self.webdav.clone();
            return Box::pin(async move {
                let resp = webdav.call(req).await;
                Ok(resp.unwrap_or_else(|e| match e {}).map(|body| body.map_err(|never: Infallible| match never {}).boxed()))
            });
        }

        let rest = self.rest.clone();
        Box::pin(async move {
            let resp = rest.call(req).await;
            Ok(resp.unwrap_or_else(|e| match e {}).map(BodyExt::boxed))
        })
    }
}

/// Extract the leading label of `Host` when it's a subdomain of `base_domain`.
fn extract_vhost_label<B>(req: &http::Request<B>, base_domain: &str) -> Option<String> {
    if base_domain.is_empty() {
        return None;
    }
    let host = req.headers().get(http::header::HOST)?.to_str().ok()?;
    let host = host.split(':').next().unwrap_or(host);
    let suffix = format!(".{base_domain}");
    host.strip_suffix(&suffix).map(str::to_owned).filter(|label| !label.is_empty())
}

/// Rewrite `req`'s URI in place, dropping the leading `prefix` path segment.
fn strip_prefix<B>(req: &mut http::Request<B>, prefix: &str) {
    let uri = req.uri();
    let rest = uri.path().strip_prefix(prefix).unwrap_or("");
    let rest = if rest.is_empty() { "/" } else { rest };
    let new_path_and_query = match uri.query() {
        Some(q) => format!("{rest}?{q}"),
        None => rest.to_owned(),
    };
    if let Ok(new_uri) = new_path_and_query.parse::<http::Uri>() {
        *req.uri_mut() = new_uri;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_vhost_label_matches_subdomain() {
        let req = http::Request::builder().header(http::header::HOST, "acme.files.example.com").body(()).unwrap();
        assert_eq!(extract_vhost_label(&req, "files.example.com"), Some("acme".to_owned()));
    }

    #[test]
    fn test_extract_vhost_label_ignores_port() {
        let req = http::Request::builder().header(http::header::HOST, "acme.files.example.com:8080").body(()).unwrap();
        assert_eq!(extract_vhost_label(&req, "files.example.com"), Some("acme".to_owned()));
    }

    #[test]
    fn test_extract_vhost_label_rejects_bare_base_domain() {
        let req = http::Request::builder().header(http::header::HOST, "files.example.com").body(()).unwrap();
        assert_eq!(extract_vhost_label(&req, "files.example.com"), None);
    }

    #[test]
    fn test_strip_prefix_rewrites_path_and_keeps_query() {
        let mut req = http::Request::builder().uri("/s3/mybucket/key.txt?list-type=2").body(()).unwrap();
        strip_prefix(&mut req, "/s3");
        assert_eq!(req.uri().path(), "/mybucket/key.txt");
        assert_eq!(req.uri().query(), Some("list-type=2"));
    }

    #[test]
    fn test_strip_prefix_handles_bare_mount_point() {
        let mut req = http::Request::builder().uri("/s3").body(()).unwrap();
        strip_prefix(&mut req, "/s3");
        assert_eq!(req.uri().path(), "/");
    }
}
