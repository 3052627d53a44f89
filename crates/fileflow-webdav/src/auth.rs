//! HTTP Basic authentication against `WebDavCredential` rows, and the
//! method-to-permission mapping that gates each WebDAV verb.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use fileflow_core::{Permission, Store, WebDavCredential};
use http::Method;

use crate::error::DavError;

/// The permission required to perform `method`, per the mapping in the
/// WebDAV handler's authorization rules.
#[must_use]
pub fn required_permission(method: &Method) -> Permission {
    match method.as_str() {
        "GET" | "HEAD" | "PROPFIND" | "OPTIONS" => Permission::Read,
        "DELETE" => Permission::Delete,
        // PUT, MKCOL, COPY, MOVE, LOCK, UNLOCK, PROPPATCH.
        _ => Permission::Write,
    }
}

/// Decode an `Authorization: Basic ...` header into `(username, password)`.
fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = BASE64.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_owned(), pass.to_owned()))
}

/// Authenticate the request against the store's WebDAV credentials and
/// confirm the resolved credential grants `method`'s required permission.
pub fn authenticate(
    store: &Store,
    authorization: Option<&str>,
    method: &Method,
) -> Result<WebDavCredential, DavError> {
    let header = authorization.ok_or(DavError::Unauthorized)?;
    let (username, password) = parse_basic_auth(header).ok_or(DavError::Unauthorized)?;

    let credential = store.find_webdav_credential(&username).ok_or(DavError::Unauthorized)?;
    if credential.password != password {
        return Err(DavError::Unauthorized);
    }

    if !credential.permissions.allows(required_permission(method)) {
        return Err(DavError::Forbidden(format!("credential lacks permission for {method}")));
    }

    Ok(credential)
}
