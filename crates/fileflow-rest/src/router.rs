//! Routes a REST request onto an [`Operation`] by examining method and
//! path segments. Literal path segments (`sync`, `delete-old-files`) are
//! matched before the `:id` fallback so `/accounts/sync` never resolves
//! as `/accounts/{id}` with `id = "sync"`.

use http::Method;
use uuid::Uuid;

use crate::error::RestError;

/// One identified REST operation, carrying whatever path parameters it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Login,
    ListAccounts,
    CreateAccount,
    GetAccount(Uuid),
    UpdateAccount(Uuid),
    DeleteAccount(Uuid),
    SyncAccounts,
    ClearAccount(Uuid),
    DeleteOldFiles,
    ListTokens,
    CreateToken,
    DeleteToken(Uuid),
    ListS3Credentials,
    CreateS3Credential,
    DeleteS3Credential(Uuid),
    ListWebDavCredentials,
    CreateWebDavCredential,
    DeleteWebDavCredential(Uuid),
    GetSettings,
    UpdateSettings,
    ListFiles,
    Upload,
    DeleteFile,
    Link,
    ListExpirations,
    DeleteExpiration(Uuid),
    Proxy { subdomain: String, path: String },
}

/// Whether `operation` requires full admin authentication (a JWT only) as
/// opposed to tenant authentication (JWT or bearer token, permission-gated).
#[must_use]
pub fn is_admin_only(operation: &Operation) -> bool {
    !matches!(
        operation,
        Operation::ListFiles | Operation::Upload | Operation::DeleteFile | Operation::Link
    )
}

/// Resolve `method` + `path` into an [`Operation`]. `path` must already
/// have the query string stripped.
pub fn resolve(method: &Method, path: &str) -> Result<Operation, RestError> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let segs: Vec<&str> = segments.iter().copied().collect();

    match (method, segs.as_slice()) {
        (&Method::POST, ["auth", "login"]) => Ok(Operation::Login),

        (&Method::GET, ["accounts"]) => Ok(Operation::ListAccounts),
        (&Method::POST, ["accounts"]) => Ok(Operation::CreateAccount),
        (&Method::POST, ["accounts", "sync"]) => Ok(Operation::SyncAccounts),
        (&Method::POST, ["accounts", "delete-old-files"]) => Ok(Operation::DeleteOldFiles),
        (&Method::POST, ["accounts", id, "clear"]) => Ok(Operation::ClearAccount(parse_uuid(id)?)),
        (&Method::GET, ["accounts", id]) => Ok(Operation::GetAccount(parse_uuid(id)?)),
        (&Method::PUT, ["accounts", id]) => Ok(Operation::UpdateAccount(parse_uuid(id)?)),
        (&Method::DELETE, ["accounts", id]) => Ok(Operation::DeleteAccount(parse_uuid(id)?)),

        (&Method::GET, ["tokens"]) => Ok(Operation::ListTokens),
        (&Method::POST, ["tokens"]) => Ok(Operation::CreateToken),
        (&Method::DELETE, ["tokens", id]) => Ok(Operation::DeleteToken(parse_uuid(id)?)),

        (&Method::GET, ["credentials", "s3"]) => Ok(Operation::ListS3Credentials),
        (&Method::POST, ["credentials", "s3"]) => Ok(Operation::CreateS3Credential),
        (&Method::DELETE, ["credentials", "s3", id]) => Ok(Operation::DeleteS3Credential(parse_uuid(id)?)),

        (&Method::GET, ["credentials", "webdav"]) => Ok(Operation::ListWebDavCredentials),
        (&Method::POST, ["credentials", "webdav"]) => Ok(Operation::CreateWebDavCredential),
        (&Method::DELETE, ["credentials", "webdav", id]) => Ok(Operation::DeleteWebDavCredential(parse_uuid(id)?)),

        (&Method::GET, ["settings"]) => Ok(Operation::GetSettings),
        (&Method::PUT, ["settings"]) => Ok(Operation::UpdateSettings),

        (&Method::GET, ["files"]) => Ok(Operation::ListFiles),
        (&Method::POST, ["upload"]) => Ok(Operation::Upload),
        (&Method::DELETE, ["file"]) => Ok(Operation::DeleteFile),
        (&Method::GET, ["link"]) => Ok(Operation::Link),

        (&Method::GET, ["expirations"]) => Ok(Operation::ListExpirations),
        (&Method::DELETE, ["expirations", id]) => Ok(Operation::DeleteExpiration(parse_uuid(id)?)),

        (_, ["p", subdomain, rest @ ..]) => Ok(Operation::Proxy {
            subdomain: (*subdomain).to_owned(),
            path: rest.join("/"),
        }),

        _ => Err(RestError::NotFound(format!("no route for {method} {path}"))),
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, RestError> {
    Uuid::parse_str(raw).map_err(|_| RestError::BadRequest(format!("invalid id: {raw}")))
}
