//! S3 and WebDAV credential CRUD, each bound to one [`fileflow_core::Account`].

use chrono::Utc;
use fileflow_core::{
    PermissionSet, S3Credential, Store, WebDavCredential, generate_s3_access_key_id,
    generate_s3_secret, generate_webdav_password, generate_webdav_username,
};
use uuid::Uuid;

use crate::dto::{CredentialCreateRequest, S3CredentialSummary, WebDavCredentialSummary, parse_permissions};
use crate::error::RestError;

pub mod s3 {
    use super::*;

    pub async fn list(store: &Store) -> Result<Vec<S3CredentialSummary>, RestError> {
        Ok(store.list_s3_credentials().into_iter().map(S3CredentialSummary::from).collect())
    }

    /// Create a credential and return it in full, including the one-time secret.
    pub async fn create(store: &Store, req: CredentialCreateRequest) -> Result<S3Credential, RestError> {
        if store.get_account(req.account_id).is_none() {
            return Err(RestError::NotFound(format!("account {}", req.account_id)));
        }
        let permissions: PermissionSet = parse_permissions(&req.permissions)?;
        let cred = S3Credential {
            id: Uuid::nil(),
            access_key_id: generate_s3_access_key_id(),
            secret_access_key: generate_s3_secret(),
            account_id: req.account_id,
            description: req.description,
            permissions,
            active: true,
            created_at: Utc::now(),
            last_used_at: None,
        };
        Ok(store.create_s3_credential(cred).await?)
    }

    pub async fn delete(store: &Store, id: Uuid) -> Result<(), RestError> {
        Ok(store.delete_s3_credential(id).await?)
    }
}

pub mod webdav {
    use super::*;

    pub async fn list(store: &Store) -> Result<Vec<WebDavCredentialSummary>, RestError> {
        Ok(store.list_webdav_credentials().into_iter().map(WebDavCredentialSummary::from).collect())
    }

    /// Create a credential and return it in full, including the one-time
    /// password. `req.username`, when set, is used verbatim (still subject
    /// to the store's global-uniqueness check); otherwise one is generated.
    pub async fn create(store: &Store, req: CredentialCreateRequest) -> Result<WebDavCredential, RestError> {
        if store.get_account(req.account_id).is_none() {
            return Err(RestError::NotFound(format!("account {}", req.account_id)));
        }
        let permissions: PermissionSet = parse_permissions(&req.permissions)?;
        let cred = WebDavCredential {
            id: Uuid::nil(),
            username: req.username.unwrap_or_else(generate_webdav_username),
            password: generate_webdav_password(),
            account_id: req.account_id,
            description: req.description,
            permissions,
            active: true,
            created_at: Utc::now(),
            last_used_at: None,
        };
        Ok(store.create_webdav_credential(cred).await?)
    }

    pub async fn delete(store: &Store, id: Uuid) -> Result<(), RestError> {
        Ok(store.delete_webdav_credential(id).await?)
    }
}
