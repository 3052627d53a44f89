//! REST bearer token CRUD.

use chrono::Utc;
use fileflow_core::{PermissionSet, Store, Token, generate_token_secret};
use uuid::Uuid;

use crate::dto::{TokenCreateRequest, TokenSummary, parse_permissions};
use crate::error::RestError;

/// List every token (never re-displays `secret`).
pub async fn list(store: &Store) -> Result<Vec<TokenSummary>, RestError> {
    Ok(store.list_tokens().into_iter().map(TokenSummary::from).collect())
}

/// Create a token and return it in full, including the one-time secret.
pub async fn create(store: &Store, req: TokenCreateRequest) -> Result<Token, RestError> {
    let permissions: PermissionSet = parse_permissions(&req.permissions)?;
    let token = Token {
        id: Uuid::nil(),
        name: req.name,
        secret: generate_token_secret(),
        permissions,
        created_at: Utc::now(),
    };
    Ok(store.create_token(token).await?)
}

pub async fn delete(store: &Store, id: Uuid) -> Result<(), RestError> {
    Ok(store.delete_token(id).await?)
}
