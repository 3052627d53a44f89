//! Admin JWT issuance/verification and tenant bearer-token authentication.
//!
//! Admin endpoints require a JWT minted by `/auth/login` against the
//! configured admin username/password. Tenant endpoints accept either an
//! admin JWT (which carries every permission) or a `Token` record's bearer
//! secret, gated by that token's own permission set.

use chrono::Utc;
use fileflow_core::{Permission, Store};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::error::RestError;

const JWT_TTL_SECONDS: i64 = 24 * 3600;

#[derive(Debug, Serialize, Deserialize)]
struct AdminClaims {
    sub: String,
    exp: i64,
}

/// Verify `username`/`password` against the configured admin credentials
/// using a constant-time comparison, then mint a 24h HS256 JWT.
pub fn login(username: &str, password: &str, admin_username: &str, admin_password: &str, jwt_secret: &str) -> Result<String, RestError> {
    let user_matches: bool = username.as_bytes().ct_eq(admin_username.as_bytes()).into();
    let pass_matches: bool = password.as_bytes().ct_eq(admin_password.as_bytes()).into();
    if !(user_matches && pass_matches) {
        return Err(RestError::Unauthorized);
    }

    let claims = AdminClaims {
        sub: username.to_owned(),
        exp: (Utc::now().timestamp() + JWT_TTL_SECONDS),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(jwt_secret.as_bytes()))
        .map_err(|e| RestError::Internal(format!("failed to sign jwt: {e}")))
}

fn verify_jwt(token: &str, jwt_secret: &str) -> Option<AdminClaims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<AdminClaims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation)
        .ok()
        .map(|data| data.claims)
}

fn bearer_token(authorization: Option<&str>) -> Option<&str> {
    authorization?.strip_prefix("Bearer ").map(str::trim)
}

/// Authenticate an admin-only endpoint: the bearer must be a valid JWT.
pub fn authenticate_admin(authorization: Option<&str>, jwt_secret: &str) -> Result<(), RestError> {
    let token = bearer_token(authorization).ok_or(RestError::Unauthorized)?;
    verify_jwt(token, jwt_secret).map(|_| ()).ok_or(RestError::Unauthorized)
}

/// The authenticated caller of a tenant endpoint.
#[derive(Debug, Clone)]
pub enum Principal {
    /// An admin JWT; implicitly holds every permission.
    Admin,
    /// A `Token` record; gated by its own permission set.
    Token(fileflow_core::Token),
}

impl Principal {
    /// Whether this principal may perform `perm`.
    #[must_use]
    pub fn allows(&self, perm: Permission) -> bool {
        match self {
            Self::Admin => true,
            Self::Token(token) => token.permissions.allows(perm),
        }
    }
}

/// Authenticate a tenant endpoint: either an admin JWT or a known token
/// secret presented as a bearer credential.
pub fn authenticate_tenant(authorization: Option<&str>, jwt_secret: &str, store: &Store) -> Result<Principal, RestError> {
    let token = bearer_token(authorization).ok_or(RestError::Unauthorized)?;
    if verify_jwt(token, jwt_secret).is_some() {
        return Ok(Principal::Admin);
    }
    store
        .find_token_by_secret(token)
        .map(Principal::Token)
        .ok_or(RestError::Unauthorized)
}

/// Require that `principal` holds `perm`, else 403.
pub fn require_permission(principal: &Principal, perm: Permission) -> Result<(), RestError> {
    if principal.allows(perm) {
        Ok(())
    } else {
        Err(RestError::Forbidden(format!("principal lacks {} permission", perm.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_rejects_wrong_password() {
        let err = login("admin", "wrong", "admin", "admin", "secret").unwrap_err();
        assert!(matches!(err, RestError::Unauthorized));
    }

    #[test]
    fn test_login_then_authenticate_admin_round_trips() {
        let token = login("admin", "admin", "admin", "admin", "secret").unwrap();
        let header = format!("Bearer {token}");
        assert!(authenticate_admin(Some(&header), "secret").is_ok());
    }

    #[test]
    fn test_authenticate_admin_rejects_wrong_secret() {
        let token = login("admin", "admin", "admin", "admin", "secret").unwrap();
        let header = format!("Bearer {token}");
        assert!(authenticate_admin(Some(&header), "other-secret").is_err());
    }

    #[test]
    fn test_bearer_token_requires_prefix() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_principal_admin_allows_everything() {
        assert!(Principal::Admin.allows(Permission::Delete));
    }
}
