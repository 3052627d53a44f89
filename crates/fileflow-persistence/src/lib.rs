//! Persistence backends implementing [`fileflow_core::Backend`]: SQLite,
//! Turso/libSQL, PostgreSQL, MySQL, MongoDB, and Redis.
//!
//! The database URL scheme selects the flavor:
//! `sqlite:`, `libsql:`, `redis:`, `mysql:`, `mongodb:`, `postgres:`/`postgresql:`.

mod codec;
mod libsql_backend;
mod mongo_backend;
mod redis_backend;
mod sql;

pub use libsql_backend::LibsqlBackend;
pub use mongo_backend::MongoBackend;
pub use redis_backend::RedisBackend;
pub use sql::SqlBackend;

use std::sync::Arc;

use fileflow_core::{Backend, FileFlowError, FileFlowResult};

/// Connect to whichever backend `database_url`'s scheme selects, returning
/// it ready for [`fileflow_core::Backend::init`].
pub async fn open(database_url: &str) -> FileFlowResult<Arc<dyn Backend>> {
    let scheme = database_url
        .split_once("://")
        .map(|(s, _)| s)
        .unwrap_or(database_url);

    let backend: Arc<dyn Backend> = match scheme {
        "sqlite" | "postgres" | "postgresql" | "mysql" => {
            Arc::new(SqlBackend::connect(database_url).await?)
        }
        "libsql" => {
            let (base, auth_token) = split_auth_token(database_url);
            Arc::new(LibsqlBackend::connect(&base, auth_token).await?)
        }
        "mongodb" | "mongodb+srv" => Arc::new(MongoBackend::connect(database_url).await?),
        "redis" | "rediss" => Arc::new(RedisBackend::connect(database_url).await?),
        other => {
            return Err(FileFlowError::Storage(format!(
                "unrecognized database URL scheme: {other}"
            )));
        }
    };

    backend.init().await?;
    Ok(backend)
}

/// Split a `libsql://host?authToken=…` URL into the bare connection URL and
/// the auth token query parameter, if present.
fn split_auth_token(url: &str) -> (String, Option<String>) {
    let Some((base, query)) = url.split_once('?') else {
        return (url.to_owned(), None);
    };
    let token = query
        .split('&')
        .find_map(|kv| kv.strip_prefix("authToken=").map(str::to_owned));
    (base.to_owned(), token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_auth_token_extracts_param() {
        let (base, token) = split_auth_token("libsql://db.turso.io?authToken=abc123");
        assert_eq!(base, "libsql://db.turso.io");
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_split_auth_token_handles_missing_query() {
        let (base, token) = split_auth_token("libsql://db.turso.io");
        assert_eq!(base, "libsql://db.turso.io");
        assert_eq!(token, None);
    }
}
