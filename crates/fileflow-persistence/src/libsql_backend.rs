//! Turso/libSQL backend.
//!
//! libSQL is SQLite-wire-compatible, so this backend reuses the exact
//! schema and column layout of [`crate::sql::SqlBackend`] but talks to a
//! remote `libsql://` endpoint (optionally with `?authToken=…`) through the
//! `libsql` crate's async client instead of `sqlx`.

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Builder, Connection, Database, params};
use uuid::Uuid;

use fileflow_core::{
    Account, Backend, Capabilities, Data, FileExpiration, FileFlowError, FileFlowResult, Quota,
    S3Credential, Settings, Token, Usage, WebDavCredential,
};

use crate::codec::{decode_optional_timestamp, decode_permissions, decode_timestamp, encode_permissions, encode_timestamp};

/// Backend for `libsql://…[?authToken=…]` URLs.
pub struct LibsqlBackend {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl std::fmt::Debug for LibsqlBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlBackend").finish_non_exhaustive()
    }
}

impl LibsqlBackend {
    /// Connect to a remote Turso/libSQL database. `auth_token` is parsed
    /// from the `authToken` query parameter by the caller.
    pub async fn connect(url: &str, auth_token: Option<String>) -> FileFlowResult<Self> {
        let db = Builder::new_remote(url.to_owned(), auth_token.unwrap_or_default())
            .build()
            .await
            .map_err(|e| FileFlowError::Storage(format!("libsql connect failed: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| FileFlowError::Storage(format!("libsql connect failed: {e}")))?;
        Ok(Self { db, conn })
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY, name TEXT NOT NULL, active INTEGER NOT NULL,
        upstream_account_id TEXT NOT NULL, access_key_id TEXT NOT NULL,
        secret_access_key TEXT NOT NULL, bucket_name TEXT NOT NULL, endpoint_url TEXT NOT NULL,
        public_domain TEXT NOT NULL, analytics_token TEXT,
        max_size_bytes INTEGER NOT NULL, max_class_a_ops INTEGER NOT NULL,
        usage_size_bytes INTEGER NOT NULL, usage_class_a_ops INTEGER NOT NULL,
        usage_class_b_ops INTEGER NOT NULL, last_sync_at TEXT,
        cap_s3 INTEGER NOT NULL, cap_webdav INTEGER NOT NULL, cap_auto_upload INTEGER NOT NULL,
        cap_api_upload INTEGER NOT NULL, cap_client_upload INTEGER NOT NULL,
        created_at TEXT NOT NULL, updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tokens (
        id TEXT PRIMARY KEY, name TEXT NOT NULL, secret TEXT NOT NULL,
        permissions TEXT NOT NULL, created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS s3_credentials (
        id TEXT PRIMARY KEY, access_key_id TEXT NOT NULL, secret_access_key TEXT NOT NULL,
        account_id TEXT NOT NULL, description TEXT NOT NULL, permissions TEXT NOT NULL,
        active INTEGER NOT NULL, created_at TEXT NOT NULL, last_used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS webdav_credentials (
        id TEXT PRIMARY KEY, username TEXT NOT NULL, password TEXT NOT NULL,
        account_id TEXT NOT NULL, description TEXT NOT NULL, permissions TEXT NOT NULL,
        active INTEGER NOT NULL, created_at TEXT NOT NULL, last_used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS file_expirations (
        id TEXT PRIMARY KEY, account_id TEXT NOT NULL, file_key TEXT NOT NULL,
        expires_at TEXT NOT NULL, created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS settings (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
];

#[async_trait]
impl Backend for LibsqlBackend {
    async fn init(&self) -> FileFlowResult<()> {
        for stmt in SCHEMA {
            self.conn
                .execute(stmt, ())
                .await
                .map_err(|e| FileFlowError::Storage(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn load(&self) -> FileFlowResult<Data> {
        Ok(Data {
            accounts: self.load_accounts().await?,
            tokens: self.load_tokens().await?,
            s3_credentials: self.load_s3_credentials().await?,
            webdav_credentials: self.load_webdav_credentials().await?,
            file_expirations: self.load_file_expirations().await?,
            settings: self.load_settings().await?,
        })
    }

    async fn save(&self, data: &Data) -> FileFlowResult<()> {
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| FileFlowError::Storage(format!("begin tx failed: {e}")))?;

        tx.execute("DELETE FROM accounts", ()).await.map_err(libsql_err)?;
        for a in &data.accounts {
            tx.execute(
                "INSERT INTO accounts VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
                params![
                    a.id.to_string(),
                    a.name.clone(),
                    i64::from(a.active),
                    a.upstream_account_id.clone(),
                    a.access_key_id.clone(),
                    a.secret_access_key.clone(),
                    a.bucket_name.clone(),
                    a.endpoint_url.clone(),
                    a.public_domain.clone(),
                    a.analytics_token.clone(),
                    a.quota.max_size_bytes,
                    a.quota.max_class_a_ops,
                    a.usage.size_bytes,
                    a.usage.class_a_ops,
                    a.usage.class_b_ops,
                    a.usage.last_sync_at.map(encode_timestamp),
                    i64::from(a.capabilities.s3),
                    i64::from(a.capabilities.webdav),
                    i64::from(a.capabilities.auto_upload),
                    i64::from(a.capabilities.api_upload),
                    i64::from(a.capabilities.client_upload),
                    encode_timestamp(a.created_at),
                    encode_timestamp(a.updated_at),
                ],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.execute("DELETE FROM tokens", ()).await.map_err(libsql_err)?;
        for t in &data.tokens {
            tx.execute(
                "INSERT INTO tokens VALUES (?,?,?,?,?)",
                params![
                    t.id.to_string(),
                    t.name.clone(),
                    t.secret.clone(),
                    encode_permissions(&t.permissions),
                    encode_timestamp(t.created_at),
                ],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.execute("DELETE FROM s3_credentials", ()).await.map_err(libsql_err)?;
        for c in &data.s3_credentials {
            tx.execute(
                "INSERT INTO s3_credentials VALUES (?,?,?,?,?,?,?,?,?)",
                params![
                    c.id.to_string(),
                    c.access_key_id.clone(),
                    c.secret_access_key.clone(),
                    c.account_id.to_string(),
                    c.description.clone(),
                    encode_permissions(&c.permissions),
                    i64::from(c.active),
                    encode_timestamp(c.created_at),
                    c.last_used_at.map(encode_timestamp),
                ],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.execute("DELETE FROM webdav_credentials", ()).await.map_err(libsql_err)?;
        for c in &data.webdav_credentials {
            tx.execute(
                "INSERT INTO webdav_credentials VALUES (?,?,?,?,?,?,?,?,?)",
                params![
                    c.id.to_string(),
                    c.username.clone(),
                    c.password.clone(),
                    c.account_id.to_string(),
                    c.description.clone(),
                    encode_permissions(&c.permissions),
                    i64::from(c.active),
                    encode_timestamp(c.created_at),
                    c.last_used_at.map(encode_timestamp),
                ],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.execute("DELETE FROM file_expirations", ()).await.map_err(libsql_err)?;
        for e in &data.file_expirations {
            tx.execute(
                "INSERT INTO file_expirations VALUES (?,?,?,?,?)",
                params![
                    e.id.to_string(),
                    e.account_id.to_string(),
                    e.file_key.clone(),
                    encode_timestamp(e.expires_at),
                    encode_timestamp(e.created_at),
                ],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.execute("DELETE FROM settings", ()).await.map_err(libsql_err)?;
        for (key, value) in settings_kv(&data.settings) {
            tx.execute(
                "INSERT INTO settings VALUES (?, ?)",
                params![key, value],
            )
            .await
            .map_err(libsql_err)?;
        }

        tx.commit().await.map_err(|e| FileFlowError::Storage(format!("commit failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> FileFlowResult<()> {
        Ok(())
    }
}

fn settings_kv(settings: &Settings) -> Vec<(&'static str, String)> {
    vec![
        ("sync_interval_minutes", settings.sync_interval_minutes.to_string()),
        ("endpoint_proxy", settings.endpoint_proxy.to_string()),
        ("endpoint_proxy_url", settings.endpoint_proxy_url.clone()),
        ("default_expiration_days", settings.default_expiration_days.to_string()),
        ("expiration_check_minutes", settings.expiration_check_minutes.to_string()),
        ("s3_virtual_hosted_style", settings.s3_virtual_hosted_style.to_string()),
        ("s3_base_domain", settings.s3_base_domain.clone()),
        ("updated_at", encode_timestamp(settings.updated_at)),
    ]
}

impl LibsqlBackend {
    async fn load_accounts(&self) -> FileFlowResult<Vec<Account>> {
        let mut rows = self
            .conn
            .query("SELECT * FROM accounts ORDER BY created_at ASC", ())
            .await
            .map_err(libsql_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            let last_sync_at: Option<String> = row.get(15).map_err(libsql_err)?;
            out.push(Account {
                id: Uuid::parse_str(&row.get::<String>(0).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                name: row.get(1).map_err(libsql_err)?,
                active: row.get::<i64>(2).map_err(libsql_err)? != 0,
                upstream_account_id: row.get(3).map_err(libsql_err)?,
                access_key_id: row.get(4).map_err(libsql_err)?,
                secret_access_key: row.get(5).map_err(libsql_err)?,
                bucket_name: row.get(6).map_err(libsql_err)?,
                endpoint_url: row.get(7).map_err(libsql_err)?,
                public_domain: row.get(8).map_err(libsql_err)?,
                analytics_token: row.get(9).map_err(libsql_err)?,
                quota: Quota {
                    max_size_bytes: row.get(10).map_err(libsql_err)?,
                    max_class_a_ops: row.get(11).map_err(libsql_err)?,
                },
                usage: Usage {
                    size_bytes: row.get(12).map_err(libsql_err)?,
                    class_a_ops: row.get(13).map_err(libsql_err)?,
                    class_b_ops: row.get(14).map_err(libsql_err)?,
                    last_sync_at: last_sync_at.map(|s| decode_timestamp(&s)).transpose()?,
                },
                capabilities: Capabilities {
                    s3: row.get::<i64>(16).map_err(libsql_err)? != 0,
                    webdav: row.get::<i64>(17).map_err(libsql_err)? != 0,
                    auto_upload: row.get::<i64>(18).map_err(libsql_err)? != 0,
                    api_upload: row.get::<i64>(19).map_err(libsql_err)? != 0,
                    client_upload: row.get::<i64>(20).map_err(libsql_err)? != 0,
                },
                created_at: decode_timestamp(&row.get::<String>(21).map_err(libsql_err)?)?,
                updated_at: decode_timestamp(&row.get::<String>(22).map_err(libsql_err)?)?,
            });
        }
        Ok(out)
    }

    async fn load_tokens(&self) -> FileFlowResult<Vec<Token>> {
        let mut rows = self
            .conn
            .query("SELECT * FROM tokens ORDER BY created_at ASC", ())
            .await
            .map_err(libsql_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            out.push(Token {
                id: Uuid::parse_str(&row.get::<String>(0).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                name: row.get(1).map_err(libsql_err)?,
                secret: row.get(2).map_err(libsql_err)?,
                permissions: decode_permissions(&row.get::<String>(3).map_err(libsql_err)?)?,
                created_at: decode_timestamp(&row.get::<String>(4).map_err(libsql_err)?)?,
            });
        }
        Ok(out)
    }

    async fn load_s3_credentials(&self) -> FileFlowResult<Vec<S3Credential>> {
        let mut rows = self
            .conn
            .query("SELECT * FROM s3_credentials ORDER BY created_at ASC", ())
            .await
            .map_err(libsql_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            let last_used_at: Option<String> = row.get(8).map_err(libsql_err)?;
            out.push(S3Credential {
                id: Uuid::parse_str(&row.get::<String>(0).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                access_key_id: row.get(1).map_err(libsql_err)?,
                secret_access_key: row.get(2).map_err(libsql_err)?,
                account_id: Uuid::parse_str(&row.get::<String>(3).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                description: row.get(4).map_err(libsql_err)?,
                permissions: decode_permissions(&row.get::<String>(5).map_err(libsql_err)?)?,
                active: row.get::<i64>(6).map_err(libsql_err)? != 0,
                created_at: decode_timestamp(&row.get::<String>(7).map_err(libsql_err)?)?,
                last_used_at: last_used_at.map(|s| decode_timestamp(&s)).transpose()?,
            });
        }
        Ok(out)
    }

    async fn load_webdav_credentials(&self) -> FileFlowResult<Vec<WebDavCredential>> {
        let mut rows = self
            .conn
            .query("SELECT * FROM webdav_credentials ORDER BY created_at ASC", ())
            .await
            .map_err(libsql_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            let last_used_at: Option<String> = row.get(8).map_err(libsql_err)?;
            out.push(WebDavCredential {
                id: Uuid::parse_str(&row.get::<String>(0).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                username: row.get(1).map_err(libsql_err)?,
                password: row.get(2).map_err(libsql_err)?,
                account_id: Uuid::parse_str(&row.get::<String>(3).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                description: row.get(4).map_err(libsql_err)?,
                permissions: decode_permissions(&row.get::<String>(5).map_err(libsql_err)?)?,
                active: row.get::<i64>(6).map_err(libsql_err)? != 0,
                created_at: decode_timestamp(&row.get::<String>(7).map_err(libsql_err)?)?,
                last_used_at: last_used_at.map(|s| decode_timestamp(&s)).transpose()?,
            });
        }
        Ok(out)
    }

    async fn load_file_expirations(&self) -> FileFlowResult<Vec<FileExpiration>> {
        let mut rows = self
            .conn
            .query("SELECT * FROM file_expirations ORDER BY expires_at ASC", ())
            .await
            .map_err(libsql_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            out.push(FileExpiration {
                id: Uuid::parse_str(&row.get::<String>(0).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                account_id: Uuid::parse_str(&row.get::<String>(1).map_err(libsql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                file_key: row.get(2).map_err(libsql_err)?,
                expires_at: decode_timestamp(&row.get::<String>(3).map_err(libsql_err)?)?,
                created_at: decode_timestamp(&row.get::<String>(4).map_err(libsql_err)?)?,
            });
        }
        Ok(out)
    }

    async fn load_settings(&self) -> FileFlowResult<Settings> {
        let mut rows = self
            .conn
            .query("SELECT key, value FROM settings", ())
            .await
            .map_err(libsql_err)?;
        let mut settings = Settings::default();
        while let Some(row) = rows.next().await.map_err(libsql_err)? {
            let key: String = row.get(0).map_err(libsql_err)?;
            let value: String = row.get(1).map_err(libsql_err)?;
            match key.as_str() {
                "sync_interval_minutes" => settings.sync_interval_minutes = value.parse().unwrap_or(5),
                "endpoint_proxy" => settings.endpoint_proxy = value == "true",
                "endpoint_proxy_url" => settings.endpoint_proxy_url = value,
                "default_expiration_days" => settings.default_expiration_days = value.parse().unwrap_or(30),
                "expiration_check_minutes" => settings.expiration_check_minutes = value.parse().unwrap_or(720),
                "s3_virtual_hosted_style" => settings.s3_virtual_hosted_style = value == "true",
                "s3_base_domain" => settings.s3_base_domain = value,
                "updated_at" => settings.updated_at = decode_optional_timestamp(&value)?.unwrap_or_else(Utc::now),
                _ => {}
            }
        }
        settings.normalize();
        Ok(settings)
    }
}

fn libsql_err(e: libsql::Error) -> FileFlowError {
    FileFlowError::Storage(e.to_string())
}
