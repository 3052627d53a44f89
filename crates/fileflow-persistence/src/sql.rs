//! SQL-flavored backend (SQLite, PostgreSQL, MySQL) over `sqlx::Any`.
//!
//! All three dialects share one schema and one set of queries: `sqlx::Any`
//! accepts portable `?` placeholders and rewrites them per-driver, so a
//! single [`SqlBackend`] serves every `sqlite:`/`postgres:`/`mysql:` URL.
//! Save follows the delete-then-insert contract inside one
//! transaction; `Settings` is a single upserted row in a key/value table.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{Any, AnyPool, Row, Transaction};
use uuid::Uuid;

use fileflow_core::{
    Account, Backend, Capabilities, Data, FileExpiration, FileFlowError, FileFlowResult, Quota,
    S3Credential, Settings, Token, Usage, WebDavCredential,
};

use crate::codec::{decode_optional_timestamp, decode_permissions, decode_timestamp, encode_permissions, encode_timestamp};

/// A backend over `sqlx::Any`, serving SQLite, PostgreSQL, and MySQL alike.
#[derive(Debug)]
pub struct SqlBackend {
    pool: AnyPool,
}

impl SqlBackend {
    /// Connect to `url` (any `sqlite:`/`postgres:`/`mysql:` URL) and return
    /// a backend ready for [`Backend::init`].
    pub async fn connect(url: &str) -> FileFlowResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(8)
            .connect(url)
            .await
            .map_err(|e| FileFlowError::Storage(format!("connect failed: {e}")))?;
        Ok(Self { pool })
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        active INTEGER NOT NULL,
        upstream_account_id TEXT NOT NULL,
        access_key_id TEXT NOT NULL,
        secret_access_key TEXT NOT NULL,
        bucket_name TEXT NOT NULL,
        endpoint_url TEXT NOT NULL,
        public_domain TEXT NOT NULL,
        analytics_token TEXT,
        max_size_bytes BIGINT NOT NULL,
        max_class_a_ops BIGINT NOT NULL,
        usage_size_bytes BIGINT NOT NULL,
        usage_class_a_ops BIGINT NOT NULL,
        usage_class_b_ops BIGINT NOT NULL,
        last_sync_at TEXT,
        cap_s3 INTEGER NOT NULL,
        cap_webdav INTEGER NOT NULL,
        cap_auto_upload INTEGER NOT NULL,
        cap_api_upload INTEGER NOT NULL,
        cap_client_upload INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tokens (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        secret TEXT NOT NULL,
        permissions TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS s3_credentials (
        id TEXT PRIMARY KEY,
        access_key_id TEXT NOT NULL,
        secret_access_key TEXT NOT NULL,
        account_id TEXT NOT NULL,
        description TEXT NOT NULL,
        permissions TEXT NOT NULL,
        active INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        last_used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS webdav_credentials (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL,
        password TEXT NOT NULL,
        account_id TEXT NOT NULL,
        description TEXT NOT NULL,
        permissions TEXT NOT NULL,
        active INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        last_used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS file_expirations (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        file_key TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )",
];

#[async_trait]
impl Backend for SqlBackend {
    async fn init(&self) -> FileFlowResult<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| FileFlowError::Storage(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn load(&self) -> FileFlowResult<Data> {
        let accounts = load_accounts(&self.pool).await?;
        let tokens = load_tokens(&self.pool).await?;
        let s3_credentials = load_s3_credentials(&self.pool).await?;
        let webdav_credentials = load_webdav_credentials(&self.pool).await?;
        let file_expirations = load_file_expirations(&self.pool).await?;
        let settings = load_settings(&self.pool).await?;

        Ok(Data {
            accounts,
            tokens,
            s3_credentials,
            webdav_credentials,
            file_expirations,
            settings,
        })
    }

    async fn save(&self, data: &Data) -> FileFlowResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FileFlowError::Storage(format!("begin tx failed: {e}")))?;

        save_accounts(&mut tx, &data.accounts).await?;
        save_tokens(&mut tx, &data.tokens).await?;
        save_s3_credentials(&mut tx, &data.s3_credentials).await?;
        save_webdav_credentials(&mut tx, &data.webdav_credentials).await?;
        save_file_expirations(&mut tx, &data.file_expirations).await?;
        save_settings(&mut tx, &data.settings).await?;

        tx.commit()
            .await
            .map_err(|e| FileFlowError::Storage(format!("commit failed: {e}")))?;
        Ok(())
    }

    async fn close(&self) -> FileFlowResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn row_to_account(row: &AnyRow) -> FileFlowResult<Account> {
    let id: String = row.try_get("id").map_err(sql_err)?;
    let last_sync_at: Option<String> = row.try_get("last_sync_at").map_err(sql_err)?;
    let analytics_token: Option<String> = row.try_get("analytics_token").map_err(sql_err)?;

    Ok(Account {
        id: Uuid::parse_str(&id).map_err(|e| FileFlowError::Storage(e.to_string()))?,
        name: row.try_get("name").map_err(sql_err)?,
        active: row.try_get::<i64, _>("active").map_err(sql_err)? != 0,
        upstream_account_id: row.try_get("upstream_account_id").map_err(sql_err)?,
        access_key_id: row.try_get("access_key_id").map_err(sql_err)?,
        secret_access_key: row.try_get("secret_access_key").map_err(sql_err)?,
        bucket_name: row.try_get("bucket_name").map_err(sql_err)?,
        endpoint_url: row.try_get("endpoint_url").map_err(sql_err)?,
        public_domain: row.try_get("public_domain").map_err(sql_err)?,
        analytics_token,
        quota: Quota {
            max_size_bytes: row.try_get("max_size_bytes").map_err(sql_err)?,
            max_class_a_ops: row.try_get("max_class_a_ops").map_err(sql_err)?,
        },
        usage: Usage {
            size_bytes: row.try_get("usage_size_bytes").map_err(sql_err)?,
            class_a_ops: row.try_get("usage_class_a_ops").map_err(sql_err)?,
            class_b_ops: row.try_get("usage_class_b_ops").map_err(sql_err)?,
            last_sync_at: last_sync_at.map(|s| decode_timestamp(&s)).transpose()?,
        },
        capabilities: Capabilities {
            s3: row.try_get::<i64, _>("cap_s3").map_err(sql_err)? != 0,
            webdav: row.try_get::<i64, _>("cap_webdav").map_err(sql_err)? != 0,
            auto_upload: row.try_get::<i64, _>("cap_auto_upload").map_err(sql_err)? != 0,
            api_upload: row.try_get::<i64, _>("cap_api_upload").map_err(sql_err)? != 0,
            client_upload: row.try_get::<i64, _>("cap_client_upload").map_err(sql_err)? != 0,
        },
        created_at: decode_timestamp(&row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
        updated_at: decode_timestamp(&row.try_get::<String, _>("updated_at").map_err(sql_err)?)?,
    })
}

async fn load_accounts(pool: &AnyPool) -> FileFlowResult<Vec<Account>> {
    let rows = sqlx::query("SELECT * FROM accounts ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    rows.iter().map(row_to_account).collect()
}

async fn save_accounts(tx: &mut Transaction<'_, Any>, accounts: &[Account]) -> FileFlowResult<()> {
    sqlx::query("DELETE FROM accounts").execute(&mut **tx).await.map_err(sql_err)?;
    for a in accounts {
        sqlx::query(
            "INSERT INTO accounts (id, name, active, upstream_account_id, access_key_id,
                secret_access_key, bucket_name, endpoint_url, public_domain, analytics_token,
                max_size_bytes, max_class_a_ops, usage_size_bytes, usage_class_a_ops,
                usage_class_b_ops, last_sync_at, cap_s3, cap_webdav, cap_auto_upload,
                cap_api_upload, cap_client_upload, created_at, updated_at)
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(a.id.to_string())
        .bind(&a.name)
        .bind(i64::from(a.active))
        .bind(&a.upstream_account_id)
        .bind(&a.access_key_id)
        .bind(&a.secret_access_key)
        .bind(&a.bucket_name)
        .bind(&a.endpoint_url)
        .bind(&a.public_domain)
        .bind(a.analytics_token.clone())
        .bind(a.quota.max_size_bytes)
        .bind(a.quota.max_class_a_ops)
        .bind(a.usage.size_bytes)
        .bind(a.usage.class_a_ops)
        .bind(a.usage.class_b_ops)
        .bind(a.usage.last_sync_at.map(encode_timestamp))
        .bind(i64::from(a.capabilities.s3))
        .bind(i64::from(a.capabilities.webdav))
        .bind(i64::from(a.capabilities.auto_upload))
        .bind(i64::from(a.capabilities.api_upload))
        .bind(i64::from(a.capabilities.client_upload))
        .bind(encode_timestamp(a.created_at))
        .bind(encode_timestamp(a.updated_at))
        .execute(&mut **tx)
        .await
        .map_err(sql_err)?;
    }
    Ok(())
}

async fn load_tokens(pool: &AnyPool) -> FileFlowResult<Vec<Token>> {
    let rows = sqlx::query("SELECT * FROM tokens ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    rows.iter()
        .map(|row| {
            Ok(Token {
                id: Uuid::parse_str(&row.try_get::<String, _>("id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                name: row.try_get("name").map_err(sql_err)?,
                secret: row.try_get("secret").map_err(sql_err)?,
                permissions: decode_permissions(&row.try_get::<String, _>("permissions").map_err(sql_err)?)?,
                created_at: decode_timestamp(&row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
            })
        })
        .collect()
}

async fn save_tokens(tx: &mut Transaction<'_, Any>, tokens: &[Token]) -> FileFlowResult<()> {
    sqlx::query("DELETE FROM tokens").execute(&mut **tx).await.map_err(sql_err)?;
    for t in tokens {
        sqlx::query("INSERT INTO tokens (id, name, secret, permissions, created_at) VALUES (?,?,?,?,?)")
            .bind(t.id.to_string())
            .bind(&t.name)
            .bind(&t.secret)
            .bind(encode_permissions(&t.permissions))
            .bind(encode_timestamp(t.created_at))
            .execute(&mut **tx)
            .await
            .map_err(sql_err)?;
    }
    Ok(())
}

async fn load_s3_credentials(pool: &AnyPool) -> FileFlowResult<Vec<S3Credential>> {
    let rows = sqlx::query("SELECT * FROM s3_credentials ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    rows.iter()
        .map(|row| {
            let last_used_at: Option<String> = row.try_get("last_used_at").map_err(sql_err)?;
            Ok(S3Credential {
                id: Uuid::parse_str(&row.try_get::<String, _>("id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                access_key_id: row.try_get("access_key_id").map_err(sql_err)?,
                secret_access_key: row.try_get("secret_access_key").map_err(sql_err)?,
                account_id: Uuid::parse_str(&row.try_get::<String, _>("account_id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                description: row.try_get("description").map_err(sql_err)?,
                permissions: decode_permissions(&row.try_get::<String, _>("permissions").map_err(sql_err)?)?,
                active: row.try_get::<i64, _>("active").map_err(sql_err)? != 0,
                created_at: decode_timestamp(&row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
                last_used_at: last_used_at.map(|s| decode_timestamp(&s)).transpose()?,
            })
        })
        .collect()
}

async fn save_s3_credentials(
    tx: &mut Transaction<'_, Any>,
    creds: &[S3Credential],
) -> FileFlowResult<()> {
    sqlx::query("DELETE FROM s3_credentials").execute(&mut **tx).await.map_err(sql_err)?;
    for c in creds {
        sqlx::query(
            "INSERT INTO s3_credentials (id, access_key_id, secret_access_key, account_id,
                description, permissions, active, created_at, last_used_at)
             VALUES (?,?,?,?,?,?,?,?,?)",
        )
        .bind(c.id.to_string())
        .bind(&c.access_key_id)
        .bind(&c.secret_access_key)
        .bind(c.account_id.to_string())
        .bind(&c.description)
        .bind(encode_permissions(&c.permissions))
        .bind(i64::from(c.active))
        .bind(encode_timestamp(c.created_at))
        .bind(c.last_used_at.map(encode_timestamp))
        .execute(&mut **tx)
        .await
        .map_err(sql_err)?;
    }
    Ok(())
}

async fn load_webdav_credentials(pool: &AnyPool) -> FileFlowResult<Vec<WebDavCredential>> {
    let rows = sqlx::query("SELECT * FROM webdav_credentials ORDER BY created_at ASC")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    rows.iter()
        .map(|row| {
            let last_used_at: Option<String> = row.try_get("last_used_at").map_err(sql_err)?;
            Ok(WebDavCredential {
                id: Uuid::parse_str(&row.try_get::<String, _>("id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                username: row.try_get("username").map_err(sql_err)?,
                password: row.try_get("password").map_err(sql_err)?,
                account_id: Uuid::parse_str(&row.try_get::<String, _>("account_id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                description: row.try_get("description").map_err(sql_err)?,
                permissions: decode_permissions(&row.try_get::<String, _>("permissions").map_err(sql_err)?)?,
                active: row.try_get::<i64, _>("active").map_err(sql_err)? != 0,
                created_at: decode_timestamp(&row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
                last_used_at: last_used_at.map(|s| decode_timestamp(&s)).transpose()?,
            })
        })
        .collect()
}

async fn save_webdav_credentials(
    tx: &mut Transaction<'_, Any>,
    creds: &[WebDavCredential],
) -> FileFlowResult<()> {
    sqlx::query("DELETE FROM webdav_credentials").execute(&mut **tx).await.map_err(sql_err)?;
    for c in creds {
        sqlx::query(
            "INSERT INTO webdav_credentials (id, username, password, account_id, description,
                permissions, active, created_at, last_used_at)
             VALUES (?,?,?,?,?,?,?,?,?)",
        )
        .bind(c.id.to_string())
        .bind(&c.username)
        .bind(&c.password)
        .bind(c.account_id.to_string())
        .bind(&c.description)
        .bind(encode_permissions(&c.permissions))
        .bind(i64::from(c.active))
        .bind(encode_timestamp(c.created_at))
        .bind(c.last_used_at.map(encode_timestamp))
        .execute(&mut **tx)
        .await
        .map_err(sql_err)?;
    }
    Ok(())
}

async fn load_file_expirations(pool: &AnyPool) -> FileFlowResult<Vec<FileExpiration>> {
    let rows = sqlx::query("SELECT * FROM file_expirations ORDER BY expires_at ASC")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;
    rows.iter()
        .map(|row| {
            Ok(FileExpiration {
                id: Uuid::parse_str(&row.try_get::<String, _>("id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                account_id: Uuid::parse_str(&row.try_get::<String, _>("account_id").map_err(sql_err)?)
                    .map_err(|e| FileFlowError::Storage(e.to_string()))?,
                file_key: row.try_get("file_key").map_err(sql_err)?,
                expires_at: decode_timestamp(&row.try_get::<String, _>("expires_at").map_err(sql_err)?)?,
                created_at: decode_timestamp(&row.try_get::<String, _>("created_at").map_err(sql_err)?)?,
            })
        })
        .collect()
}

async fn save_file_expirations(
    tx: &mut Transaction<'_, Any>,
    expirations: &[FileExpiration],
) -> FileFlowResult<()> {
    sqlx::query("DELETE FROM file_expirations").execute(&mut **tx).await.map_err(sql_err)?;
    for e in expirations {
        sqlx::query(
            "INSERT INTO file_expirations (id, account_id, file_key, expires_at, created_at)
             VALUES (?,?,?,?,?)",
        )
        .bind(e.id.to_string())
        .bind(e.account_id.to_string())
        .bind(&e.file_key)
        .bind(encode_timestamp(e.expires_at))
        .bind(encode_timestamp(e.created_at))
        .execute(&mut **tx)
        .await
        .map_err(sql_err)?;
    }
    Ok(())
}

/// Settings are stored as a simple key/value table for SQL backends.
const SETTINGS_KEYS: &[&str] = &[
    "sync_interval_minutes",
    "endpoint_proxy",
    "endpoint_proxy_url",
    "default_expiration_days",
    "expiration_check_minutes",
    "s3_virtual_hosted_style",
    "s3_base_domain",
    "updated_at",
];

async fn load_settings(pool: &AnyPool) -> FileFlowResult<Settings> {
    let rows = sqlx::query("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await
        .map_err(sql_err)?;

    let mut settings = Settings::default();
    for row in rows {
        let key: String = row.try_get("key").map_err(sql_err)?;
        let value: String = row.try_get("value").map_err(sql_err)?;
        apply_setting(&mut settings, &key, &value)?;
    }
    settings.normalize();
    Ok(settings)
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str) -> FileFlowResult<()> {
    match key {
        "sync_interval_minutes" => settings.sync_interval_minutes = value.parse().unwrap_or(5),
        "endpoint_proxy" => settings.endpoint_proxy = value == "true" || value == "1",
        "endpoint_proxy_url" => settings.endpoint_proxy_url = value.to_owned(),
        "default_expiration_days" => settings.default_expiration_days = value.parse().unwrap_or(30),
        "expiration_check_minutes" => settings.expiration_check_minutes = value.parse().unwrap_or(720),
        "s3_virtual_hosted_style" => settings.s3_virtual_hosted_style = value == "true" || value == "1",
        "s3_base_domain" => settings.s3_base_domain = value.to_owned(),
        "updated_at" => settings.updated_at = decode_optional_timestamp(value)?.unwrap_or_else(Utc::now),
        _ => {}
    }
    Ok(())
}

async fn save_settings(tx: &mut Transaction<'_, Any>, settings: &Settings) -> FileFlowResult<()> {
    let values = [
        settings.sync_interval_minutes.to_string(),
        settings.endpoint_proxy.to_string(),
        settings.endpoint_proxy_url.clone(),
        settings.default_expiration_days.to_string(),
        settings.expiration_check_minutes.to_string(),
        settings.s3_virtual_hosted_style.to_string(),
        settings.s3_base_domain.clone(),
        encode_timestamp(settings.updated_at),
    ];

    for (key, value) in SETTINGS_KEYS.iter().zip(values.iter()) {
        // Upsert by delete-then-insert, matching the collection save contract.
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(*key)
            .execute(&mut **tx)
            .await
            .map_err(sql_err)?;
        sqlx::query("INSERT INTO settings (key, value) VALUES (?, ?)")
            .bind(*key)
            .bind(value)
            .execute(&mut **tx)
            .await
            .map_err(sql_err)?;
    }
    Ok(())
}

fn sql_err(e: sqlx::Error) -> FileFlowError {
    FileFlowError::Storage(e.to_string())
}
