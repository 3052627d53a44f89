//! Redis backend.
//!
//! Each collection is stored as a single JSON-array blob under a
//! well-known key; `Settings` is a single blob alongside them. There is
//! no transaction primitive worth reaching for here — writes happen as
//! a best-effort sequential run of `SET` commands.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use fileflow_core::{Backend, Data, FileFlowError, FileFlowResult, Settings};

const KEY_ACCOUNTS: &str = "fileflow:accounts";
const KEY_TOKENS: &str = "fileflow:tokens";
const KEY_S3_CREDENTIALS: &str = "fileflow:s3_credentials";
const KEY_WEBDAV_CREDENTIALS: &str = "fileflow:webdav_credentials";
const KEY_FILE_EXPIRATIONS: &str = "fileflow:file_expirations";
const KEY_SETTINGS: &str = "fileflow:settings";

/// Backend for `redis://…` URLs.
#[derive(Debug)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis, maintaining a reconnecting connection manager.
    pub async fn connect(url: &str) -> FileFlowResult<Self> {
        let client = redis::Client::open(url).map_err(|e| FileFlowError::Storage(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| FileFlowError::Storage(format!("redis connect failed: {e}")))?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Backend for RedisBackend {
    async fn init(&self) -> FileFlowResult<()> {
        Ok(())
    }

    async fn load(&self) -> FileFlowResult<Data> {
        let mut conn = self.conn.clone();
        Ok(Data {
            accounts: load_blob(&mut conn, KEY_ACCOUNTS).await?,
            tokens: load_blob(&mut conn, KEY_TOKENS).await?,
            s3_credentials: load_blob(&mut conn, KEY_S3_CREDENTIALS).await?,
            webdav_credentials: load_blob(&mut conn, KEY_WEBDAV_CREDENTIALS).await?,
            file_expirations: load_blob(&mut conn, KEY_FILE_EXPIRATIONS).await?,
            settings: load_settings_hash(&mut conn).await?,
        })
    }

    async fn save(&self, data: &Data) -> FileFlowResult<()> {
        let mut conn = self.conn.clone();
        save_blob(&mut conn, KEY_ACCOUNTS, &data.accounts).await?;
        save_blob(&mut conn, KEY_TOKENS, &data.tokens).await?;
        save_blob(&mut conn, KEY_S3_CREDENTIALS, &data.s3_credentials).await?;
        save_blob(&mut conn, KEY_WEBDAV_CREDENTIALS, &data.webdav_credentials).await?;
        save_blob(&mut conn, KEY_FILE_EXPIRATIONS, &data.file_expirations).await?;
        save_settings_hash(&mut conn, &data.settings).await?;
        Ok(())
    }

    async fn close(&self) -> FileFlowResult<()> {
        Ok(())
    }
}

async fn load_blob<T: serde::de::DeserializeOwned>(
    conn: &mut ConnectionManager,
    key: &str,
) -> FileFlowResult<Vec<T>> {
    let raw: Option<String> = conn.get(key).await.map_err(redis_err)?;
    match raw {
        Some(s) if !s.is_empty() => {
            serde_json::from_str(&s).map_err(|e| FileFlowError::Storage(format!("decode {key}: {e}")))
        }
        _ => Ok(Vec::new()),
    }
}

async fn save_blob<T: serde::Serialize>(
    conn: &mut ConnectionManager,
    key: &str,
    items: &[T],
) -> FileFlowResult<()> {
    let encoded = serde_json::to_string(items).map_err(|e| FileFlowError::Storage(e.to_string()))?;
    conn.set::<_, _, ()>(key, encoded).await.map_err(redis_err)
}

async fn load_settings_hash(conn: &mut ConnectionManager) -> FileFlowResult<Settings> {
    let raw: Option<String> = conn.get(KEY_SETTINGS).await.map_err(redis_err)?;
    match raw {
        Some(s) if !s.is_empty() => {
            let mut settings: Settings =
                serde_json::from_str(&s).map_err(|e| FileFlowError::Storage(e.to_string()))?;
            settings.normalize();
            Ok(settings)
        }
        _ => Ok(Settings::default()),
    }
}

async fn save_settings_hash(conn: &mut ConnectionManager, settings: &Settings) -> FileFlowResult<()> {
    let encoded = serde_json::to_string(settings).map_err(|e| FileFlowError::Storage(e.to_string()))?;
    conn.set::<_, _, ()>(KEY_SETTINGS, encoded).await.map_err(redis_err)
}

fn redis_err(e: redis::RedisError) -> FileFlowError {
    FileFlowError::Storage(e.to_string())
}
