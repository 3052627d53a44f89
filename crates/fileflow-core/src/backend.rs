//! The pluggable persistence abstraction.
//!
//! `Data` is the whole persisted dataset — the five collections plus
//! `Settings`. `Backend` is the capability-set `{init, load, save, close}`
//! every storage flavor implements; concrete flavors (SQLite, Turso,
//! Postgres, MySQL, MongoDB, Redis) live in `fileflow-persistence`, which
//! depends on this crate rather than the other way around.

use async_trait::async_trait;

use crate::error::FileFlowResult;
use crate::model::{Account, FileExpiration, S3Credential, Settings, Token, WebDavCredential};

/// The entire persisted dataset: five collections plus the settings
/// singleton. Loaded wholesale at startup and saved wholesale on every
/// mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Data {
    /// All managed accounts.
    pub accounts: Vec<Account>,
    /// All REST API tokens.
    pub tokens: Vec<Token>,
    /// All S3-plane credentials.
    pub s3_credentials: Vec<S3Credential>,
    /// All WebDAV-plane credentials.
    pub webdav_credentials: Vec<WebDavCredential>,
    /// All scheduled deletions.
    pub file_expirations: Vec<FileExpiration>,
    /// The singleton settings row.
    pub settings: Settings,
}

/// Uniform persistence interface implemented by every backend flavor.
///
/// Save contract: delete-then-insert over each collection inside one
/// transaction (or a MongoDB multi-document transaction where available,
/// else best-effort sequential); `Settings` uses upsert. A `Save` failure
/// propagates as [`crate::error::FileFlowError::Storage`] — the caller's
/// in-memory copy is *not* rolled back.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Perform one-time setup: open a connection/pool, run migrations,
    /// create the schema if absent.
    async fn init(&self) -> FileFlowResult<()>;

    /// Load the entire dataset. Missing numeric settings are normalized to
    /// their defaults (`syncInterval`→5, `defaultExpirationDays`→30,
    /// `expirationCheckMinutes`→720) rather than left unset.
    async fn load(&self) -> FileFlowResult<Data>;

    /// Persist the entire dataset, replacing whatever was there before.
    async fn save(&self, data: &Data) -> FileFlowResult<()>;

    /// Release any held connections/handles.
    async fn close(&self) -> FileFlowResult<()>;
}
