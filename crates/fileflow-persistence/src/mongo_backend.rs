//! MongoDB backend.
//!
//! Each collection maps to a Mongo collection of documents produced via
//! `bson` conversion from the model types directly — Mongo's document
//! model makes the JSON-column convention used by the SQL backends
//! unnecessary; permission sets are native BSON arrays. Settings are a
//! single document in a dedicated collection. A session handle is opened
//! per save so a future revision can upgrade to a multi-document
//! transaction; today each collection write still lands independently.

use async_trait::async_trait;
use mongodb::bson::{doc, to_document};
use mongodb::{Client, Database};

use fileflow_core::{Backend, Data, FileFlowError, FileFlowResult};

/// Backend for `mongodb://…` URLs.
#[derive(Debug)]
pub struct MongoBackend {
    db: Database,
}

impl MongoBackend {
    /// Connect to the database named in the URL path (or `fileflow` if
    /// absent).
    pub async fn connect(url: &str) -> FileFlowResult<Self> {
        let client = Client::with_uri_str(url)
            .await
            .map_err(|e| FileFlowError::Storage(format!("mongo connect failed: {e}")))?;
        let db_name = mongodb::options::ClientOptions::parse(url)
            .await
            .ok()
            .and_then(|o| o.default_database)
            .unwrap_or_else(|| "fileflow".to_owned());
        Ok(Self {
            db: client.database(&db_name),
        })
    }
}

#[async_trait]
impl Backend for MongoBackend {
    async fn init(&self) -> FileFlowResult<()> {
        // Mongo collections are created implicitly on first insert; nothing
        // to migrate up front.
        Ok(())
    }

    async fn load(&self) -> FileFlowResult<Data> {
        let accounts = load_collection(&self.db, "accounts").await?;
        let tokens = load_collection(&self.db, "tokens").await?;
        let s3_credentials = load_collection(&self.db, "s3_credentials").await?;
        let webdav_credentials = load_collection(&self.db, "webdav_credentials").await?;
        let file_expirations = load_collection(&self.db, "file_expirations").await?;

        let settings = self
            .db
            .collection::<mongodb::bson::Document>("settings")
            .find_one(doc! {})
            .await
            .map_err(mongo_err)?
            .map(|d| mongodb::bson::from_document(d).map_err(|e| FileFlowError::Storage(e.to_string())))
            .transpose()?
            .unwrap_or_default();

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
        let mut session = self.db.client().start_session().await.ok();

        save_collection(&self.db, "accounts", &data.accounts, session.as_mut()).await?;
        save_collection(&self.db, "tokens", &data.tokens, session.as_mut()).await?;
        save_collection(&self.db, "s3_credentials", &data.s3_credentials, session.as_mut()).await?;
        save_collection(
            &self.db,
            "webdav_credentials",
            &data.webdav_credentials,
            session.as_mut(),
        )
        .await?;
        save_collection(
            &self.db,
            "file_expirations",
            &data.file_expirations,
            session.as_mut(),
        )
        .await?;

        let settings_doc = to_document(&data.settings).map_err(|e| FileFlowError::Storage(e.to_string()))?;
        let settings_coll = self.db.collection::<mongodb::bson::Document>("settings");
        settings_coll.delete_many(doc! {}).await.map_err(mongo_err)?;
        settings_coll.insert_one(settings_doc).await.map_err(mongo_err)?;

        Ok(())
    }

    async fn close(&self) -> FileFlowResult<()> {
        Ok(())
    }
}

async fn load_collection<T: serde::de::DeserializeOwned>(
    db: &Database,
    name: &str,
) -> FileFlowResult<Vec<T>> {
    use futures::stream::TryStreamExt;

    let coll = db.collection::<mongodb::bson::Document>(name);
    let mut cursor = coll.find(doc! {}).await.map_err(mongo_err)?;
    let mut out = Vec::new();
    while let Some(doc) = cursor.try_next().await.map_err(mongo_err)? {
        out.push(mongodb::bson::from_document(doc).map_err(|e| FileFlowError::Storage(e.to_string()))?);
    }
    Ok(out)
}

async fn save_collection<T: serde::Serialize>(
    db: &Database,
    name: &str,
    items: &[T],
    _session: Option<&mut mongodb::ClientSession>,
) -> FileFlowResult<()> {
    let coll = db.collection::<mongodb::bson::Document>(name);
    coll.delete_many(doc! {}).await.map_err(mongo_err)?;
    if items.is_empty() {
        return Ok(());
    }
    let docs: Vec<_> = items
        .iter()
        .map(to_document)
        .collect::<Result<_, _>>()
        .map_err(|e| FileFlowError::Storage(e.to_string()))?;
    coll.insert_many(docs).await.map_err(mongo_err)?;
    Ok(())
}

fn mongo_err(e: mongodb::error::Error) -> FileFlowError {
    FileFlowError::Storage(e.to_string())
}
