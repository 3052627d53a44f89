//! Model layer, persistence abstraction, in-memory store, and account
//! selector shared by every FileFlow access plane (REST, S3, WebDAV).
//!
//! This crate is deliberately transport-agnostic: it knows about accounts,
//! credentials, quotas, and expirations, but nothing about HTTP, SigV4, or
//! RFC 4918. Plane-specific crates (`fileflow-s3`, `fileflow-webdav`,
//! `fileflow-rest`) and the `fileflow-aggregator` business-logic crate
//! depend on it.

mod backend;
mod config;
mod error;
mod model;
mod selector;
mod store;

pub use backend::{Backend, Data};
pub use config::AppConfig;
pub use error::{FileFlowError, FileFlowResult, UpstreamError};
pub use model::{
    Account, Capabilities, FileExpiration, Permission, PermissionSet, Plane, Quota, S3Credential,
    Settings, Token, Usage, WebDavCredential, generate_s3_access_key_id, generate_s3_secret,
    generate_token_secret, generate_webdav_password, generate_webdav_username,
};
pub use selector::{eligible_accounts, pick_automatic_upload_target};
pub use store::{Page, Store, paginate};
