//! Cross-account listing aggregation, upload orchestration, and the two
//! background schedulers (usage-sync, expiration) for FileFlow.
//!
//! This crate is the business-logic layer above [`fileflow_core::Store`]: it
//! knows how to talk to a managed account's upstream bucket (via
//! [`upstream::UpstreamClient`]), but nothing about HTTP, SigV4, or RFC 4918
//! — those live in the plane-specific crates (`fileflow-s3`,
//! `fileflow-webdav`, `fileflow-rest`), which call into this crate's
//! functions.

pub mod aggregator;
pub mod expiration;
pub mod upload;
pub mod upstream;
pub mod usage_sync;

pub use aggregator::{AccountFiles, FileEntry, list_files};
pub use expiration::{run_expiration_tick, spawn_expiration_scheduler};
pub use upload::{UploadOutcome, UploadRequest, build_url, upload_file};
pub use upstream::{ListPage, ObjectBody, ObjectSummary, UpstreamClient, UsageSnapshot, UploadedPart, S3UpstreamClient};
pub use usage_sync::{run_usage_sync_tick, spawn_usage_sync_scheduler};
