//! S3 XML wire types for the FileFlow S3 gateway.
//!
//! Covers exactly the operations the gateway's S3 plane exposes
//! (`ListObjectsV2`, `DeleteObjects`, the multipart-upload family, and
//! `CopyObject`) plus the shared `<Error>` envelope — not the full AWS S3
//! XML surface (no ACLs, versioning, tagging, replication, ...).
//!
//! # S3 XML conventions
//!
//! - Namespace: `http://s3.amazonaws.com/doc/2006-03-01/`
//! - Timestamps: ISO 8601 (`2006-02-03T16:45:09.000Z`)
//! - XML declaration: `<?xml version="1.0" encoding="UTF-8"?>`

pub mod deserialize;
pub mod error;
pub mod serialize;
pub mod types;

pub use deserialize::{parse_complete_multipart_upload, parse_delete_objects};
pub use error::{XmlError, error_to_xml};
pub use serialize::{S3_NAMESPACE, to_xml};
pub use types::*;
