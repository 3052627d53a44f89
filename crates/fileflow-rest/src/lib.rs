//! The native JSON REST API plane: admin/tenant CRUD over accounts,
//! tokens, and credentials; cross-account file listing, upload, delete,
//! and link resolution; and the unauthenticated public-proxy passthrough.
//!
//! [`RestService`] is the hyper [`Service`](hyper::service::Service)
//! entry point; everything else in this crate supports it.

pub mod auth;
pub mod body;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod query;
pub mod router;
pub mod service;

pub use body::RestBody;
pub use error::{RestError, error_to_json};
pub use router::Operation;
pub use service::{ClientFactory, DefaultClientFactory, RestConfig, RestService};
