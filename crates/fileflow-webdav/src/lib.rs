//! RFC 4918 WebDAV method handling for FileFlow's WebDAV access plane.
//!
//! - **Path** ([`path`]): Maps request paths onto the flat key-space
//!   directory model — a directory is a trailing-`/` placeholder object or
//!   any prefix implied by existing object keys — and walks it recursively
//!   where the upstream listing API only ever returns one level at a time.
//! - **Auth** ([`auth`]): HTTP Basic authentication against
//!   [`fileflow_core::WebDavCredential`] rows, and the method-to-permission
//!   mapping that gates each verb.
//! - **Lock** ([`lock`]): An in-memory, path-keyed lock tree supporting
//!   exclusive and shared locks, `Depth: 0|infinity`, and `Timeout`
//!   refresh. Lost on restart by design.
//! - **Multistatus** ([`multistatus`]): `PROPFIND` request parsing and
//!   207 Multi-Status response building.
//! - **Service** ([`service`]): The [`WebDavService`](service::WebDavService)
//!   implementing hyper's `Service` trait for every method in the handler.
//! - **Body** ([`body`]): The [`WebDavBody`](body::WebDavBody) response body
//!   type.

pub mod auth;
pub mod body;
pub mod error;
pub mod lock;
pub mod multistatus;
pub mod path;
pub mod service;

pub use body::WebDavBody;
pub use error::DavError;
pub use lock::{ActiveLock, LockError, LockManager, LockScope};
pub use service::{ClientFactory, DefaultClientFactory, WebDavConfig, WebDavService};
