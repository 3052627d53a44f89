//! S3 HTTP routing, SigV4-authenticated request handling, response
//! serialization, and the hyper service for the gateway's S3 plane.
//!
//! - **Routing** ([`router`]): Maps HTTP requests to S3 operations by examining
//!   method, path, query parameters, and headers. Supports both path-style and
//!   virtual-hosted-style bucket addressing.
//!
//! - **Handler** ([`handler`]): The concrete [`S3Handler`] implementation that
//!   resolves a routed bucket to a managed account and delegates to the
//!   aggregator crate's upstream client.
//!
//! - **Response** ([`response`]): Builds HTTP responses — XML bodies, object
//!   metadata headers, streamed `GetObject` payloads — from business-logic
//!   results.
//!
//! - **Dispatch** ([`dispatch`]): Routes identified S3 operations to the
//!   handler via the [`S3Handler`](dispatch::S3Handler) trait.
//!
//! - **Multipart** ([`multipart`]): In-memory multipart-upload session
//!   tracking (part numbers, ETags, abandoned-session sweep).
//!
//! - **Service** ([`service`]): The [`S3HttpService`](service::S3HttpService)
//!   implementing hyper's `Service` trait, tying routing, auth, dispatch, and
//!   common headers together.
//!
//! - **Body** ([`body`]): The [`S3ResponseBody`](body::S3ResponseBody) type
//!   supporting buffered and empty response modes.
//!
//! # Architecture
//!
//! ```text
//! HTTP Request
//!   -> S3HttpService (hyper Service)
//!     -> CORS preflight interception
//!     -> S3Router (virtual hosting + operation identification)
//!     -> Body collection
//!     -> SigV4 authentication
//!     -> dispatch_operation (S3Handler trait) -> FileFlowS3Handler
//!     -> Common response headers (x-amz-request-id, Server, etc.)
//!   <- HTTP Response
//! ```

// S3Error is a fundamental domain error type used pervasively as Result<T, S3Error>.
// Its size is inherent to its fields (code, message, resource, request_id, status_code).
// Boxing it in every Result would add indirection on the hot path for negligible benefit.
#![allow(clippy::result_large_err)]

pub mod body;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod multipart;
pub mod operation;
pub mod response;
pub mod router;
pub mod service;

// Re-export key types for convenience.
pub use body::S3ResponseBody;
pub use dispatch::{NotImplementedHandler, S3Handler};
pub use error::{S3Error, S3ErrorCode};
pub use handler::FileFlowS3Handler;
pub use multipart::MultipartSessions;
pub use operation::S3Operation;
pub use router::{RoutingContext, S3Router};
pub use service::{S3HttpConfig, S3HttpService};
