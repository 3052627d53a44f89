//! The `S3Handler` trait every concrete handler implements, and the
//! dispatch glue the hyper service calls into.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::body::S3ResponseBody;
use crate::error::S3Error;
use crate::router::RoutingContext;

/// Implemented by the gateway's S3 operation handler. One call dispatches
/// to exactly one of the 13 [`crate::operation::S3Operation`] variants.
pub trait S3Handler: Send + Sync + 'static {
    /// Handle one routed, authenticated S3 request.
    fn handle_operation(
        &self,
        ctx: RoutingContext,
        parts: http::request::Parts,
        body: Bytes,
        access_key_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>>;
}

/// Dispatch a routed request to `handler`.
pub async fn dispatch_operation<H: S3Handler + ?Sized>(
    handler: &H,
    ctx: RoutingContext,
    parts: http::request::Parts,
    body: Bytes,
    access_key_id: &str,
) -> Result<http::Response<S3ResponseBody>, S3Error> {
    handler.handle_operation(ctx, parts, body, access_key_id).await
}

/// A stub handler returning `InternalError` for every operation; useful
/// for wiring a service before the real handler is ready.
pub struct NotImplementedHandler;

impl S3Handler for NotImplementedHandler {
    fn handle_operation(
        &self,
        _ctx: RoutingContext,
        _parts: http::request::Parts,
        _body: Bytes,
        _access_key_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<http::Response<S3ResponseBody>, S3Error>> + Send>> {
        Box::pin(async { Err(S3Error::internal_error("handler not implemented")) })
    }
}
