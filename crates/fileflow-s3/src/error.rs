//! S3 error codes and the `S3Error` response type.
//!
//! Trimmed to the codes this gateway's 13 operations and its SigV4
//! verifier can actually raise — not the full AWS S3 error catalog.

use std::fmt;

/// Well-known S3 error codes this gateway emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum S3ErrorCode {
    AccessDenied,
    InternalError,
    InvalidArgument,
    InvalidRequest,
    InvalidPart,
    InvalidPartOrder,
    InvalidRange,
    MalformedXML,
    MethodNotAllowed,
    MissingContentLength,
    NoSuchBucket,
    NoSuchKey,
    NoSuchUpload,
    RequestTimeTooSkewed,
    SignatureDoesNotMatch,
    XAmzContentSHA256Mismatch,
    EntityTooSmall,
    QuotaExceeded,
}

impl S3ErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessDenied => "AccessDenied",
            Self::InternalError => "InternalError",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidPart => "InvalidPart",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::InvalidRange => "InvalidRange",
            Self::MalformedXML => "MalformedXML",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::MissingContentLength => "MissingContentLength",
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::NoSuchUpload => "NoSuchUpload",
            Self::RequestTimeTooSkewed => "RequestTimeTooSkewed",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::XAmzContentSHA256Mismatch => "XAmzContentSHA256Mismatch",
            Self::EntityTooSmall => "EntityTooSmall",
            Self::QuotaExceeded => "QuotaExceeded",
        }
    }

    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::InvalidArgument
            | Self::InvalidRequest
            | Self::InvalidPart
            | Self::InvalidPartOrder
            | Self::MalformedXML
            | Self::MissingContentLength
            | Self::EntityTooSmall
            | Self::XAmzContentSHA256Mismatch => http::StatusCode::BAD_REQUEST,
            Self::AccessDenied | Self::SignatureDoesNotMatch | Self::RequestTimeTooSkewed => {
                http::StatusCode::FORBIDDEN
            }
            Self::NoSuchBucket | Self::NoSuchKey | Self::NoSuchUpload => http::StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidRange => http::StatusCode::RANGE_NOT_SATISFIABLE,
            Self::QuotaExceeded => http::StatusCode::INSUFFICIENT_STORAGE,
            Self::InternalError => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::AccessDenied => "Access Denied",
            Self::InternalError => "Internal server error",
            Self::InvalidArgument => "Invalid Argument",
            Self::InvalidRequest => "Invalid Request",
            Self::InvalidPart => "One or more of the specified parts could not be found",
            Self::InvalidPartOrder => "The list of parts was not in ascending order",
            Self::InvalidRange => "The requested range cannot be satisfied",
            Self::MalformedXML => "The XML you provided was not well-formed",
            Self::MethodNotAllowed => "The specified method is not allowed against this resource",
            Self::MissingContentLength => "You must provide the Content-Length HTTP header",
            Self::NoSuchBucket => "The specified bucket does not exist",
            Self::NoSuchKey => "The specified key does not exist",
            Self::NoSuchUpload => "The specified multipart upload does not exist",
            Self::RequestTimeTooSkewed => {
                "The difference between the request time and the server's time is too large"
            }
            Self::SignatureDoesNotMatch => "The request signature we calculated does not match",
            Self::XAmzContentSHA256Mismatch => "The provided x-amz-content-sha256 header does not match",
            Self::EntityTooSmall => "Your proposed upload is smaller than the minimum allowed object size",
            Self::QuotaExceeded => "No managed account has quota available for this upload",
        }
    }
}

impl fmt::Display for S3ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An S3 `<Error>` response.
#[derive(Debug)]
pub struct S3Error {
    pub code: S3ErrorCode,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: Option<String>,
    pub status_code: http::StatusCode,
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S3Error({}): {}", self.code, self.message)
    }
}

impl std::error::Error for S3Error {}

impl S3Error {
    #[must_use]
    pub fn new(code: S3ErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.default_message().to_owned(),
            code,
            resource: None,
            request_id: None,
        }
    }

    #[must_use]
    pub fn with_message(code: S3ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            resource: None,
            request_id: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    #[must_use]
    pub fn no_such_bucket(bucket: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchBucket).with_resource(bucket)
    }

    #[must_use]
    pub fn no_such_key(key: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchKey).with_resource(key)
    }

    #[must_use]
    pub fn no_such_upload(upload_id: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::NoSuchUpload).with_resource(upload_id)
    }

    #[must_use]
    pub fn access_denied(resource: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::AccessDenied).with_resource(resource)
    }

    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InternalError, message)
    }

    #[must_use]
    pub fn method_not_allowed(method: impl Into<String>) -> Self {
        Self::new(S3ErrorCode::MethodNotAllowed).with_resource(method)
    }
}

impl From<crate::error::S3Error> for fileflow_core::FileFlowError {
    fn from(err: S3Error) -> Self {
        fileflow_core::FileFlowError::Validation(err.message)
    }
}

/// Map a transport-independent [`fileflow_core::FileFlowError`] onto an S3
/// error code, per the gateway's error-handling design.
impl From<fileflow_core::FileFlowError> for S3Error {
    fn from(err: fileflow_core::FileFlowError) -> Self {
        use fileflow_core::{FileFlowError, UpstreamError};
        match err {
            FileFlowError::Validation(msg) => Self::with_message(S3ErrorCode::InvalidArgument, msg),
            FileFlowError::Authentication(msg) => Self::with_message(S3ErrorCode::AccessDenied, msg),
            FileFlowError::Authorization(msg) => Self::with_message(S3ErrorCode::AccessDenied, msg),
            FileFlowError::NotFound(msg) => Self::with_message(S3ErrorCode::NoSuchKey, msg),
            FileFlowError::Conflict(msg) => Self::with_message(S3ErrorCode::InvalidRequest, msg),
            FileFlowError::NoAvailableAccount => Self::new(S3ErrorCode::QuotaExceeded),
            FileFlowError::Upstream(UpstreamError::NotFound(msg)) => Self::with_message(S3ErrorCode::NoSuchKey, msg),
            FileFlowError::Upstream(msg) => Self::with_message(S3ErrorCode::InternalError, msg.to_string()),
            FileFlowError::Storage(msg) => Self::internal_error(msg),
            FileFlowError::Internal(err) => Self::internal_error(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_sets_forbidden_status() {
        let err = S3Error::access_denied("bucket/key");
        assert_eq!(err.status_code, http::StatusCode::FORBIDDEN);
        assert_eq!(err.resource.as_deref(), Some("bucket/key"));
    }

    #[test]
    fn test_no_such_upload_maps_to_404() {
        let err = S3Error::no_such_upload("abc");
        assert_eq!(err.status_code, http::StatusCode::NOT_FOUND);
        assert_eq!(err.code.as_str(), "NoSuchUpload");
    }

    #[test]
    fn test_quota_exceeded_maps_to_507() {
        let err: S3Error = fileflow_core::FileFlowError::NoAvailableAccount.into();
        assert_eq!(err.status_code, http::StatusCode::INSUFFICIENT_STORAGE);
    }
}
