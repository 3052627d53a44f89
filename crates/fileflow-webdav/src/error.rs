//! WebDAV error mapping: plain status codes, except PROPFIND which reports
//! failures as multi-status `propstat` elements instead.

use fileflow_core::FileFlowError;
use http::StatusCode;

/// A WebDAV-plane failure, already carrying the HTTP status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum DavError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("unsupported media type")]
    UnsupportedMediaType,

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("{0}")]
    Locked(String),

    #[error("{0}")]
    Internal(String),
}

impl DavError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            Self::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Locked(_) => StatusCode::LOCKED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FileFlowError> for DavError {
    fn from(err: FileFlowError) -> Self {
        let rendered = err.to_string();
        match err {
            FileFlowError::Validation(msg) => Self::BadRequest(msg),
            FileFlowError::Authentication(msg) => {
                tracing::debug!(error = %msg, "webdav authentication failure");
                Self::Unauthorized
            }
            FileFlowError::Authorization(msg) => Self::Forbidden(msg),
            FileFlowError::NotFound(msg) => Self::NotFound(msg),
            FileFlowError::Conflict(msg) => Self::Conflict(msg),
            FileFlowError::NoAvailableAccount => Self::Internal("no account available".to_owned()),
            FileFlowError::Upstream(upstream) => match upstream {
                fileflow_core::UpstreamError::NotFound(msg) => Self::NotFound(msg),
                other => Self::Internal(other.to_string()),
            },
            FileFlowError::Storage(_) | FileFlowError::Internal(_) => Self::Internal(rendered),
        }
    }
}
