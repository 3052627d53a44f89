//! REST error mapping: every failure renders as a JSON `{"error": {...}}`
//! envelope with a stable `code` field and a matching HTTP status.

use fileflow_core::FileFlowError;
use http::StatusCode;
use serde::Serialize;

/// A REST-plane failure, already carrying the HTTP status it maps to.
#[derive(Debug, thiserror::Error)]
pub enum RestError {
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

    #[error("no account available for this upload")]
    QuotaExceeded,

    #[error("{0}")]
    Internal(String),
}

impl RestError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuotaExceeded => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "ValidationError",
            Self::Unauthorized => "AuthenticationError",
            Self::Forbidden(_) => "AuthorizationError",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::Internal(_) => "InternalError",
        }
    }
}

impl From<FileFlowError> for RestError {
    fn from(err: FileFlowError) -> Self {
        let rendered = err.to_string();
        match err {
            FileFlowError::Validation(msg) => Self::BadRequest(msg),
            FileFlowError::Authentication(msg) => {
                tracing::debug!(error = %msg, "rest authentication failure");
                Self::Unauthorized
            }
            FileFlowError::Authorization(msg) => Self::Forbidden(msg),
            FileFlowError::NotFound(msg) => Self::NotFound(msg),
            FileFlowError::Conflict(msg) => Self::Conflict(msg),
            FileFlowError::NoAvailableAccount => Self::QuotaExceeded,
            FileFlowError::Upstream(fileflow_core::UpstreamError::NotFound(msg)) => Self::NotFound(msg),
            FileFlowError::Upstream(other) => Self::Internal(other.to_string()),
            FileFlowError::Storage(_) | FileFlowError::Internal(_) => Self::Internal(rendered),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

/// Render `err` as the standard `{"error": {"code", "message"}}` JSON body.
#[must_use]
pub fn error_to_json(err: &RestError) -> Vec<u8> {
    let body = ErrorBody {
        error: ErrorDetail {
            code: err.code(),
            message: err.to_string(),
        },
    };
    serde_json::to_vec(&body).unwrap_or_else(|_| b"{\"error\":{\"code\":\"InternalError\",\"message\":\"\"}}".to_vec())
}
