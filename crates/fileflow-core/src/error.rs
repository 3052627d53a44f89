//! Transport-independent error kinds shared by every access plane.

/// Errors raised by the model layer, the in-memory store, and the account
/// selector. Each plane (REST/S3/WebDAV) maps these onto its own wire format.
#[derive(Debug, thiserror::Error)]
pub enum FileFlowError {
    /// Malformed input or an out-of-range value.
    #[error("validation error: {0}")]
    Validation(String),

    /// Credential absent or malformed.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Principal lacks the capability or ownership required for the operation.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Entity, file, or upload id unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// Overwrite forbidden, directory exists, or a similar precondition failure.
    #[error("conflict: {0}")]
    Conflict(String),

    /// No account satisfies the requested plane's quota and capability constraints.
    #[error("no account available for this upload")]
    NoAvailableAccount,

    /// The upstream object store or analytics API returned an error.
    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    /// A persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// An invariant was violated internally; always a bug.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Convenience result type for FileFlow operations.
pub type FileFlowResult<T> = Result<T, FileFlowError>;

/// Errors returned by calls against an upstream managed S3 bucket or its
/// analytics API, categorized so callers can decide whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The upstream reported the object or bucket does not exist.
    #[error("upstream not found: {0}")]
    NotFound(String),

    /// A transient failure (network error, 5xx) that is safe to retry.
    #[error("upstream transient failure: {0}")]
    Retryable(String),

    /// A terminal failure (4xx other than not-found, malformed credentials).
    #[error("upstream terminal failure: {0}")]
    Terminal(String),
}

impl UpstreamError {
    /// Whether this failure is worth retrying on the next scheduler tick.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl FileFlowError {
    /// The stable error code used on every plane's error envelope.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Authentication(_) => "AuthenticationError",
            Self::Authorization(_) => "AuthorizationError",
            Self::NotFound(_) => "NotFound",
            Self::Conflict(_) => "Conflict",
            Self::NoAvailableAccount => "QuotaExceeded",
            Self::Upstream(UpstreamError::NotFound(_)) => "NotFound",
            Self::Upstream(_) => "UpstreamError",
            Self::Storage(_) => "InternalError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// The HTTP status a generic (non-S3, non-WebDAV) plane should use.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Authentication(_) => 401,
            Self::Authorization(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::NoAvailableAccount => 400,
            Self::Upstream(UpstreamError::NotFound(_)) => 404,
            Self::Upstream(_) => 502,
            Self::Storage(_) | Self::Internal(_) => 500,
        }
    }
}
