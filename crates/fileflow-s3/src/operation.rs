//! The S3 operations this gateway's plane exposes — a deliberate subset of
//! the full AWS S3 API.

/// One of the 13 S3 operations this gateway routes and dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S3Operation {
    HeadBucket,
    ListObjectsV2,
    GetObject,
    HeadObject,
    PutObject,
    CopyObject,
    DeleteObject,
    DeleteObjects,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
    ListParts,
}

impl S3Operation {
    /// The permission this operation requires: `read` → read ops, `write`
    /// → put/copy/multipart, `delete` → delete ops.
    #[must_use]
    pub fn required_permission(&self) -> fileflow_core::Permission {
        use fileflow_core::Permission;
        match self {
            Self::HeadBucket | Self::ListObjectsV2 | Self::GetObject | Self::HeadObject | Self::ListParts => {
                Permission::Read
            }
            Self::PutObject
            | Self::CopyObject
            | Self::CreateMultipartUpload
            | Self::UploadPart
            | Self::CompleteMultipartUpload => Permission::Write,
            Self::DeleteObject | Self::DeleteObjects | Self::AbortMultipartUpload => Permission::Delete,
        }
    }
}
