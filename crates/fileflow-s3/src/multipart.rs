//! In-memory multipart-upload session state.
//!
//! One map, `uploadId → MultipartSession`, guarded by its own mutex,
//! acquired independently of the store's lock and never nested inside it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{S3Error, S3ErrorCode};

/// The minimum size (in bytes) a non-final part must have, per S3
/// semantics.
pub const MIN_PART_SIZE: i64 = 5 * 1024 * 1024;

/// Sessions older than this are considered abandoned and swept.
pub const SESSION_MAX_AGE: chrono::Duration = chrono::Duration::days(7);

/// One uploaded part, recorded as `UploadPart` completes.
#[derive(Debug, Clone)]
pub struct PartRecord {
    pub part_number: i32,
    pub etag: String,
    pub size: i64,
}

/// One in-flight multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartSession {
    pub bucket: String,
    pub key: String,
    pub parts: Vec<PartRecord>,
    pub created_at: DateTime<Utc>,
}

/// The process-wide multipart session table.
#[derive(Debug, Default)]
pub struct MultipartSessions {
    sessions: RwLock<HashMap<String, MultipartSession>>,
}

impl MultipartSessions {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start tracking a session under the upstream-assigned `upload_id`.
    /// The upload id itself comes from the upstream `CreateMultipartUpload`
    /// call, not from this table — part uploads and the final `Complete`
    /// both go straight through to the upstream bucket, so the ids must
    /// agree.
    pub fn create(&self, bucket: &str, key: &str, upload_id: &str) {
        self.sessions.write().insert(
            upload_id.to_owned(),
            MultipartSession {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                parts: Vec::new(),
                created_at: Utc::now(),
            },
        );
    }

    /// Record a completed `UploadPart` call, replacing any prior record for
    /// the same part number (clients may retry a part upload).
    ///
    /// # Errors
    /// [`S3ErrorCode::NoSuchUpload`] if `upload_id` is unknown.
    pub fn record_part(&self, upload_id: &str, part_number: i32, etag: String, size: i64) -> Result<(), S3Error> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(upload_id)
            .ok_or_else(|| S3Error::no_such_upload(upload_id))?;
        session.parts.retain(|p| p.part_number != part_number);
        session.parts.push(PartRecord {
            part_number,
            etag,
            size,
        });
        Ok(())
    }

    /// Fetch a snapshot of the session, for `ListParts` or `Complete`
    /// validation.
    #[must_use]
    pub fn get(&self, upload_id: &str) -> Option<MultipartSession> {
        self.sessions.read().get(upload_id).cloned()
    }

    /// Validate and remove a session on `CompleteMultipartUpload`. The
    /// caller supplies the ordered `(partNumber, etag)` pairs the client
    /// claims to have uploaded; every part must exist, ETags must match,
    /// part numbers must be strictly ascending, and every part but the
    /// last must meet [`MIN_PART_SIZE`].
    ///
    /// # Errors
    /// [`S3ErrorCode::NoSuchUpload`], [`S3ErrorCode::InvalidPartOrder`], or
    /// [`S3ErrorCode::InvalidPart`]/[`S3ErrorCode::EntityTooSmall`].
    pub fn complete(&self, upload_id: &str, claimed: &[(i32, String)]) -> Result<MultipartSession, S3Error> {
        let session = {
            let sessions = self.sessions.read();
            sessions
                .get(upload_id)
                .cloned()
                .ok_or_else(|| S3Error::no_such_upload(upload_id))?
        };

        if claimed.is_empty() {
            return Err(S3Error::with_message(S3ErrorCode::InvalidRequest, "no parts supplied"));
        }

        let mut last_number = 0;
        for (i, (part_number, etag)) in claimed.iter().enumerate() {
            if *part_number <= last_number {
                return Err(S3Error::new(S3ErrorCode::InvalidPartOrder));
            }
            last_number = *part_number;

            let recorded = session
                .parts
                .iter()
                .find(|p| p.part_number == *part_number)
                .ok_or_else(|| S3Error::invalid_part(format!("part {part_number}")))?;

            if &recorded.etag != etag {
                return Err(S3Error::invalid_part(format!("part {part_number} etag mismatch")));
            }

            let is_last = i == claimed.len() - 1;
            if !is_last && recorded.size < MIN_PART_SIZE {
                return Err(S3Error::new(S3ErrorCode::EntityTooSmall));
            }
        }

        self.sessions.write().remove(upload_id);
        Ok(session)
    }

    /// Discard a session without validation (`AbortMultipartUpload`).
    pub fn abort(&self, upload_id: &str) {
        self.sessions.write().remove(upload_id);
    }

    /// Remove sessions older than [`SESSION_MAX_AGE`]. Intended to be
    /// called on an hourly tick.
    pub fn sweep_abandoned(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| now - s.created_at < SESSION_MAX_AGE);
        before - sessions.len()
    }
}

impl S3Error {
    fn invalid_part(detail: impl Into<String>) -> Self {
        Self::with_message(S3ErrorCode::InvalidPart, detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_accepts_ascending_parts_with_matching_etags() {
        let sessions = MultipartSessions::default();
        let id = "up-1";
        sessions.create("bucket", "key", id);
        sessions.record_part(id, 1, "etag1".into(), MIN_PART_SIZE).unwrap();
        sessions.record_part(&id, 2, "etag2".into(), 10).unwrap();
        let session = sessions
            .complete(&id, &[(1, "etag1".into()), (2, "etag2".into())])
            .unwrap();
        assert_eq!(session.parts.len(), 2);
        assert!(sessions.get(&id).is_none());
    }

    #[test]
    fn test_complete_rejects_out_of_order_parts() {
        let sessions = MultipartSessions::default();
        let id = "up-2";
        sessions.create("bucket", "key", id);
        sessions.record_part(id, 2, "e2".into(), MIN_PART_SIZE).unwrap();
        sessions.record_part(id, 1, "e1".into(), MIN_PART_SIZE).unwrap();
        let err = sessions.complete(id, &[(2, "e2".into()), (1, "e1".into())]).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidPartOrder);
    }

    #[test]
    fn test_complete_rejects_undersized_non_final_part() {
        let sessions = MultipartSessions::default();
        let id = "up-3";
        sessions.create("bucket", "key", id);
        sessions.record_part(id, 1, "e1".into(), 10).unwrap();
        sessions.record_part(id, 2, "e2".into(), 10).unwrap();
        let err = sessions.complete(id, &[(1, "e1".into()), (2, "e2".into())]).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::EntityTooSmall);
    }

    #[test]
    fn test_complete_rejects_etag_mismatch() {
        let sessions = MultipartSessions::default();
        let id = "up-4";
        sessions.create("bucket", "key", id);
        sessions.record_part(id, 1, "actual".into(), MIN_PART_SIZE).unwrap();
        let err = sessions.complete(id, &[(1, "claimed".into())]).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidPart);
    }

    #[test]
    fn test_unknown_upload_id_is_no_such_upload() {
        let sessions = MultipartSessions::default();
        let err = sessions.complete("missing", &[]).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::NoSuchUpload);
    }

    #[test]
    fn test_sweep_removes_only_abandoned_sessions() {
        let sessions = MultipartSessions::default();
        let old_id = "up-old";
        sessions.create("bucket", "old", old_id);
        {
            let mut map = sessions.sessions.write();
            map.get_mut(old_id).unwrap().created_at = Utc::now() - chrono::Duration::days(8);
        }
        let fresh_id = "up-fresh";
        sessions.create("bucket", "fresh", fresh_id);
        let removed = sessions.sweep_abandoned(Utc::now());
        assert_eq!(removed, 1);
        assert!(sessions.get(old_id).is_none());
        assert!(sessions.get(fresh_id).is_some());
    }
}
