//! In-memory WebDAV lock tree, keyed by resource path.
//!
//! Lost on restart by design — clients re-take locks transparently, per
//! the standard WebDAV trade-off of an ephemeral lock store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

/// Exclusive or shared write lock, RFC 4918 §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    Exclusive,
    Shared,
}

/// One held lock.
#[derive(Debug, Clone)]
pub struct ActiveLock {
    pub token: String,
    pub scope: LockScope,
    pub depth_infinity: bool,
    pub owner: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl ActiveLock {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("the resource is already exclusively locked")]
    AlreadyLocked,
    #[error("an exclusive lock cannot be granted while shared locks are held")]
    SharedLocksHeld,
    #[error("no such lock token")]
    NoSuchLock,
    #[error("lock token does not match")]
    TokenMismatch,
}

/// Default and maximum lock timeout, matching common server practice for
/// clients (Finder, Office) that never send an explicit `Timeout` header.
const DEFAULT_TIMEOUT_SECS: i64 = 600;

/// Tracks every outstanding lock by normalized resource path.
#[derive(Debug, Default)]
pub struct LockManager {
    locks: RwLock<HashMap<String, Vec<ActiveLock>>>,
}

impl LockManager {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire a new lock on `path`. Fails if an incompatible lock already
    /// exists there.
    pub fn acquire(
        &self,
        path: &str,
        scope: LockScope,
        depth_infinity: bool,
        owner: Option<String>,
        timeout_secs: Option<i64>,
    ) -> Result<ActiveLock, LockError> {
        let now = Utc::now();
        let mut locks = self.locks.write();
        let existing = locks.entry(path.to_owned()).or_default();
        existing.retain(|l| !l.is_expired(now));

        if !existing.is_empty() {
            match scope {
                LockScope::Exclusive => return Err(LockError::AlreadyLocked),
                LockScope::Shared => {
                    if existing.iter().any(|l| l.scope == LockScope::Exclusive) {
                        return Err(LockError::SharedLocksHeld);
                    }
                }
            }
        }

        let lock = ActiveLock {
            token: format!("urn:uuid:{}", Uuid::new_v4()),
            scope,
            depth_infinity,
            owner,
            expires_at: now + ChronoDuration::seconds(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        };
        existing.push(lock.clone());
        Ok(lock)
    }

    /// Refresh an existing lock's timeout (a `LOCK` request carrying an
    /// `If:` header naming the token instead of a new lock type).
    pub fn refresh(&self, path: &str, token: &str, timeout_secs: Option<i64>) -> Result<ActiveLock, LockError> {
        let now = Utc::now();
        let mut locks = self.locks.write();
        let existing = locks.get_mut(path).ok_or(LockError::NoSuchLock)?;
        let lock = existing.iter_mut().find(|l| l.token == token).ok_or(LockError::NoSuchLock)?;
        lock.expires_at = now + ChronoDuration::seconds(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        Ok(lock.clone())
    }

    pub fn release(&self, path: &str, token: &str) -> Result<(), LockError> {
        let mut locks = self.locks.write();
        let Some(existing) = locks.get_mut(path) else {
            return Err(LockError::NoSuchLock);
        };
        let before = existing.len();
        existing.retain(|l| l.token != token);
        if existing.len() == before {
            return Err(LockError::NoSuchLock);
        }
        if existing.is_empty() {
            locks.remove(path);
        }
        Ok(())
    }

    /// Every live (non-expired) lock directly on `path`.
    #[must_use]
    pub fn active_locks(&self, path: &str) -> Vec<ActiveLock> {
        let now = Utc::now();
        self.locks
            .read()
            .get(path)
            .map(|locks| locks.iter().filter(|l| !l.is_expired(now)).cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a write to `path` is permitted given the request's `If:`
    /// header. Conditional-request matching is simplified to a substring
    /// search for each held lock's token inside the header's coded-URL
    /// list, which covers the single-resource case every WebDAV client in
    /// practice sends.
    #[must_use]
    pub fn check_if_header(&self, path: &str, if_header: Option<&str>) -> bool {
        let locks = self.active_locks(path);
        if locks.is_empty() {
            return true;
        }
        let Some(header) = if_header else {
            return false;
        };
        locks.iter().any(|l| header.contains(&l.token))
    }

    /// Drop every expired lock. Intended to be called periodically so the
    /// map doesn't grow unbounded with abandoned entries.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        let mut locks = self.locks.write();
        locks.retain(|_, v| {
            v.retain(|l| !l.is_expired(now));
            !v.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_lock_blocks_second_exclusive_lock() {
        let mgr = LockManager::default();
        mgr.acquire("/a", LockScope::Exclusive, false, None, None).unwrap();
        let err = mgr.acquire("/a", LockScope::Exclusive, false, None, None).unwrap_err();
        assert!(matches!(err, LockError::AlreadyLocked));
    }

    #[test]
    fn test_shared_locks_can_stack() {
        let mgr = LockManager::default();
        mgr.acquire("/a", LockScope::Shared, false, None, None).unwrap();
        mgr.acquire("/a", LockScope::Shared, false, None, None).unwrap();
        assert_eq!(mgr.active_locks("/a").len(), 2);
    }

    #[test]
    fn test_exclusive_lock_rejected_while_shared_held() {
        let mgr = LockManager::default();
        mgr.acquire("/a", LockScope::Shared, false, None, None).unwrap();
        let err = mgr.acquire("/a", LockScope::Exclusive, false, None, None).unwrap_err();
        assert!(matches!(err, LockError::SharedLocksHeld));
    }

    #[test]
    fn test_release_requires_matching_token() {
        let mgr = LockManager::default();
        let lock = mgr.acquire("/a", LockScope::Exclusive, false, None, None).unwrap();
        assert!(mgr.release("/a", "urn:uuid:wrong").is_err());
        assert!(mgr.release("/a", &lock.token).is_ok());
        assert!(mgr.active_locks("/a").is_empty());
    }

    #[test]
    fn test_check_if_header_passes_with_no_locks() {
        let mgr = LockManager::default();
        assert!(mgr.check_if_header("/a", None));
    }

    #[test]
    fn test_check_if_header_requires_token_when_locked() {
        let mgr = LockManager::default();
        let lock = mgr.acquire("/a", LockScope::Exclusive, false, None, None).unwrap();
        assert!(!mgr.check_if_header("/a", None));
        let header = format!("(<{}>)", lock.token);
        assert!(mgr.check_if_header("/a", Some(&header)));
    }

    #[test]
    fn test_sweep_expired_removes_stale_entries() {
        let mgr = LockManager::default();
        mgr.acquire("/a", LockScope::Exclusive, false, None, Some(-1)).unwrap();
        mgr.sweep_expired();
        assert!(mgr.active_locks("/a").is_empty());
    }
}
