//! Account selection by quota headroom and capability flags.

use crate::error::{FileFlowError, FileFlowResult};
use crate::model::{Account, Plane};

/// Accounts eligible for `plane`: active ∧ ¬overQuota ∧ ¬overOps ∧
/// `capability[plane]`.
#[must_use]
pub fn eligible_accounts(accounts: &[Account], plane: Plane) -> Vec<Account> {
    accounts
        .iter()
        .filter(|a| a.is_available_for(plane))
        .cloned()
        .collect()
}

/// Pick the automatic-upload target: the eligible account with the lowest
/// `usagePercent`, ties broken by earliest `createdAt`. Fails with
/// [`FileFlowError::NoAvailableAccount`] if no account is eligible.
pub fn pick_automatic_upload_target(accounts: &[Account], plane: Plane) -> FileFlowResult<Account> {
    eligible_accounts(accounts, plane)
        .into_iter()
        .min_by(|a, b| {
            a.usage_percent()
                .partial_cmp(&b.usage_percent())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.created_at.cmp(&b.created_at))
        })
        .ok_or(FileFlowError::NoAvailableAccount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Capabilities, Quota, Usage};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn account(name: &str, usage_pct: i64, created_offset_secs: i64) -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            active: true,
            upstream_account_id: "a".into(),
            access_key_id: "ak".into(),
            secret_access_key: "sk".into(),
            bucket_name: "bucket".into(),
            endpoint_url: "https://example.com".into(),
            public_domain: "example.com".into(),
            analytics_token: None,
            quota: Quota {
                max_size_bytes: 100,
                max_class_a_ops: 1000,
            },
            usage: Usage {
                size_bytes: usage_pct,
                class_a_ops: 0,
                class_b_ops: 0,
                last_sync_at: None,
            },
            capabilities: Capabilities::default(),
            created_at: now + Duration::seconds(created_offset_secs),
            updated_at: now,
        }
    }

    #[test]
    fn test_picks_lowest_usage_percent() {
        let accounts = vec![account("A", 50, 0), account("B", 10, 0)];
        let picked = pick_automatic_upload_target(&accounts, Plane::Auto).unwrap();
        assert_eq!(picked.name, "B");
    }

    #[test]
    fn test_ties_broken_by_earliest_created_at() {
        let accounts = vec![account("A", 10, 10), account("B", 10, 0)];
        let picked = pick_automatic_upload_target(&accounts, Plane::Auto).unwrap();
        assert_eq!(picked.name, "B");
    }

    #[test]
    fn test_fails_when_no_account_eligible() {
        let mut a = account("A", 0, 0);
        a.active = false;
        let err = pick_automatic_upload_target(&[a], Plane::Auto).unwrap_err();
        assert!(matches!(err, FileFlowError::NoAvailableAccount));
    }

    #[test]
    fn test_respects_capability_flag() {
        let mut a = account("A", 0, 0);
        a.capabilities.auto_upload = false;
        let err = pick_automatic_upload_target(&[a], Plane::Auto).unwrap_err();
        assert!(matches!(err, FileFlowError::NoAvailableAccount));
    }

    #[test]
    fn test_respects_over_quota() {
        let mut a = account("A", 0, 0);
        a.usage.size_bytes = a.quota.max_size_bytes;
        let err = pick_automatic_upload_target(&[a], Plane::Auto).unwrap_err();
        assert!(matches!(err, FileFlowError::NoAvailableAccount));
    }
}
