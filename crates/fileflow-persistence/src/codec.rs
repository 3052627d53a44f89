//! JSON-column encoding helpers shared by every SQL-flavored backend.
//!
//! Per : list-valued columns (permission sets) are JSON-encoded
//! strings; booleans are native or 0/1 depending on backend; timestamps are
//! ISO-8601 strings.

use chrono::{DateTime, Utc};
use fileflow_core::{FileFlowError, FileFlowResult, PermissionSet};

/// Encode a permission set as the JSON array string stored in a TEXT column.
#[must_use]
pub fn encode_permissions(perms: &PermissionSet) -> String {
    serde_json::to_string(&perms.to_strings()).unwrap_or_else(|_| "[]".to_owned())
}

/// Decode a permission set from its JSON array string form.
pub fn decode_permissions(raw: &str) -> FileFlowResult<PermissionSet> {
    let values: Vec<String> = serde_json::from_str(raw)
        .map_err(|e| FileFlowError::Storage(format!("invalid permissions json: {e}")))?;
    PermissionSet::parse(&values)
}

/// Render a timestamp as the ISO-8601 string stored in a TEXT column.
#[must_use]
pub fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp from its ISO-8601 string form.
pub fn decode_timestamp(raw: &str) -> FileFlowResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FileFlowError::Storage(format!("invalid timestamp {raw:?}: {e}")))
}

/// Parse an optional timestamp, treating an empty string as `None`.
pub fn decode_optional_timestamp(raw: &str) -> FileFlowResult<Option<DateTime<Utc>>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        decode_timestamp(raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileflow_core::Permission;

    #[test]
    fn test_permission_roundtrip() {
        let perms = PermissionSet(vec![Permission::Read, Permission::Write]);
        let encoded = encode_permissions(&perms);
        let decoded = decode_permissions(&encoded).unwrap();
        assert_eq!(perms, decoded);
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let now = Utc::now();
        let encoded = encode_timestamp(now);
        let decoded = decode_timestamp(&encoded).unwrap();
        assert_eq!(now.timestamp_millis(), decoded.timestamp_millis());
    }

    #[test]
    fn test_optional_timestamp_empty_is_none() {
        assert_eq!(decode_optional_timestamp("").unwrap(), None);
    }
}
