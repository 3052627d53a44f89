//! Mapping WebDAV request paths onto the flat key-space directory model:
//! a directory is either a zero-byte object with a trailing `/`, or implied
//! by any object whose key has that prefix. `/` is a synthetic root.

use fileflow_aggregator::UpstreamClient;
use fileflow_core::{FileFlowError, FileFlowResult, UpstreamError};
use percent_encoding::percent_decode_str;

/// What a resolved WebDAV path turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    /// The synthetic root or a directory marker/implied-by-children prefix.
    Directory,
    /// A concrete object.
    File,
    /// Neither exists.
    Missing,
}

/// Decode and strip the mount prefix from a raw request path, yielding the
/// object key with no leading slash (empty string means the root).
#[must_use]
pub fn key_from_request_path(raw_path: &str, mount_prefix: &str) -> String {
    let decoded = percent_decode_str(raw_path).decode_utf8_lossy().into_owned();
    let stripped = decoded.strip_prefix(mount_prefix).unwrap_or(&decoded);
    stripped.trim_start_matches('/').to_owned()
}

/// Whether `key` denotes a directory by the trailing-slash convention.
#[must_use]
pub fn is_directory_key(key: &str) -> bool {
    key.is_empty() || key.ends_with('/')
}

/// The directory-prefix form of `key` (guaranteed trailing `/`, unless root).
#[must_use]
pub fn directory_prefix(key: &str) -> String {
    if key.is_empty() || key.ends_with('/') {
        key.to_owned()
    } else {
        format!("{key}/")
    }
}

/// The display name: the last non-empty path segment, or "/" for the root.
#[must_use]
pub fn display_name(key: &str) -> String {
    let trimmed = key.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.rsplit('/').next().unwrap_or(trimmed).to_owned()
    }
}

/// Probe the upstream to determine what kind of resource `key` names.
///
/// `key` as given by the caller may or may not carry a trailing slash;
/// both the placeholder-object and implied-by-children cases are checked.
pub async fn resolve_kind(client: &dyn UpstreamClient, key: &str) -> FileFlowResult<ResourceKind> {
    if key.is_empty() {
        return Ok(ResourceKind::Directory);
    }

    if is_directory_key(key) {
        return probe_directory(client, key).await;
    }

    match client.head_object(key).await {
        Ok(_) => Ok(ResourceKind::File),
        Err(FileFlowError::Upstream(UpstreamError::NotFound(_))) => {
            let prefix = directory_prefix(key);
            probe_directory(client, &prefix).await
        }
        Err(other) => Err(other),
    }
}

async fn probe_directory(client: &dyn UpstreamClient, prefix: &str) -> FileFlowResult<ResourceKind> {
    if client.head_object(prefix).await.is_ok() {
        return Ok(ResourceKind::Directory);
    }
    let page = client.list_objects_v2(prefix, None, 1).await?;
    if page.objects.is_empty() && page.prefixes.is_empty() {
        Ok(ResourceKind::Missing)
    } else {
        Ok(ResourceKind::Directory)
    }
}

/// Walk every object under `prefix` (recursively, since the upstream listing
/// API only ever returns one level at a time), returning their full keys.
/// Used by recursive `DELETE`, `COPY`, and `MOVE` on directories.
pub async fn collect_recursive(client: &dyn UpstreamClient, prefix: &str) -> FileFlowResult<Vec<String>> {
    let mut out = Vec::new();
    let mut stack = vec![prefix.to_owned()];
    while let Some(current) = stack.pop() {
        let mut cursor: Option<String> = None;
        loop {
            let page = client.list_objects_v2(&current, cursor.as_deref(), 1000).await?;
            for object in &page.objects {
                out.push(object.key.clone());
            }
            stack.extend(page.prefixes.iter().cloned());
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_request_path_strips_mount_and_decodes() {
        assert_eq!(key_from_request_path("/webdav/a%20b/c", "/webdav"), "a b/c");
        assert_eq!(key_from_request_path("/webdav/", "/webdav"), "");
        assert_eq!(key_from_request_path("/webdav", "/webdav"), "");
    }

    #[test]
    fn test_directory_prefix_adds_trailing_slash_once() {
        assert_eq!(directory_prefix("a/b"), "a/b/");
        assert_eq!(directory_prefix("a/b/"), "a/b/");
        assert_eq!(directory_prefix(""), "");
    }

    #[test]
    fn test_display_name_takes_last_segment() {
        assert_eq!(display_name("a/b/c.txt"), "c.txt");
        assert_eq!(display_name("a/b/"), "b");
        assert_eq!(display_name(""), "/");
    }
}
