//! Canonical request construction per the SigV4 specification.
//!
//! <https://docs.aws.amazon.com/IAM/latest/UserGuide/create-signed-request.html>

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters that must be percent-encoded in a canonical URI path segment.
/// Unreserved characters (`A-Za-z0-9-._~`) and `/` (preserved as the path
/// separator) are left alone.
const PATH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'!')
    .add(b'$')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b':')
    .add(b';')
    .add(b'=')
    .add(b'@')
    .add(b'[')
    .add(b']');

/// Same as [`PATH_ENCODE_SET`] but also encodes `/`, for query keys/values.
const QUERY_ENCODE_SET: &AsciiSet = &PATH_ENCODE_SET.add(b'/');

/// Percent-encode a single path segment, collapsing repeated slashes to one
/// per SigV4's single-slash canonical-URI rule.
#[must_use]
pub fn canonical_uri(path: &str) -> String {
    if path.is_empty() {
        return "/".to_owned();
    }
    path.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Canonicalize a raw query string: percent-encode each key/value, sort by
/// key (then value), and join with `&`. Keys without a value are encoded as
/// `key=`.
#[must_use]
pub fn canonical_query_string(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            (encode_query_component(key), encode_query_component(value))
        })
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_query_component(raw: &str) -> String {
    // Query components arrive already percent-encoded on the wire; decode
    // once then re-encode canonically so repeated encode passes don't
    // double-escape `%` signs.
    let decoded = percent_encoding::percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| raw.to_owned());
    utf8_percent_encode(&decoded, QUERY_ENCODE_SET).to_string()
}

/// Build the canonical headers block: lowercased names, trimmed
/// (collapsed internal whitespace) values, sorted by name, one
/// `name:value\n` line per header, followed by the signed-headers line.
#[must_use]
pub fn canonical_headers(headers: &[(&str, &str)]) -> String {
    let mut sorted: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), trim_header_value(value)))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn trim_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the `SignedHeaders` line: lowercased names, sorted, `;`-joined.
#[must_use]
pub fn build_signed_headers_string(signed_headers: &[&str]) -> String {
    let mut names: Vec<String> = signed_headers.iter().map(|h| h.to_lowercase()).collect();
    names.sort();
    names.join(";")
}

/// Build the canonical request:
/// `METHOD\nURI\nQUERY\nHEADERS\nSIGNED_HEADERS\nPAYLOAD_HASH`.
#[must_use]
pub fn build_canonical_request(
    method: &str,
    uri: &str,
    query: &str,
    header_pairs: &[(&str, &str)],
    signed_headers: &[&str],
    payload_hash: &str,
) -> String {
    format!(
        "{method}\n{uri}\n{query}\n{headers}\n{signed}\n{payload_hash}",
        uri = canonical_uri(uri),
        query = canonical_query_string(query),
        headers = canonical_headers(header_pairs),
        signed = build_signed_headers_string(signed_headers),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_uri_encodes_segments_but_keeps_slashes() {
        assert_eq!(canonical_uri("/a b/c"), "/a%20b/c");
        assert_eq!(canonical_uri(""), "/");
    }

    #[test]
    fn test_canonical_query_string_sorts_and_encodes() {
        let query = "b=2&a=1&a=0";
        assert_eq!(canonical_query_string(query), "a=0&a=1&b=2");
    }

    #[test]
    fn test_canonical_headers_lowercases_and_trims() {
        let headers = [("Host", "example.com"), ("X-Amz-Date", "  2020  01  ")];
        let out = canonical_headers(&headers);
        assert_eq!(out, "host:example.com\nx-amz-date:2020 01\n");
    }

    #[test]
    fn test_build_signed_headers_string_sorts() {
        assert_eq!(build_signed_headers_string(&["host", "x-amz-date"]), "host;x-amz-date");
    }
}
