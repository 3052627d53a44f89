//! Query-string parsing shared by the REST handlers that accept
//! `?key=value` parameters (`/files`, `/file`, `/link`).

use percent_encoding::percent_decode_str;

/// Parse a raw query string (without the leading `?`) into ordered pairs.
#[must_use]
pub fn parse(query: &str) -> Vec<(String, String)> {
    if query.is_empty() {
        return Vec::new();
    }
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            if let Some(pos) = pair.find('=') {
                (decode(&pair[..pos]), decode(&pair[pos + 1..]))
            } else {
                (decode(pair), String::new())
            }
        })
        .collect()
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().replace('+', " ")
}

/// The first value for `key`, if present.
#[must_use]
pub fn value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Every value for `key`, in order (used for repeated `idGroup=` params).
pub fn values<'a>(params: &'a [(String, String)], key: &str) -> impl Iterator<Item = &'a str> {
    params.iter().filter(move |(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_query_is_empty() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_parse_decodes_percent_encoding() {
        let params = parse("prefix=a%2Fb&limit=10");
        assert_eq!(value(&params, "prefix"), Some("a/b"));
        assert_eq!(value(&params, "limit"), Some("10"));
    }

    #[test]
    fn test_parse_handles_valueless_flag() {
        let params = parse("flag");
        assert_eq!(value(&params, "flag"), Some(""));
    }

    #[test]
    fn test_values_collects_repeated_keys() {
        let params = parse("idGroup=a&idGroup=b");
        let collected: Vec<&str> = values(&params, "idGroup").collect();
        assert_eq!(collected, vec!["a", "b"]);
    }
}
