//! A minimal `multipart/form-data` parser (RFC 7578) for `/upload`.
//!
//! Handles exactly what the upload endpoint needs: a flat list of named
//! parts, each with an optional filename and content type. No nested
//! multipart, no streaming — the whole body is already buffered by the
//! time it reaches here.

use bytes::Bytes;

use crate::error::RestError;

/// One decoded part of a multipart/form-data body.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Extract the `boundary=...` parameter from a `Content-Type` header value.
#[must_use]
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    let (mime, rest) = content_type.split_once(';')?;
    if !mime.trim().eq_ignore_ascii_case("multipart/form-data") {
        return None;
    }
    for param in rest.split(';') {
        let param = param.trim();
        if let Some(value) = param.strip_prefix("boundary=") {
            return Some(value.trim_matches('"').to_owned());
        }
    }
    None
}

/// Parse a full multipart/form-data body into its parts.
pub fn parse(body: &Bytes, boundary: &str) -> Result<Vec<Part>, RestError> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut parts = Vec::new();
    let mut cursor = 0usize;

    while let Some(offset) = find(&body[cursor..], &delimiter) {
        let start = cursor + offset + delimiter.len();
        cursor = start;

        if body[cursor..].starts_with(b"--") {
            break;
        }
        let Some(rest) = body.get(cursor..).map(|s| s.strip_prefix(b"\r\n".as_slice()).unwrap_or(s)) else {
            break;
        };
        cursor += body[cursor..].len() - rest.len();

        let Some(header_end) = find(&body[cursor..], b"\r\n\r\n") else {
            return Err(RestError::BadRequest("malformed multipart body: missing header terminator".to_owned()));
        };
        let header_block = &body[cursor..cursor + header_end];
        let body_start = cursor + header_end + 4;

        let Some(next_delim) = find(&body[body_start..], &delimiter) else {
            return Err(RestError::BadRequest("malformed multipart body: missing closing boundary".to_owned()));
        };
        let mut part_body_end = body_start + next_delim;
        if part_body_end >= 2 && body[part_body_end - 2] == b'\r' && body[part_body_end - 1] == b'\n' {
            part_body_end -= 2;
        }

        let headers = std::str::from_utf8(header_block)
            .map_err(|_| RestError::BadRequest("multipart headers are not valid utf-8".to_owned()))?;
        let (name, filename, content_type) = parse_part_headers(headers)?;

        parts.push(Part {
            name,
            filename,
            content_type,
            data: body.slice(body_start..part_body_end),
        });

        cursor = body_start + next_delim;
    }

    Ok(parts)
}

fn parse_part_headers(headers: &str) -> Result<(String, Option<String>, Option<String>), RestError> {
    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "content-disposition" {
            for param in value.split(';').skip(1) {
                let param = param.trim();
                if let Some(v) = param.strip_prefix("name=") {
                    name = Some(v.trim_matches('"').to_owned());
                } else if let Some(v) = param.strip_prefix("filename=") {
                    filename = Some(v.trim_matches('"').to_owned());
                }
            }
        } else if key == "content-type" {
            content_type = Some(value.to_owned());
        }
    }

    let name = name.ok_or_else(|| RestError::BadRequest("multipart part missing name".to_owned()))?;
    Ok((name, filename, content_type))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_from_content_type_extracts_value() {
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=XYZ"),
            Some("XYZ".to_owned())
        );
        assert_eq!(boundary_from_content_type("application/json"), None);
    }

    #[test]
    fn test_boundary_handles_quoted_value() {
        assert_eq!(
            boundary_from_content_type(r#"multipart/form-data; boundary="abc123""#),
            Some("abc123".to_owned())
        );
    }

    #[test]
    fn test_parse_extracts_field_and_file_parts() {
        let body = Bytes::from(
            "--B\r\n\
Content-Disposition: form-data; name=\"path\"\r\n\
\r\n\
docs\r\n\
--B\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
hello world\r\n\
--B--\r\n",
        );
        let parts = parse(&body, "B").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "path");
        assert_eq!(parts[0].data.as_ref(), b"docs");
        assert_eq!(parts[1].name, "file");
        assert_eq!(parts[1].filename.as_deref(), Some("a.txt"));
        assert_eq!(parts[1].content_type.as_deref(), Some("text/plain"));
        assert_eq!(parts[1].data.as_ref(), b"hello world");
    }

    #[test]
    fn test_parse_rejects_missing_boundary_terminator() {
        let body = Bytes::from_static(b"--B\r\nContent-Disposition: form-data; name=\"x\"\r\n\r\nvalue");
        assert!(parse(&body, "B").is_err());
    }
}
