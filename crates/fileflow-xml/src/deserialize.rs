//! Parsing for the two S3 request bodies this gateway accepts as XML:
//! `CompleteMultipartUpload` and `DeleteObjects` (`POST /bucket?delete`).

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::XmlError;
use crate::types::{CompleteMultipartUploadRequest, CompletedPart, DeleteObjectsRequest, ObjectIdentifier};

fn read_text(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(t) => text.push_str(&String::from_utf8_lossy(&t.into_inner())),
            Event::End(_) | Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

/// Parse a `<CompleteMultipartUpload>` request body.
///
/// # Errors
/// Returns [`XmlError`] if the body is not well-formed XML, or a `<Part>`
/// is missing `<PartNumber>` or `<ETag>`.
pub fn parse_complete_multipart_upload(
    body: &[u8],
) -> Result<CompleteMultipartUploadRequest, XmlError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut parts = Vec::new();
    let mut part_number: Option<i32> = None;
    let mut etag: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Part" => {
                    part_number = None;
                    etag = None;
                }
                b"PartNumber" => {
                    let text = read_text(&mut reader)?;
                    part_number = Some(
                        text.parse()
                            .map_err(|_| XmlError::ParseError(format!("invalid PartNumber: {text}")))?,
                    );
                }
                b"ETag" => {
                    etag = Some(read_text(&mut reader)?);
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"Part" => {
                let part_number = part_number
                    .take()
                    .ok_or_else(|| XmlError::MissingElement("PartNumber".into()))?;
                let etag = etag
                    .take()
                    .ok_or_else(|| XmlError::MissingElement("ETag".into()))?;
                parts.push(CompletedPart { part_number, etag });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(CompleteMultipartUploadRequest { parts })
}

/// Parse a `<Delete>` request body (the `POST /bucket?delete` batch-delete payload).
///
/// # Errors
/// Returns [`XmlError`] if the body is not well-formed XML, or an `<Object>`
/// is missing `<Key>`.
pub fn parse_delete_objects(body: &[u8]) -> Result<DeleteObjectsRequest, XmlError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut objects = Vec::new();
    let mut quiet = false;
    let mut key: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Object" => key = None,
                b"Key" => key = Some(read_text(&mut reader)?),
                b"Quiet" => {
                    let text = read_text(&mut reader)?;
                    quiet = text.eq_ignore_ascii_case("true");
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"Object" => {
                let key = key
                    .take()
                    .ok_or_else(|| XmlError::MissingElement("Key".into()))?;
                objects.push(ObjectIdentifier { key });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(DeleteObjectsRequest { objects, quiet })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_multipart_upload_reads_parts_in_order() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
            <CompleteMultipartUpload>
                <Part><PartNumber>1</PartNumber><ETag>"etag1"</ETag></Part>
                <Part><PartNumber>2</PartNumber><ETag>"etag2"</ETag></Part>
            </CompleteMultipartUpload>"#;
        let parsed = parse_complete_multipart_upload(body).unwrap();
        assert_eq!(parsed.parts.len(), 2);
        assert_eq!(parsed.parts[0].part_number, 1);
        assert_eq!(parsed.parts[0].etag, "\"etag1\"");
        assert_eq!(parsed.parts[1].part_number, 2);
    }

    #[test]
    fn test_parse_complete_multipart_upload_rejects_missing_etag() {
        let body = br#"<CompleteMultipartUpload><Part><PartNumber>1</PartNumber></Part></CompleteMultipartUpload>"#;
        let err = parse_complete_multipart_upload(body).unwrap_err();
        assert!(matches!(err, XmlError::MissingElement(_)));
    }

    #[test]
    fn test_parse_delete_objects_reads_keys_and_quiet_flag() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
            <Delete>
                <Object><Key>a.txt</Key></Object>
                <Object><Key>dir/b.txt</Key></Object>
                <Quiet>true</Quiet>
            </Delete>"#;
        let parsed = parse_delete_objects(body).unwrap();
        assert_eq!(parsed.objects.len(), 2);
        assert_eq!(parsed.objects[0].key, "a.txt");
        assert_eq!(parsed.objects[1].key, "dir/b.txt");
        assert!(parsed.quiet);
    }

    #[test]
    fn test_parse_delete_objects_defaults_quiet_to_false() {
        let body = br#"<Delete><Object><Key>a.txt</Key></Object></Delete>"#;
        let parsed = parse_delete_objects(body).unwrap();
        assert!(!parsed.quiet);
    }

    #[test]
    fn test_parse_delete_objects_rejects_missing_key() {
        let body = br#"<Delete><Object></Object></Delete>"#;
        let err = parse_delete_objects(body).unwrap_err();
        assert!(matches!(err, XmlError::MissingElement(_)));
    }
}
