//! S3 XML response serialization.
//!
//! Follows the AWS S3 RestXml conventions: a leading XML declaration, a
//! namespaced root element, and ISO-8601 millisecond timestamps.

use std::io::{self, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

use crate::error::XmlError;
use crate::types::{
    CompleteMultipartUploadResult, CopyObjectResult, DeleteResult, InitiateMultipartUploadResult,
    ListBucketResult, ListPartsResult,
};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Serialize `value`'s XML body as `root_element`, with the declaration and
/// namespace attribute S3 clients expect.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;
    Ok(buf)
}

/// Implemented by every response body type; writes its child elements into
/// the root element `to_xml` opens.
pub trait S3Serialize {
    /// # Errors
    /// Returns an I/O error if writing to the underlying buffer fails.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

fn text<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer.create_element(tag).write_text_content(BytesText::new(text))?;
    Ok(())
}

fn opt_text<W: Write>(writer: &mut Writer<W>, tag: &str, value: Option<&str>) -> io::Result<()> {
    if let Some(v) = value {
        text(writer, tag, v)?;
    }
    Ok(())
}

fn timestamp(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn quoted_etag(etag: &str) -> String {
    if etag.starts_with('"') { etag.to_owned() } else { format!("\"{etag}\"") }
}

impl S3Serialize for ListBucketResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        text(w, "Name", &self.name)?;
        text(w, "Prefix", &self.prefix)?;
        opt_text(w, "Delimiter", self.delimiter.as_deref())?;
        text(w, "MaxKeys", &self.max_keys.to_string())?;
        text(w, "KeyCount", &self.key_count.to_string())?;
        text(w, "IsTruncated", if self.is_truncated { "true" } else { "false" })?;
        opt_text(w, "ContinuationToken", self.continuation_token.as_deref())?;
        opt_text(w, "NextContinuationToken", self.next_continuation_token.as_deref())?;
        for obj in &self.contents {
            w.create_element("Contents").write_inner_content(|w| {
                text(w, "Key", &obj.key)?;
                text(w, "LastModified", &timestamp(obj.last_modified))?;
                opt_text(w, "ETag", obj.etag.as_deref().map(quoted_etag).as_deref())?;
                text(w, "Size", &obj.size.to_string())?;
                text(w, "StorageClass", "STANDARD")?;
                Ok(())
            })?;
        }
        for prefix in &self.common_prefixes {
            w.create_element("CommonPrefixes")
                .write_inner_content(|w| text(w, "Prefix", &prefix.prefix))?;
        }
        Ok(())
    }
}

impl S3Serialize for DeleteResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        for d in &self.deleted {
            w.create_element("Deleted")
                .write_inner_content(|w| text(w, "Key", &d.key))?;
        }
        for e in &self.errors {
            w.create_element("Error").write_inner_content(|w| {
                text(w, "Key", &e.key)?;
                text(w, "Code", &e.code)?;
                text(w, "Message", &e.message)
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for InitiateMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        text(w, "Bucket", &self.bucket)?;
        text(w, "Key", &self.key)?;
        text(w, "UploadId", &self.upload_id)
    }
}

impl S3Serialize for CompleteMultipartUploadResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        text(w, "Location", &self.location)?;
        text(w, "Bucket", &self.bucket)?;
        text(w, "Key", &self.key)?;
        opt_text(w, "ETag", self.etag.as_deref().map(quoted_etag).as_deref())
    }
}

impl S3Serialize for ListPartsResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        text(w, "Bucket", &self.bucket)?;
        text(w, "Key", &self.key)?;
        text(w, "UploadId", &self.upload_id)?;
        for part in &self.parts {
            w.create_element("Part").write_inner_content(|w| {
                text(w, "PartNumber", &part.part_number.to_string())?;
                text(w, "ETag", &quoted_etag(&part.etag))?;
                text(w, "Size", &part.size.to_string())?;
                if let Some(lm) = part.last_modified {
                    text(w, "LastModified", &timestamp(lm))?;
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

impl S3Serialize for CopyObjectResult {
    fn serialize_xml<W: Write>(&self, w: &mut Writer<W>) -> io::Result<()> {
        text(w, "LastModified", &timestamp(self.last_modified))?;
        opt_text(w, "ETag", self.etag.as_deref().map(quoted_etag).as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommonPrefix, ObjectContents};
    use chrono::TimeZone;

    #[test]
    fn test_list_bucket_result_serializes_contents_and_prefixes() {
        let result = ListBucketResult {
            name: "bucket".into(),
            prefix: "docs/".into(),
            delimiter: Some("/".into()),
            max_keys: 1000,
            is_truncated: false,
            continuation_token: None,
            next_continuation_token: None,
            key_count: 2,
            contents: vec![ObjectContents {
                key: "docs/a.txt".into(),
                size: 5,
                last_modified: chrono::Utc.timestamp_opt(0, 0).unwrap(),
                etag: Some("abc".into()),
            }],
            common_prefixes: vec![CommonPrefix { prefix: "docs/sub/".into() }],
        };
        let xml = to_xml("ListBucketResult", &result).unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<Name>bucket</Name>"));
        assert!(xml.contains("<Key>docs/a.txt</Key>"));
        assert!(xml.contains("<ETag>\"abc\"</ETag>"));
        assert!(xml.contains("<Prefix>docs/sub/</Prefix>"));
        assert!(xml.contains(&format!("xmlns=\"{S3_NAMESPACE}\"")));
    }

    #[test]
    fn test_delete_result_serializes_mixed_outcomes() {
        let result = DeleteResult {
            deleted: vec![crate::types::DeletedObject { key: "a".into() }],
            errors: vec![crate::types::DeleteError {
                key: "b".into(),
                code: "AccessDenied".into(),
                message: "no".into(),
            }],
        };
        let xml = String::from_utf8(to_xml("DeleteResult", &result).unwrap()).unwrap();
        assert!(xml.contains("<Deleted><Key>a</Key></Deleted>"));
        assert!(xml.contains("<Code>AccessDenied</Code>"));
    }
}
