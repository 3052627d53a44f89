//! `PROPFIND` request parsing and 207 Multi-Status response building.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesText, Event};

/// The property names this handler knows how to report.
pub const SUPPORTED_PROPS: &[&str] = &[
    "resourcetype",
    "displayname",
    "getcontenttype",
    "getcontentlength",
    "getlastmodified",
    "creationdate",
    "getetag",
];

/// A parsed `PROPFIND` request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropfindRequest {
    /// No body, or an explicit `<allprop/>`: return every supported prop.
    AllProp,
    /// `<propname/>`: return only the names of supported props, no values.
    PropName,
    /// `<prop>` with an explicit child list.
    Prop(Vec<String>),
}

/// Parse a `PROPFIND` request body. An empty body is treated as `allprop`,
/// matching RFC 4918 §9.1's default. Malformed XML is also treated as
/// `allprop` rather than failing the request.
#[must_use]
pub fn parse_propfind_body(body: &[u8]) -> PropfindRequest {
    if body.iter().all(u8::is_ascii_whitespace) {
        return PropfindRequest::AllProp;
    }

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut in_prop = false;
    let mut names = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => match e.local_name().as_ref() {
                b"allprop" => return PropfindRequest::AllProp,
                b"propname" => return PropfindRequest::PropName,
                b"prop" => in_prop = true,
                other if in_prop => names.push(String::from_utf8_lossy(other).into_owned()),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"prop" {
                    in_prop = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => return PropfindRequest::AllProp,
            _ => {}
        }
    }

    if names.is_empty() { PropfindRequest::AllProp } else { PropfindRequest::Prop(names) }
}

/// One resource's facts, enough to answer every supported prop.
#[derive(Debug, Clone)]
pub struct PropfindEntry {
    pub href: String,
    pub display_name: String,
    pub is_collection: bool,
    pub content_length: Option<i64>,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// Render a 207 Multi-Status body for `entries`, honoring a requested
/// property subset (`None` means `allprop`).
#[must_use]
pub fn build_multistatus(entries: &[PropfindEntry], request: &PropfindRequest) -> Vec<u8> {
    let mut buf = Vec::with_capacity(512 * entries.len().max(1));
    let mut writer = Writer::new(&mut buf);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .expect("writing to an in-memory buffer cannot fail");

    writer
        .create_element("D:multistatus")
        .with_attribute(("xmlns:D", "DAV:"))
        .write_inner_content(|w| {
            for entry in entries {
                write_response(w, entry, request)?;
            }
            Ok(())
        })
        .expect("writing to an in-memory buffer cannot fail");

    buf
}

fn write_response<W: Write>(w: &mut Writer<W>, entry: &PropfindEntry, request: &PropfindRequest) -> io::Result<()> {
    w.create_element("D:response").write_inner_content(|w| {
        text(w, "D:href", &entry.href)?;

        let (known, unknown) = split_requested_props(request);
        if !known.is_empty() || matches!(request, PropfindRequest::AllProp) {
            write_propstat_ok(w, entry, request, &known)?;
        }
        if !unknown.is_empty() {
            write_propstat_not_found(w, &unknown)?;
        }
        Ok(())
    })?;
    Ok(())
}

fn split_requested_props(request: &PropfindRequest) -> (Vec<String>, Vec<String>) {
    match request {
        PropfindRequest::AllProp | PropfindRequest::PropName => {
            (SUPPORTED_PROPS.iter().map(|s| (*s).to_owned()).collect(), Vec::new())
        }
        PropfindRequest::Prop(names) => {
            let mut known = Vec::new();
            let mut unknown = Vec::new();
            for name in names {
                if SUPPORTED_PROPS.contains(&name.as_str()) {
                    known.push(name.clone());
                } else {
                    unknown.push(name.clone());
                }
            }
            (known, unknown)
        }
    }
}

fn write_propstat_ok<W: Write>(
    w: &mut Writer<W>,
    entry: &PropfindEntry,
    request: &PropfindRequest,
    known: &[String],
) -> io::Result<()> {
    w.create_element("D:propstat").write_inner_content(|w| {
        let name_only = matches!(request, PropfindRequest::PropName);
        w.create_element("D:prop").write_inner_content(|w| {
            for name in known {
                write_prop_value(w, name, entry, name_only)?;
            }
            Ok(())
        })?;
        text(w, "D:status", "HTTP/1.1 200 OK")?;
        Ok(())
    })?;
    Ok(())
}

fn write_propstat_not_found<W: Write>(w: &mut Writer<W>, unknown: &[String]) -> io::Result<()> {
    w.create_element("D:propstat").write_inner_content(|w| {
        w.create_element("D:prop").write_inner_content(|w| {
            for name in unknown {
                w.create_element(&format!("D:{name}")).write_empty()?;
            }
            Ok(())
        })?;
        text(w, "D:status", "HTTP/1.1 404 Not Found")?;
        Ok(())
    })?;
    Ok(())
}

fn write_prop_value<W: Write>(w: &mut Writer<W>, name: &str, entry: &PropfindEntry, name_only: bool) -> io::Result<()> {
    match name {
        "resourcetype" => {
            w.create_element("D:resourcetype").write_inner_content(|w| {
                if entry.is_collection && !name_only {
                    w.create_element("D:collection").write_empty()?;
                }
                Ok(())
            })?;
        }
        "displayname" => leaf(w, "D:displayname", name_only, Some(&entry.display_name))?,
        "getcontenttype" => leaf(w, "D:getcontenttype", name_only, entry.content_type.as_deref())?,
        "getcontentlength" => {
            let value = entry.content_length.map(|n| n.to_string());
            leaf(w, "D:getcontentlength", name_only, value.as_deref())?;
        }
        "getlastmodified" => {
            let value = entry.last_modified.map(|t| t.to_rfc2822());
            leaf(w, "D:getlastmodified", name_only, value.as_deref())?;
        }
        "creationdate" => {
            let value = entry.last_modified.map(|t| t.to_rfc3339());
            leaf(w, "D:creationdate", name_only, value.as_deref())?;
        }
        "getetag" => {
            let value = entry.etag.as_ref().map(|e| format!("\"{e}\""));
            leaf(w, "D:getetag", name_only, value.as_deref())?;
        }
        _ => {}
    }
    Ok(())
}

fn leaf<W: Write>(w: &mut Writer<W>, tag: &str, name_only: bool, value: Option<&str>) -> io::Result<()> {
    match (name_only, value) {
        (true, _) | (false, None) => {
            w.create_element(tag).write_empty()?;
        }
        (false, Some(v)) => text(w, tag, v)?,
    }
    Ok(())
}

fn text<W: Write>(w: &mut Writer<W>, tag: &str, value: &str) -> io::Result<()> {
    w.create_element(tag).write_text_content(BytesText::new(value))?;
    Ok(())
}
