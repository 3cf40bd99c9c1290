use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, info, instrument};

use crate::domain::{CallRecord, CallType, LoadError};

const CALL_ELEMENT: &[u8] = b"call";

/// Read every `<call>` element of the XML document at `path`, in document order.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<Vec<CallRecord>, LoadError> {
    let start_time = Instant::now();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_calls(Reader::from_reader(BufReader::new(file)))?;
    info!(
        "Loaded {} calls in {}ms",
        records.len(),
        start_time.elapsed().as_millis()
    );
    Ok(records)
}

fn read_calls<R: BufRead>(mut reader: Reader<R>) -> Result<Vec<CallRecord>, LoadError> {
    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| LoadError::Xml {
                position: reader.buffer_position() as u64,
                source,
            })?;
        match event {
            Event::Start(e) => {
                enter_element(depth, &mut seen_root)?;
                records.extend(read_element(&e, reader.buffer_position() as u64)?);
                depth += 1;
            }
            Event::Empty(e) => {
                enter_element(depth, &mut seen_root)?;
                records.extend(read_element(&e, reader.buffer_position() as u64)?);
            }
            Event::End(_) => {
                // Mismatched end tags are rejected by the reader itself
                depth = depth.saturating_sub(1);
            }
            Event::Text(text) => {
                let position = reader.buffer_position() as u64;
                let content = text
                    .unescape()
                    .map_err(|source| LoadError::Xml { position, source })?;
                if depth == 0 && !content.trim().is_empty() {
                    return Err(LoadError::Malformed(
                        "text content outside of the root element".into(),
                    ));
                }
            }
            Event::CData(data) => {
                if depth == 0 {
                    return Err(LoadError::Malformed(
                        "CDATA section outside of the root element".into(),
                    ));
                }
                std::str::from_utf8(&data).map_err(|e| LoadError::Xml {
                    position: reader.buffer_position() as u64,
                    source: e.into(),
                })?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(LoadError::Malformed("document has no root element".into()));
    }
    if depth > 0 {
        return Err(LoadError::Malformed(format!(
            "unexpected end of document, {depth} element(s) not closed"
        )));
    }

    debug!("Parsed {} call elements", records.len());
    Ok(records)
}

fn enter_element(depth: usize, seen_root: &mut bool) -> Result<(), LoadError> {
    if depth == 0 {
        if *seen_root {
            return Err(LoadError::Malformed(
                "document has more than one root element".into(),
            ));
        }
        *seen_root = true;
    }
    Ok(())
}

// Every element's attributes are decoded so broken values fail the load
fn read_element(element: &BytesStart, position: u64) -> Result<Option<CallRecord>, LoadError> {
    let is_call = element.name().as_ref() == CALL_ELEMENT;
    let mut record = CallRecord::default();
    for attr in element.attributes() {
        let attr = attr.map_err(|source| LoadError::Attribute { position, source })?;
        let value = attribute_value(&attr, position)?;
        if !is_call {
            continue;
        }
        match attr.key.as_ref() {
            b"number" => record.number = value,
            b"duration" => record.duration = value,
            b"readable_date" => record.readable_date = value,
            b"type" => record.call_type = CallType::from_code(&value),
            b"contact_name" => record.contact_name = value,
            _ => {}
        }
    }
    Ok(is_call.then_some(record))
}

fn attribute_value(attr: &Attribute, position: u64) -> Result<String, LoadError> {
    let raw = std::str::from_utf8(&attr.value).map_err(|e| LoadError::Xml {
        position,
        source: e.into(),
    })?;
    let value = unescape(&normalize_whitespace(raw))
        .map_err(|e| LoadError::Xml {
            position,
            source: e.into(),
        })?
        .into_owned();
    Ok(value)
}

/// Attribute value normalization: literal tabs and line breaks become spaces.
/// Character references such as `&#10;` are expanded afterwards and kept.
fn normalize_whitespace(raw: &str) -> Cow<'_, str> {
    if raw.contains(['\t', '\n', '\r']) {
        Cow::Owned(raw.replace("\r\n", " ").replace(['\t', '\n', '\r'], " "))
    } else {
        Cow::Borrowed(raw)
    }
}
