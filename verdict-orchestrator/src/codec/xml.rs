//! Pull reader shared by the XML codecs
//!
//! Wraps `quick_xml` so codecs see owned, unescaped elements keyed by local
//! name, and so truncated documents surface as errors instead of a quiet EOF.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use verdict_core::domain::result::ResultFormat;

use super::CodecError;

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Start tag with content to follow
    Open(Element),
    /// Self-closing tag
    Leaf(Element),
    Close(String),
    Text(String),
    Eof,
}

pub struct XmlReader<'a> {
    reader: Reader<&'a [u8]>,
    format: ResultFormat,
    depth: usize,
    seen_root: bool,
}

impl<'a> XmlReader<'a> {
    pub fn new(format: ResultFormat, content: &'a str) -> Self {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            format,
            depth: 0,
            seen_root: false,
        }
    }

    pub fn next(&mut self) -> Result<Node, CodecError> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| self.malformed(e.to_string()))?;

            match event {
                Event::Start(start) => {
                    self.depth += 1;
                    self.seen_root = true;
                    return self.element(&start).map(Node::Open);
                }
                Event::Empty(start) => {
                    self.seen_root = true;
                    return self.element(&start).map(Node::Leaf);
                }
                Event::End(end) => {
                    self.depth = self.depth.saturating_sub(1);
                    let name = String::from_utf8_lossy(end.local_name().as_ref()).into_owned();
                    return Ok(Node::Close(name));
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| self.malformed(e.to_string()))?;
                    if !text.trim().is_empty() {
                        return Ok(Node::Text(text.into_owned()));
                    }
                }
                Event::CData(data) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if !text.trim().is_empty() {
                        return Ok(Node::Text(text));
                    }
                }
                Event::Eof => {
                    if !self.seen_root {
                        return Err(self.malformed("document has no root element"));
                    }
                    if self.depth > 0 {
                        return Err(self.malformed("unexpected end of document"));
                    }
                    return Ok(Node::Eof);
                }
                _ => {}
            }
        }
    }

    fn element(&self, start: &BytesStart<'_>) -> Result<Element, CodecError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.malformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| self.malformed(e.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Element { name, attrs })
    }

    pub fn malformed(&self, reason: impl std::fmt::Display) -> CodecError {
        CodecError::Malformed {
            format: self.format,
            reason: format!("{} (at byte {})", reason, self.reader.buffer_position()),
        }
    }
}

/// Local name of the document element, if the content is XML at all.
pub fn root_element(content: &str) -> Option<String> {
    let mut reader = Reader::from_str(content);
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) | Ok(Event::Empty(start)) => {
                return Some(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Converts a seconds attribute such as `"1.25"` or `"1,204.5"` to milliseconds.
pub fn seconds_to_ms(value: Option<&str>) -> i64 {
    value
        .map(|v| v.trim().replace(',', ""))
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(|secs| (secs * 1000.0).round() as i64)
        .unwrap_or(0)
}

/// Converts a .NET timespan (`[d.]hh:mm:ss[.fffffff]`) to milliseconds.
pub fn timespan_to_ms(value: Option<&str>) -> i64 {
    let Some(value) = value.map(str::trim) else {
        return 0;
    };

    let parts: Vec<&str> = value.split(':').collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return 0;
    };

    let (days, hours) = match hours.split_once('.') {
        Some((days, hours)) => (days.parse::<f64>().ok(), hours.parse::<f64>().ok()),
        None => (Some(0.0), hours.parse::<f64>().ok()),
    };

    match (days, hours, minutes.parse::<f64>().ok(), seconds.parse::<f64>().ok()) {
        (Some(d), Some(h), Some(m), Some(s)) => {
            let total = ((d * 24.0 + h) * 60.0 + m) * 60.0 + s;
            (total * 1000.0).round() as i64
        }
        _ => 0,
    }
}
