//! XES serialization, parsing and the header compatibility patch.
//!
//! Logs are written with the IEEE 1849-2016 header. Stricter consumers (ProM)
//! reject that version string and the `nested-attributes` feature, so every
//! exported file is rewritten to `xes.version="1.0"` and `xes.features=""`.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use regex::Regex;
use thiserror::Error;

use crate::event_log::{EventLog, Trace, TraceEvent, ACTIVITY_KEY, TIMESTAMP_KEY};

pub const COMPAT_VERSION: &str = "1.0";
/// Naive wall-clock time; no offset is written.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

const EXTENSIONS: [(&str, &str, &str); 2] = [
    ("Concept", "concept", "http://www.xes-standard.org/concept.xesext"),
    ("Time", "time", "http://www.xes-standard.org/time.xesext"),
];

#[derive(Error, Debug)]
pub enum XesError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XES: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, XesError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XesHeader {
    pub version: String,
    pub features: Option<String>,
}

impl XesHeader {
    pub fn ieee() -> Self {
        Self {
            version: "1849-2016".to_string(),
            features: Some("nested-attributes".to_string()),
        }
    }

    pub fn compatible() -> Self {
        Self {
            version: COMPAT_VERSION.to_string(),
            features: Some(String::new()),
        }
    }
}

fn empty_element<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    writer.write_event(Event::Empty(
        BytesStart::new(name).with_attributes(attrs.iter().copied()),
    ))?;
    Ok(())
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
}

/// Serializes `log`; case id and activity are always string attributes.
pub fn write_log<W: Write>(log: &EventLog, header: &XesHeader, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut root = BytesStart::new("log");
    root.push_attribute(("xes.version", header.version.as_str()));
    if let Some(features) = &header.features {
        root.push_attribute(("xes.features", features.as_str()));
    }
    root.push_attribute(("openxes.version", "1.0RC7"));
    writer.write_event(Event::Start(root))?;

    for (name, prefix, uri) in EXTENSIONS {
        empty_element(&mut writer, "extension", &[("name", name), ("prefix", prefix), ("uri", uri)])?;
    }

    writer.write_event(Event::Start(
        BytesStart::new("global").with_attributes([("scope", "trace")]),
    ))?;
    empty_element(&mut writer, "string", &[("key", ACTIVITY_KEY), ("value", "__INVALID__")])?;
    writer.write_event(Event::End(BytesEnd::new("global")))?;

    writer.write_event(Event::Start(
        BytesStart::new("global").with_attributes([("scope", "event")]),
    ))?;
    empty_element(&mut writer, "string", &[("key", ACTIVITY_KEY), ("value", "__INVALID__")])?;
    empty_element(
        &mut writer,
        "date",
        &[("key", TIMESTAMP_KEY), ("value", "1970-01-01T00:00:00.000")],
    )?;
    writer.write_event(Event::End(BytesEnd::new("global")))?;

    empty_element(&mut writer, "classifier", &[("name", "Activity"), ("keys", ACTIVITY_KEY)])?;

    for trace in &log.traces {
        writer.write_event(Event::Start(BytesStart::new("trace")))?;
        empty_element(&mut writer, "string", &[("key", ACTIVITY_KEY), ("value", trace.case_id.as_str())])?;
        for event in &trace.events {
            writer.write_event(Event::Start(BytesStart::new("event")))?;
            empty_element(&mut writer, "string", &[("key", ACTIVITY_KEY), ("value", event.activity.as_str())])?;
            let ts = format_timestamp(event.timestamp);
            empty_element(&mut writer, "date", &[("key", TIMESTAMP_KEY), ("value", ts.as_str())])?;
            writer.write_event(Event::End(BytesEnd::new("event")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("trace")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("log")))?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

pub fn write_log_file(log: &EventLog, header: &XesHeader, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_log(log, header, &mut out)?;
    out.flush()?;
    Ok(())
}

fn is_attribute_tag(name: &[u8]) -> bool {
    matches!(
        name,
        b"string" | b"date" | b"int" | b"float" | b"boolean" | b"id" | b"list" | b"container" | b"values"
    )
}

fn key_value(element: &BytesStart<'_>) -> Result<(Option<String>, Option<String>)> {
    let mut key = None;
    let mut value = None;
    for attr in element.attributes() {
        let attr = attr.map_err(|e| XesError::Malformed(e.to_string()))?;
        let text = attr
            .unescape_value()
            .map_err(|e| XesError::Malformed(e.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"key" => key = Some(text),
            b"value" => value = Some(text),
            _ => {}
        }
    }
    Ok((key, value))
}

#[derive(Default)]
struct PartialEvent {
    activity: Option<String>,
    timestamp: Option<NaiveDateTime>,
}

/// Parses a serialized log back into traces, keeping file order.
pub fn parse_log(text: &str) -> Result<EventLog> {
    let mut reader = Reader::from_str(text);
    let mut traces: Vec<Trace> = Vec::new();
    let mut trace: Option<(Option<String>, Vec<TraceEvent>)> = None;
    let mut event: Option<PartialEvent> = None;
    let mut in_global = false;
    let mut nested = 0usize;

    loop {
        let (element, is_start) = match reader.read_event()? {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::End(e) => {
                match e.name().as_ref() {
                    b"global" => in_global = false,
                    b"event" => {
                        let partial = event.take().unwrap_or_default();
                        let (Some(activity), Some(timestamp)) = (partial.activity, partial.timestamp)
                        else {
                            return Err(XesError::Malformed(
                                "event without concept:name or time:timestamp".to_string(),
                            ));
                        };
                        if let Some((_, events)) = trace.as_mut() {
                            events.push(TraceEvent { activity, timestamp });
                        }
                    }
                    b"trace" => {
                        if let Some((case_id, events)) = trace.take() {
                            let case_id = case_id.ok_or_else(|| {
                                XesError::Malformed("trace without concept:name".to_string())
                            })?;
                            traces.push(Trace { case_id, events });
                        }
                    }
                    name if is_attribute_tag(name) => nested = nested.saturating_sub(1),
                    _ => {}
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        match element.name().as_ref() {
            b"global" if is_start => in_global = true,
            b"trace" if is_start => trace = Some((None, Vec::new())),
            b"event" if is_start => event = Some(PartialEvent::default()),
            name if is_attribute_tag(name) => {
                if !in_global && nested == 0 {
                    let (key, value) = key_value(&element)?;
                    match (key.as_deref(), value) {
                        (Some(ACTIVITY_KEY), Some(value)) => {
                            if let Some(partial) = event.as_mut() {
                                partial.activity = Some(value);
                            } else if let Some((case_id, _)) = trace.as_mut() {
                                *case_id = Some(value);
                            }
                        }
                        (Some(TIMESTAMP_KEY), Some(value)) => {
                            if let Some(partial) = event.as_mut() {
                                partial.timestamp = Some(parse_timestamp(&value).ok_or_else(|| {
                                    XesError::Malformed(format!("invalid timestamp '{value}'"))
                                })?);
                            }
                        }
                        _ => {}
                    }
                }
                if is_start {
                    nested += 1;
                }
            }
            _ => {}
        }
    }

    Ok(EventLog { traces })
}

pub fn read_log(path: &Path) -> Result<EventLog> {
    parse_log(&fs::read_to_string(path)?)
}

/// Header fields of the first `<log>` element.
pub fn read_header(text: &str) -> Result<XesHeader> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"log" => {
                let mut version = None;
                let mut features = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(|e| XesError::Malformed(e.to_string()))?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| XesError::Malformed(e.to_string()))?
                        .into_owned();
                    match attr.key.as_ref() {
                        b"xes.version" => version = Some(value),
                        b"xes.features" => features = Some(value),
                        _ => {}
                    }
                }
                return Ok(XesHeader {
                    version: version.unwrap_or_default(),
                    features,
                });
            }
            Event::Eof => return Err(XesError::Malformed("no <log> element".to_string())),
            _ => {}
        }
    }
}

fn patched_root(element: &BytesStart<'_>) -> Result<BytesStart<'static>> {
    let mut root = BytesStart::new("log");
    let mut seen_version = false;
    let mut seen_features = false;

    for attr in element.attributes() {
        let attr = attr.map_err(|e| XesError::Malformed(e.to_string()))?;
        match attr.key.as_ref() {
            b"xes.version" => {
                root.push_attribute(("xes.version", COMPAT_VERSION));
                seen_version = true;
            }
            b"xes.features" => {
                root.push_attribute(("xes.features", ""));
                seen_features = true;
            }
            _ => {
                let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                let value = attr
                    .unescape_value()
                    .map_err(|e| XesError::Malformed(e.to_string()))?
                    .into_owned();
                root.push_attribute((key.as_str(), value.as_str()));
            }
        }
    }
    if !seen_version {
        root.push_attribute(("xes.version", COMPAT_VERSION));
    }
    if !seen_features {
        root.push_attribute(("xes.features", ""));
    }
    Ok(root)
}

/// Structural rewrite: parse the document, replace the `<log>` header
/// attributes and re-serialize everything else unchanged.
pub fn rewrite_header(text: &str) -> Result<String> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Vec::new());
    let mut patched = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) if !patched && e.name().as_ref() == b"log" => {
                writer.write_event(Event::Start(patched_root(&e)?))?;
                patched = true;
            }
            Event::Empty(e) if !patched && e.name().as_ref() == b"log" => {
                writer.write_event(Event::Empty(patched_root(&e)?))?;
                patched = true;
            }
            other => writer.write_event(other)?,
        }
    }

    if !patched {
        return Err(XesError::Malformed("no <log> element".to_string()));
    }
    String::from_utf8(writer.into_inner()).map_err(|e| XesError::Malformed(e.to_string()))
}

static VERSION_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"xes\.version="[^"]*""#).expect("version pattern is valid"));
static FEATURES_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"xes\.features="[^"]*""#).expect("features pattern is valid"));

/// Text-level fallback when the document cannot be re-parsed.
pub fn patch_header_text(text: &str) -> String {
    let patched = VERSION_ATTR.replace_all(text, format!(r#"xes.version="{COMPAT_VERSION}""#).as_str());
    if FEATURES_ATTR.is_match(&patched) {
        FEATURES_ATTR
            .replace_all(&patched, r#"xes.features="""#)
            .into_owned()
    } else if patched.contains("<log ") {
        patched.replacen("<log ", r#"<log xes.features="" "#, 1)
    } else {
        patched.replacen("<log>", r#"<log xes.features="">"#, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPatch {
    AlreadyCompatible,
    Structural,
    Text,
    Failed,
}

/// Best-effort header patch of a file on disk; failures are logged only.
pub fn ensure_compatible_header(path: &Path) -> HeaderPatch {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read XES for header patch");
            return HeaderPatch::Failed;
        }
    };

    if read_header(&text).is_ok_and(|header| header == XesHeader::compatible()) {
        tracing::debug!(path = %path.display(), "XES header already compatible");
        return HeaderPatch::AlreadyCompatible;
    }

    let (patched, mode) = match rewrite_header(&text) {
        Ok(patched) => (patched, HeaderPatch::Structural),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "structural header rewrite failed, falling back to text patch"
            );
            (patch_header_text(&text), HeaderPatch::Text)
        }
    };

    match fs::write(path, patched) {
        Ok(()) => {
            tracing::info!(path = %path.display(), ?mode, "XES header patched for strict parsers");
            mode
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not write patched XES header");
            HeaderPatch::Failed
        }
    }
}

/// Writes the log and applies the compatibility patch.
pub fn export_xes(log: &EventLog, path: &Path) -> Result<HeaderPatch> {
    write_log_file(log, &XesHeader::ieee(), path)?;
    let patch = ensure_compatible_header(path);
    tracing::info!(
        path = %path.display(),
        events = log.event_count(),
        cases = log.case_count(),
        "XES written"
    );
    Ok(patch)
}
