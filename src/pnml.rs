//! PNML export of discovered Petri nets, readable by ProM and pm4py.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::discovery::{Flow, ProcessModel, Transition};

const NET_TYPE: &str = "http://www.pnml.org/version-2009/grammar/pnmlcoremodel";
const INVISIBLE: &str = "$invisible$";

#[derive(Error, Debug)]
pub enum PnmlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed PNML: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, PnmlError>;

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Start(BytesStart::new("text")))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new("text")))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new(name).with_attributes(attrs.iter().copied()),
    ))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Places, transitions (silent ones tagged invisible), arcs and both markings.
pub fn write_pnml<W: Write>(model: &ProcessModel, name: &str, out: W) -> Result<()> {
    let mut writer = Writer::new_with_indent(out, b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    start(&mut writer, "pnml", &[])?;
    start(&mut writer, "net", &[("id", "net1"), ("type", NET_TYPE)])?;
    text_element(&mut writer, "name", name)?;
    start(&mut writer, "page", &[("id", "n0")])?;

    let initial = model.initial_places();
    for place in &model.places {
        start(&mut writer, "place", &[("id", place.as_str())])?;
        text_element(&mut writer, "name", place)?;
        if initial.contains(&place.as_str()) {
            text_element(&mut writer, "initialMarking", "1")?;
        }
        end(&mut writer, "place")?;
    }

    for transition in &model.transitions {
        start(&mut writer, "transition", &[("id", transition.name.as_str())])?;
        match &transition.label {
            Some(label) => text_element(&mut writer, "name", label)?,
            None => {
                text_element(&mut writer, "name", &transition.name)?;
                writer.write_event(Event::Empty(BytesStart::new("toolspecific").with_attributes([
                    ("tool", "ProM"),
                    ("version", "6.4"),
                    ("activity", INVISIBLE),
                    ("localNodeID", transition.name.as_str()),
                ])))?;
            }
        }
        end(&mut writer, "transition")?;
    }

    for (index, arc) in model.arcs.iter().enumerate() {
        let id = format!("arc{index}");
        writer.write_event(Event::Empty(BytesStart::new("arc").with_attributes([
            ("id", id.as_str()),
            ("source", arc.source.as_str()),
            ("target", arc.target.as_str()),
        ])))?;
    }
    end(&mut writer, "page")?;

    start(&mut writer, "finalmarkings", &[])?;
    start(&mut writer, "marking", &[])?;
    for place in model.final_places() {
        start(&mut writer, "place", &[("idref", place)])?;
        start(&mut writer, "text", &[])?;
        writer.write_event(Event::Text(BytesText::new("1")))?;
        end(&mut writer, "text")?;
        end(&mut writer, "place")?;
    }
    end(&mut writer, "marking")?;
    end(&mut writer, "finalmarkings")?;

    end(&mut writer, "net")?;
    end(&mut writer, "pnml")?;
    writer.get_mut().write_all(b"\n")?;
    Ok(())
}

pub fn write_pnml_file(model: &ProcessModel, name: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_pnml(model, name, &mut out)?;
    out.flush()?;
    tracing::info!(
        path = %path.display(),
        places = model.places.len(),
        transitions = model.transitions.len(),
        arcs = model.arcs.len(),
        "PNML written"
    );
    Ok(())
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| PnmlError::Malformed(e.to_string()))?;
        if attr.key.as_ref() == key {
            let value = attr
                .unescape_value()
                .map_err(|e| PnmlError::Malformed(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required(element: &BytesStart<'_>, key: &[u8]) -> Result<String> {
    attribute(element, key)?.ok_or_else(|| {
        PnmlError::Malformed(format!(
            "<{}> without {}",
            String::from_utf8_lossy(element.name().as_ref()),
            String::from_utf8_lossy(key)
        ))
    })
}

enum Node {
    Place(String),
    Transition(Transition),
}

/// Reads a net written by [`write_pnml`] back into a model with explicit markings.
pub fn parse_pnml(text: &str) -> Result<ProcessModel> {
    let mut reader = Reader::from_str(text);
    let mut model = ProcessModel::default();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut node: Option<Node> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                match name.as_slice() {
                    b"place" if path.last().map(Vec::as_slice) == Some(&b"marking"[..]) => {
                        model.final_marking.push(required(&e, b"idref")?);
                    }
                    b"place" => node = Some(Node::Place(required(&e, b"id")?)),
                    b"transition" => {
                        node = Some(Node::Transition(Transition {
                            name: required(&e, b"id")?,
                            label: None,
                        }))
                    }
                    b"initialMarking" => {
                        if let Some(Node::Place(place)) = &node {
                            model.initial_marking.push(place.clone());
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"arc" => model.arcs.push(Flow {
                    source: required(&e, b"source")?,
                    target: required(&e, b"target")?,
                }),
                b"toolspecific" => {
                    if let Some(Node::Transition(transition)) = &mut node {
                        if attribute(&e, b"activity")?.as_deref() == Some(INVISIBLE) {
                            transition.label = None;
                        }
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                let in_name = path.len() >= 2 && path[path.len() - 2] == b"name";
                if let (true, Some(Node::Transition(transition))) = (in_name, &mut node) {
                    let label = t.unescape().map_err(|e| PnmlError::Malformed(e.to_string()))?;
                    transition.label = Some(label.into_owned());
                }
            }
            Event::End(e) => {
                path.pop();
                match e.name().as_ref() {
                    b"place" => {
                        if let Some(Node::Place(place)) = node.take() {
                            model.places.push(place);
                        }
                    }
                    b"transition" => {
                        if let Some(Node::Transition(transition)) = node.take() {
                            model.transitions.push(transition);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(model)
}

pub fn read_pnml(path: &Path) -> Result<ProcessModel> {
    parse_pnml(&fs::read_to_string(path)?)
}
