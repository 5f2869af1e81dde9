//! Owned XML tree for document parts.
//!
//! Package parts are small enough to hold fully in memory, so the engine
//! works on an owned element tree instead of streaming events. Elements keep
//! their qualified names and attribute order exactly as parsed; lookups match
//! on local names so the tree is independent of the prefix a producer chose.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::dom::errors::DomError;

/// A node in a parsed XML part: either a child element or a text span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with its qualified name, attributes, and children.
///
/// Fields are public: callers mutate the tree in place and serialize the
/// result back out. Attribute order is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute append.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    /// Set an attribute, replacing an existing one with the same name.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_string(), value));
        }
    }

    /// Look up an attribute by its local name (prefix ignored).
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| local_part(k) == local)
            .map(|(_, v)| v.as_str())
    }

    /// The element's name with any namespace prefix stripped.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Whether this element's local name equals `local`.
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn push(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Append text, merging with a trailing text node if present.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(existing)) = self.children.last_mut() {
            existing.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Concatenation of the direct text children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlNode::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First direct child element with the given local name.
    pub fn find_child(&self, local: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.is(local))
    }

    pub fn find_child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|el| el.is(local))
    }

    /// Depth-first pre-order traversal of this element and everything below it.
    pub fn descendants(&self) -> impl Iterator<Item = &XmlElement> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            for child in next.children.iter().rev() {
                if let XmlNode::Element(el) = child {
                    stack.push(el);
                }
            }
            Some(next)
        })
    }
}

fn local_part(name: &str) -> &str {
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Parse an XML document into an owned element tree.
///
/// The XML declaration, comments, and processing instructions are dropped;
/// entity and character references are resolved into the text they denote.
pub fn parse(xml: &str) -> Result<XmlElement, DomError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|source| DomError::MalformedXml {
            part: None,
            message: source.to_string(),
        })?;
        match event {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| DomError::MalformedXml {
                    part: None,
                    message: "closing tag without matching opening tag".to_string(),
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let unescaped = text.xml_content().map_err(|source| DomError::MalformedXml {
                    part: None,
                    message: source.to_string(),
                })?;
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(&unescaped);
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(&data).into_owned();
                    parent.push_text(&raw);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(parent) = stack.last_mut() {
                    let name = String::from_utf8_lossy(&reference).into_owned();
                    parent.push_text(&resolve_reference(&name));
                }
            }
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(DomError::MalformedXml {
            part: None,
            message: "unexpected end of input inside an open element".to_string(),
        });
    }

    root.ok_or_else(|| DomError::MalformedXml {
        part: None,
        message: "document has no root element".to_string(),
    })
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, DomError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|source| DomError::MalformedXml {
            part: None,
            message: source.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| DomError::MalformedXml {
                part: None,
                message: source.to_string(),
            })?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(XmlElement {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), DomError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DomError::MalformedXml {
            part: None,
            message: "document has more than one root element".to_string(),
        }),
    }
}

/// Resolve a general entity reference ('&' and ';' already stripped).
/// Unknown entity names are kept in their literal spelled-out form.
fn resolve_reference(name: &str) -> String {
    match name {
        "amp" => "&".to_string(),
        "lt" => "<".to_string(),
        "gt" => ">".to_string(),
        "quot" => "\"".to_string(),
        "apos" => "'".to_string(),
        _ => {
            if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                if let Some(ch) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                    return ch.to_string();
                }
            } else if let Some(dec) = name.strip_prefix('#') {
                if let Some(ch) = dec.parse::<u32>().ok().and_then(char::from_u32) {
                    return ch.to_string();
                }
            }
            format!("&{name};")
        }
    }
}

/// Serialize a tree back to bytes with an XML declaration.
///
/// Childless elements use the self-closing form; text and attribute values
/// are escaped on the way out.
pub fn serialize(root: &XmlElement) -> Result<Vec<u8>, DomError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(serialize_error)?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), DomError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(serialize_error)?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(serialize_error)?;
    for child in &element.children {
        match child {
            XmlNode::Element(el) => write_element(writer, el)?,
            XmlNode::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(serialize_error)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(serialize_error)?;
    Ok(())
}

fn serialize_error(source: impl std::fmt::Display) -> DomError {
    DomError::Serialize {
        message: source.to_string(),
    }
}
