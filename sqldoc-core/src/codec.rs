//! Payload codecs turning typed values into stored text and back.
//!
//! Each dialect stores documents in one text representation: JSON for PostgreSQL and for
//! generic SQL Server columns, XML for SQL Server `XML` columns. A codec must be total and
//! deterministic for every value a session stores, and `decode(encode(v)) == v` must hold.
//!
//! [`Encoding`] is the closed set of representations; it dispatches to [`JsonCodec`] and
//! [`XmlCodec`], which both implement [`Codec`].

use std::{fmt, io};

use quick_xml::{
    Reader, Writer,
    escape::resolve_xml_entity,
    events::{BytesRef, BytesStart, BytesText, Event},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Encode/decode contract every payload representation honors.
pub trait Codec {
    /// Encodes `value` into its stored text form.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the value cannot be represented.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> DocumentStoreResult<String>;

    /// Reconstructs a typed value from its stored text form.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Serialization`] if the text does not describe a `T`.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> DocumentStoreResult<T>;
}

/// JSON text via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> DocumentStoreResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> DocumentStoreResult<T> {
        Ok(serde_json::from_str(text)?)
    }
}

/// XML fragments via `quick-xml`, rooted at a `<document>` element.
///
/// Values go through the `serde_json` data model, and every element records the kind of
/// value it holds unless it is text or a non-empty object:
///
/// ```text
/// <document>
///   <name>Ernesto</name>
///   <age type="number">31</age>
///   <nickname type="null"/>
///   <favourite_things type="array"><item>Postgresql</item></favourite_things>
///   <address><city>Lisbon</city></address>
///   <settings type="object"></settings>
///   <field key="not a name">value</field>
/// </document>
/// ```
///
/// Object keys that are not XML names are written as `field` elements carrying the key in an
/// attribute. Fields keep their declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCodec;

impl XmlCodec {
    /// Root element wrapping every encoded document.
    pub const ROOT: &'static str = "document";
}

const TYPE: &str = "type";
const KEY: &str = "key";
const FIELD: &str = "field";
const ITEM: &str = "item";

impl Codec for XmlCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> DocumentStoreResult<String> {
        let value = serde_json::to_value(value)?;
        let mut writer = Writer::new(Vec::new());

        write_element(&mut writer, Self::ROOT, &value).map_err(xml_error)?;

        String::from_utf8(writer.into_inner()).map_err(xml_error)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> DocumentStoreResult<T> {
        Ok(serde_json::from_value(read_document(text)?)?)
    }
}

fn xml_error(err: impl fmt::Display) -> DocumentStoreError {
    DocumentStoreError::Serialization(err.to_string())
}

fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();

    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

fn write_element<W: io::Write>(writer: &mut Writer<W>, name: &str, value: &Value) -> io::Result<()> {
    let mut start = if is_element_name(name) {
        BytesStart::new(name)
    } else {
        BytesStart::new(FIELD).with_attributes([(KEY, name)])
    };

    let kind = match value {
        Value::Null => Some("null"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(_) => Some("number"),
        Value::Array(_) => Some("array"),
        Value::Object(fields) if fields.is_empty() => Some("object"),
        Value::String(_) | Value::Object(_) => None,
    };
    if let Some(kind) = kind {
        start.push_attribute((TYPE, kind));
    }

    if value.is_null() {
        return writer.write_event(Event::Empty(start));
    }

    writer.write_event(Event::Start(start.borrow()))?;

    match value {
        Value::Bool(flag) => {
            writer.write_event(Event::Text(BytesText::new(if *flag { "true" } else { "false" })))?;
        }
        Value::Number(number) => {
            writer.write_event(Event::Text(BytesText::new(&number.to_string())))?;
        }
        Value::String(text) if !text.is_empty() => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        Value::Array(items) => {
            for item in items {
                write_element(writer, ITEM, item)?;
            }
        }
        Value::Object(fields) => {
            for (key, field) in fields {
                write_element(writer, key, field)?;
            }
        }
        Value::Null | Value::String(_) => {}
    }

    writer.write_event(Event::End(start.to_end()))
}

/// An element being read: its key in the parent, declared kind, text and children.
struct Node {
    key: String,
    kind: Option<String>,
    text: String,
    children: Vec<(String, Value)>,
}

impl Node {
    fn open(start: &BytesStart<'_>) -> DocumentStoreResult<Self> {
        let mut key = std::str::from_utf8(start.local_name().as_ref())
            .map_err(xml_error)?
            .to_string();
        let mut kind = None;

        for attribute in start.attributes() {
            let attribute = attribute.map_err(xml_error)?;
            let value = attribute.unescape_value().map_err(xml_error)?;

            match attribute.key.as_ref() {
                b"type" => kind = Some(value.into_owned()),
                b"key" => key = value.into_owned(),
                _ => {}
            }
        }

        Ok(Self { key, kind, text: String::new(), children: Vec::new() })
    }

    fn close(self) -> DocumentStoreResult<(String, Value)> {
        if !self.children.is_empty() && !self.text.trim().is_empty() {
            return Err(xml_error(format!("element <{}> mixes text and elements", self.key)));
        }

        let value = match self.kind.as_deref() {
            Some("null") => Value::Null,
            Some("boolean") => match self.text.trim() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                other => return Err(xml_error(format!("<{}> is not a boolean: {other}", self.key))),
            },
            Some("number") => {
                let number = self.text.trim().parse::<Number>().map_err(|_| {
                    xml_error(format!("<{}> is not a number: {}", self.key, self.text))
                })?;
                Value::Number(number)
            }
            Some("array") => Value::Array(self.children.into_iter().map(|(_, v)| v).collect()),
            Some("object") => Value::Object(self.children.into_iter().collect::<Map<_, _>>()),
            None if self.children.is_empty() => Value::String(self.text),
            None => Value::Object(self.children.into_iter().collect::<Map<_, _>>()),
            Some(other) => {
                return Err(xml_error(format!("<{}> has unknown type {other}", self.key)));
            }
        };

        Ok((self.key, value))
    }
}

fn read_document(text: &str) -> DocumentStoreResult<Value> {
    let mut reader = Reader::from_str(text);
    let mut open: Vec<Node> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(start) => open.push(Node::open(&start)?),
            Event::Empty(start) => {
                let node = Node::open(&start)?;
                attach(&mut open, &mut root, node.close()?)?;
            }
            Event::End(_) => {
                let node = open
                    .pop()
                    .ok_or_else(|| xml_error("closing tag without an open element"))?;
                attach(&mut open, &mut root, node.close()?)?;
            }
            Event::Text(content) => {
                if let Some(node) = open.last_mut() {
                    node.text.push_str(&content.decode().map_err(xml_error)?);
                }
            }
            Event::CData(content) => {
                if let Some(node) = open.last_mut() {
                    node.text.push_str(&content.decode().map_err(xml_error)?);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(node) = open.last_mut() {
                    node.text.push_str(&resolve_reference(&reference)?);
                }
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    if let Some(node) = open.last() {
        return Err(xml_error(format!("element <{}> is never closed", node.key)));
    }

    root.ok_or_else(|| xml_error("payload has no root element"))
}

fn attach(
    open: &mut [Node],
    root: &mut Option<Value>,
    (key, value): (String, Value),
) -> DocumentStoreResult<()> {
    match open.last_mut() {
        Some(parent) => parent.children.push((key, value)),
        None if root.is_none() => *root = Some(value),
        None => return Err(xml_error("payload has more than one root element")),
    }
    Ok(())
}

fn resolve_reference(reference: &BytesRef<'_>) -> DocumentStoreResult<String> {
    if let Some(ch) = reference.resolve_char_ref().map_err(xml_error)? {
        return Ok(ch.to_string());
    }

    let name = reference.decode().map_err(xml_error)?;
    resolve_xml_entity(&name)
        .map(str::to_string)
        .ok_or_else(|| xml_error(format!("unknown entity &{name};")))
}

/// The stored representation used by a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Json,
    Xml,
}

impl Codec for Encoding {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> DocumentStoreResult<String> {
        match self {
            Encoding::Json => JsonCodec.encode(value),
            Encoding::Xml => XmlCodec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> DocumentStoreResult<T> {
        match self {
            Encoding::Json => JsonCodec.decode(text),
            Encoding::Xml => XmlCodec.decode(text),
        }
    }
}
