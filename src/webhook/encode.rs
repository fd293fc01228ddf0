//! Body encoders for the supported request formats.

use serde_json::{Map, Value};

use super::RequestFormat;
use crate::template::{json_encode, stringify};

/// Root element of XML bodies.
pub const XML_ROOT: &str = "root";

/// Element name used for list positions and numeric keys.
pub const XML_ITEM: &str = "item";

/// An encoded request body with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    /// Media type matching the encoding.
    pub content_type: &'static str,
    /// Encoded text.
    pub text: String,
}

/// Encodes `payload` in the given format.
#[must_use]
pub fn encode(format: RequestFormat, payload: &Value) -> EncodedBody {
    match format {
        RequestFormat::Json => EncodedBody {
            content_type: "application/json",
            text: json_encode(payload),
        },
        RequestFormat::Xml => EncodedBody {
            content_type: "application/xml",
            text: encode_xml(payload),
        },
        RequestFormat::Form => EncodedBody {
            content_type: "application/x-www-form-urlencoded",
            text: encode_form(payload),
        },
    }
}

/// Form-encodes a payload tree using bracket keys for nesting.
///
/// `{"a": {"b": "v"}, "l": ["x", "y"]}` becomes `a%5Bb%5D=v&l%5B0%5D=x&l%5B1%5D=y`.
/// Nulls and empty containers produce no pair.
#[must_use]
pub fn encode_form(payload: &Value) -> String {
    let mut pairs = Vec::new();
    match payload {
        Value::Object(map) => {
            for (key, value) in map {
                flatten(key.clone(), value, &mut pairs);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten(index.to_string(), value, &mut pairs);
            }
        }
        Value::Null => {}
        scalar => pairs.push((String::new(), stringify(scalar))),
    }

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

fn flatten(prefix: String, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, child) in map {
                flatten(format!("{prefix}[{key}]"), child, pairs);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(format!("{prefix}[{index}]"), child, pairs);
            }
        }
        scalar => pairs.push((prefix, stringify(scalar))),
    }
}

/// Encodes a payload tree as an XML document under a `<root>` element.
///
/// List positions and numeric keys become `<item>` elements, scalars become
/// escaped text.
#[must_use]
pub fn encode_xml(payload: &Value) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, XML_ROOT, payload);
    out
}

fn write_element(out: &mut String, name: &str, value: &Value) {
    out.push('<');
    out.push_str(name);
    out.push('>');
    match value {
        Value::Object(map) => write_children(out, map),
        Value::Array(items) => {
            for item in items {
                write_element(out, XML_ITEM, item);
            }
        }
        scalar => out.push_str(&escape_text(&stringify(scalar))),
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn write_children(out: &mut String, map: &Map<String, Value>) {
    for (key, child) in map {
        write_element(out, &element_name(key), child);
    }
}

/// Maps a payload key to a valid XML element name.
fn element_name(key: &str) -> String {
    if key.is_empty() || key.chars().all(|c| c.is_ascii_digit()) {
        return XML_ITEM.to_string();
    }

    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !name.starts_with(|c: char| c.is_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}
