//! Placeholder templating over event data.
//!
//! Mapping and header values may embed `{{ path }}` placeholders that are
//! resolved against a context tree (see [`EventContext::to_tree`]). Mapping
//! keys use bracket notation (`a[b][c]`) to address nested payload fields.
//!
//! Resolution is best effort: a placeholder whose path cannot be resolved
//! becomes an empty string. Nothing in this module returns an error.
//!
//! [`EventContext::to_tree`]: crate::context::EventContext::to_tree

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Matches every `{{ path }}` occurrence inside a value.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^}]*?)\s*\}\}").expect("valid placeholder regex"));

/// Matches a value that is nothing but a single placeholder.
static SOLE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\{\{\s*([^}]*?)\s*\}\}\s*$").expect("valid placeholder regex"));

/// Matches `%field%` markers left behind by other form plugins.
static FOREIGN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*%[^%\s]+%\s*$").expect("valid marker regex"));

/// One `{key, value}` row of a header list or body mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Header name, or bracket-notation payload path.
    pub key: String,
    /// Literal text, optionally containing placeholders.
    #[serde(default)]
    pub value: String,
}

impl Row {
    /// Creates a row from a key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Replaces every placeholder in `value` with the string form of the value it
/// resolves to, or with nothing when the path does not resolve.
///
/// ```
/// use formhook::template::resolve_placeholders;
/// use serde_json::json;
///
/// let context = json!({ "data": { "name": "Ada" } });
/// assert_eq!(resolve_placeholders("Hi {{ data.name }}!", &context), "Hi Ada!");
/// assert_eq!(resolve_placeholders("Hello {{missing}}!", &context), "Hello !");
/// ```
#[must_use]
pub fn resolve_placeholders(value: &str, context: &Value) -> String {
    PLACEHOLDER
        .replace_all(value, |caps: &Captures<'_>| {
            get_by_path(context, &caps[1]).map_or_else(String::new, stringify)
        })
        .into_owned()
}

/// Walks `context` along a dotted path.
///
/// Segments are trimmed and empty segments are ignored. When a map lacks the
/// exact segment, the checkbox spelling is tried as well (`tags` and `tags[]`
/// address the same field). Lists are indexed by decimal position.
#[must_use]
pub fn get_by_path<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .try_fold(context, |node, segment| match node {
            Value::Object(map) => lookup_field(map, segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn lookup_field<'a>(map: &'a Map<String, Value>, segment: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(segment) {
        return Some(value);
    }

    let alternate = segment
        .strip_suffix("[]")
        .map_or_else(|| format!("{segment}[]"), ToString::to_string);
    map.get(&alternate)
}

/// Builds a nested payload from mapping rows.
///
/// A value consisting of a single placeholder keeps the resolved value's
/// shape, so multi-select fields stay lists. Values such as `%email%` are
/// treated as empty.
///
/// ```
/// use formhook::template::{Row, build_payload};
/// use serde_json::json;
///
/// let context = json!({ "data": { "x": "v" } });
/// let payload = build_payload(&[Row::new("a[b]", "{{data.x}}")], &context);
/// assert_eq!(payload, json!({ "a": { "b": "v" } }));
/// ```
#[must_use]
pub fn build_payload(mapping: &[Row], context: &Value) -> Value {
    let mut root = Map::new();

    for row in mapping {
        let path = split_key(&row.key);
        if path.is_empty() {
            continue;
        }
        insert_path(&mut root, &path, resolve_mapping_value(&row.value, context));
    }

    Value::Object(root)
}

/// Sets `value` at `path`, creating intermediate maps. A scalar sitting where
/// a map is needed is replaced.
fn insert_path(node: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [leaf] => {
            node.insert((*leaf).to_string(), value);
        }
        [head, rest @ ..] => {
            let child = node
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            } else {
                let mut map = Map::new();
                insert_path(&mut map, rest, value);
                *child = Value::Object(map);
            }
        }
    }
}

fn resolve_mapping_value(value: &str, context: &Value) -> Value {
    if let Some(caps) = SOLE_PLACEHOLDER.captures(value) {
        return get_by_path(context, &caps[1])
            .cloned()
            .unwrap_or_else(|| Value::String(String::new()));
    }
    if FOREIGN_MARKER.is_match(value) {
        return Value::String(String::new());
    }
    Value::String(resolve_placeholders(value, context))
}

/// Splits `a[b][c]` into `["a", "b", "c"]`, dropping empty segments.
fn split_key(key: &str) -> Vec<&str> {
    key.split(['[', ']'])
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Resolves header rows into a flat name/value map.
///
/// Names are trimmed and lower-cased; values are always strings because
/// headers cannot carry structured data. Later rows win over earlier ones.
#[must_use]
pub fn resolve_flat_pairs(rows: &[Row], context: &Value) -> BTreeMap<String, String> {
    rows.iter()
        .filter_map(|row| {
            let name = row.key.trim().to_lowercase();
            (!name.is_empty()).then(|| (name, resolve_placeholders(&row.value, context)))
        })
        .collect()
}

/// Serializes a value as compact JSON.
///
/// `serde_json` never escapes `/` or non-ASCII characters, so URLs and
/// localized text stay readable in outbound bodies.
#[must_use]
pub fn json_encode(data: &Value) -> String {
    data.to_string()
}

/// String form of a resolved value as it appears inside a larger string.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => json_encode(value),
    }
}
