//! Final clean-up pass over a generated document.
//!
//! Walks the whole tree and makes it safe for strict OpenAPI tooling:
//!
//! - `type` values outside [`ALLOWED_TYPES`] are coerced or removed
//! - `anyOf` loses its null-typed members and disappears once empty
//! - nulls are dropped from maps and sequences
//! - missing-value sentinels (`<marshmallow.missing>`, `missing`, `undefined`) are dropped
//!
//! Keys directly under a `properties` map are field names, not keywords, so a property
//! called `type` is left alone.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Type names accepted in the output
pub const ALLOWED_TYPES: [&str; 6] = ["array", "boolean", "integer", "number", "object", "string"];

const COMPOSITION_KEYS: [&str; 4] = ["$ref", "allOf", "anyOf", "oneOf"];

static SENTINEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:<[^<>]*\b(?:missing|undefined)\b[^<>]*>|missing|undefined)$")
        .expect("valid regex")
});

/// Sanitize a whole document
pub fn sanitize(value: Value) -> Value {
    sanitize_value(value, false).unwrap_or(Value::Null)
}

/// Whether a string is a missing-value sentinel
pub fn is_missing_sentinel(s: &str) -> bool {
    SENTINEL.is_match(s.trim())
}

/// Returns `None` when the value should be dropped from its parent
fn sanitize_value(value: Value, is_properties: bool) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if is_missing_sentinel(&s) => None,
        Value::Array(items) => Some(Value::Array(
            items
                .into_iter()
                .filter_map(|item| sanitize_value(item, false))
                .collect(),
        )),
        Value::Object(map) => Some(Value::Object(sanitize_map(map, is_properties))),
        other => Some(other),
    }
}

fn sanitize_map(map: Map<String, Value>, is_properties: bool) -> Map<String, Value> {
    let mut node = Map::with_capacity(map.len());
    for (key, value) in map {
        let child_is_properties = !is_properties && key == "properties";
        if let Some(value) = sanitize_value(value, child_is_properties) {
            node.insert(key, value);
        }
    }

    if !is_properties {
        fix_type(&mut node);
        filter_any_of(&mut node);
    }
    node
}

fn fix_type(node: &mut Map<String, Value>) {
    let Some(type_value) = node.get("type") else {
        return;
    };

    let replacement = match type_value {
        Value::String(s) if s == "None" || s == "null" => None,
        Value::String(s) if ALLOWED_TYPES.contains(&s.as_str()) => return,
        Value::String(_) => {
            if COMPOSITION_KEYS.iter().any(|k| node.contains_key(*k)) {
                None
            } else {
                Some("object")
            }
        }
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_f64() => Some("number"),
        Value::Number(_) => Some("integer"),
        _ => None,
    };

    match replacement {
        Some(t) => {
            node.insert("type".to_string(), Value::from(t));
        }
        None => {
            node.remove("type");
        }
    }
}

fn filter_any_of(node: &mut Map<String, Value>) {
    let Some(Value::Array(members)) = node.get_mut("anyOf") else {
        return;
    };

    // Null-typed members are already bare objects once `fix_type` has run on them
    members.retain(|member| matches!(member, Value::Object(m) if !m.is_empty()));

    if members.is_empty() {
        node.remove("anyOf");
    }
}
