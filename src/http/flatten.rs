//! Dotted-path flattening for the text renderer.
//!
//! `{"a": {"b": 1}, "c": [true]}` becomes `a.b → 1`, `c.0 → true`. Keys come
//! back in a `BTreeMap`, so iteration is lexicographic and stable.

use std::collections::BTreeMap;

use serde_json::Value;

pub fn flatten(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, String::new(), value);
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: String, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(out, join(&prefix, key), child);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(out, join(&prefix, &index.to_string()), child);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s.clone());
        }
        Value::Null => {
            out.insert(prefix, String::new());
        }
        scalar => {
            out.insert(prefix, scalar.to_string());
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
