//! View signatures: a short digest of (statement, sort request, filter request).

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex characters kept from the digest.
pub const SIGNATURE_LEN: usize = 32;

/// Rebuilds `value` with every object's keys in sorted order.
pub fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonical_value(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        other => other.clone(),
    }
}

/// Canonical text of a sort/filter payload.
///
/// Blank or JSON `null` input yields `""`; unparseable input yields its trimmed text.
pub fn canonicalize(payload: Option<&str>) -> String {
    let Some(text) = payload.map(str::trim).filter(|t| !t.is_empty()) else {
        return String::new();
    };

    match serde_json::from_str::<Value>(text) {
        Ok(Value::Null) => String::new(),
        Ok(value) => canonical_value(&value).to_string(),
        Err(_) => text.to_string(),
    }
}

pub fn compute_signature(statement_id: &str, sort_json: Option<&str>, filter_json: Option<&str>) -> String {
    let material = format!(
        "{}|{}|{}",
        statement_id,
        canonicalize(sort_json),
        canonicalize(filter_json)
    );

    let digest = Sha256::digest(material.as_bytes());
    let mut hex = format!("{:x}", digest);
    hex.truncate(SIGNATURE_LEN);
    hex
}
