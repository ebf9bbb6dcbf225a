//! Decoding of downloaded and inline row payloads.

use flate2::read::GzDecoder;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::io::Read;

use rowcache_core::{CellValue, Row};

use crate::error::{UpstreamError, UpstreamResult};

const PREFIX_PREVIEW: usize = 40;

/// Decodes a downloaded body into rows.
///
/// Gzip bodies are inflated first. The body must be a JSON array, either of arrays or of
/// objects; objects become rows ordered by the keys in the order they were first seen.
pub fn decode_payload(payload: &[u8]) -> UpstreamResult<Vec<Row>> {
    let inflated;
    let payload = if payload.len() >= 2 && payload[0] == 0x1f && payload[1] == 0x8b {
        let mut buf = Vec::new();
        GzDecoder::new(payload)
            .read_to_end(&mut buf)
            .map_err(|e| UpstreamError::UnexpectedPayload(format!("gzip: {e}")))?;
        inflated = buf;
        inflated.as_slice()
    } else {
        payload
    };

    let text = std::str::from_utf8(payload).map_err(|e| UpstreamError::UnexpectedPayload(format!("utf-8: {e}")))?;
    let body = text.trim();
    if !body.starts_with('[') {
        let preview: String = body.chars().take(PREFIX_PREVIEW).collect();
        return Err(UpstreamError::UnexpectedPayload(preview));
    }

    if let Ok(rows) = serde_json::from_str::<Vec<Row>>(body) {
        return Ok(rows);
    }
    let objects: Vec<OrderedObject> =
        serde_json::from_str(body).map_err(|e| UpstreamError::UnexpectedPayload(e.to_string()))?;
    Ok(objects_to_rows(objects))
}

/// Converts inline `data_array` items into rows.
pub fn decode_inline(items: Vec<Value>) -> UpstreamResult<Vec<Row>> {
    serde_json::from_value(Value::Array(items)).map_err(|e| UpstreamError::UnexpectedPayload(e.to_string()))
}

/// A JSON object with its fields in document order.
struct OrderedObject(Vec<(String, CellValue)>);

impl<'de> Deserialize<'de> for OrderedObject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = OrderedObject;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, CellValue>()? {
                    fields.push((key, value));
                }
                Ok(OrderedObject(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

fn objects_to_rows(objects: Vec<OrderedObject>) -> Vec<Row> {
    let mut keys: Vec<String> = Vec::new();
    for object in &objects {
        for (key, _) in &object.0 {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
    }

    objects
        .into_iter()
        .map(|object| {
            let mut fields = object.0;
            keys.iter()
                .map(|key| {
                    fields
                        .iter()
                        .position(|(k, _)| k == key)
                        .map_or(CellValue::Null, |i| fields.swap_remove(i).1)
                })
                .collect()
        })
        .collect()
}
