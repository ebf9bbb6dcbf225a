//! Interpretation of statement engine responses.
//!
//! Responses are read leniently: missing or oddly typed fields become `None`/empty
//! rather than errors.

use serde_json::Value;

use rowcache_core::{ColumnMeta, StatementState};

/// The parts of a status response the stream loop acts on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub state: Option<StatementState>,
    pub total_rows: Option<u64>,
    pub total_chunks: Option<u64>,
}

/// An external link listed in a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalLink {
    pub chunk_index: usize,
    pub url: String,
}

/// Where the rows of a fetched chunk may be found, in the order they are tried.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSource {
    Inline(Vec<Value>),
    Link(String),
}

pub fn statement_id(response: &Value) -> Option<String> {
    response
        .get("statement_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Reads a count given either as a JSON number or as a numeric string.
pub fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// State from `status.state`, else a top-level `state`.
pub fn state(status: &Value) -> Option<StatementState> {
    status
        .get("status")
        .and_then(|s| s.get("state"))
        .and_then(Value::as_str)
        .or_else(|| status.get("state").and_then(Value::as_str))
        .map(|s| StatementState::from(s.to_string()))
}

pub fn status_snapshot(status: &Value) -> StatusSnapshot {
    let manifest = status.get("manifest");
    StatusSnapshot {
        state: state(status),
        total_rows: manifest
            .and_then(|m| m.get("total_row_count"))
            .and_then(as_count),
        total_chunks: manifest
            .and_then(|m| m.get("total_chunk_count"))
            .and_then(as_count),
    }
}

/// Column names and metadata from `manifest.schema`, else `result.schema`,
/// ordered by declared position. Empty when no schema is present.
pub fn schema(status: &Value) -> (Vec<String>, Vec<ColumnMeta>) {
    let schema = status
        .get("manifest")
        .and_then(|m| m.get("schema"))
        .filter(|s| s.is_object())
        .or_else(|| status.get("result").and_then(|r| r.get("schema")));

    let Some(columns) = schema
        .and_then(|s| s.get("columns"))
        .and_then(Value::as_array)
    else {
        return (Vec::new(), Vec::new());
    };

    let mut metas: Vec<ColumnMeta> = columns
        .iter()
        .filter(|c| c.is_object())
        .map(|column| {
            serde_json::from_value(column.clone()).unwrap_or_else(|_| ColumnMeta {
                name: column.get("name").and_then(Value::as_str).map(str::to_string),
                position: column.get("position").and_then(as_count).unwrap_or(0) as i64,
                ..ColumnMeta::default()
            })
        })
        .collect();
    metas.sort_by_key(|c| c.position);

    let names = metas.iter().filter_map(|c| c.name.clone()).collect();
    (names, metas)
}

/// Entries of `result.external_links` carrying a non-blank `external_link`.
///
/// A link without `chunk_index` takes its list position.
pub fn external_links(status: &Value) -> Vec<ExternalLink> {
    let Some(links) = status
        .get("result")
        .and_then(|r| r.get("external_links"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    links
        .iter()
        .enumerate()
        .filter_map(|(position, link)| {
            let url = link.get("external_link").and_then(Value::as_str)?.trim();
            if url.is_empty() {
                return None;
            }
            let chunk_index = link
                .get("chunk_index")
                .and_then(as_count)
                .map_or(position, |i| i as usize);
            Some(ExternalLink {
                chunk_index,
                url: url.to_string(),
            })
        })
        .collect()
}

/// Row sources of a chunk-fetch response in priority order:
/// `chunk.rows`, `chunk.data_array`, `chunk.external_link`, `data_array`, `rows`,
/// `external_link`, then each `external_links[].external_link`.
pub fn chunk_sources(response: &Value) -> Vec<ChunkSource> {
    fn inline(node: Option<&Value>, field: &str, out: &mut Vec<ChunkSource>) {
        if let Some(items) = node.and_then(|n| n.get(field)).and_then(Value::as_array) {
            if !items.is_empty() {
                out.push(ChunkSource::Inline(items.clone()));
            }
        }
    }
    fn link(node: Option<&Value>, out: &mut Vec<ChunkSource>) {
        if let Some(url) = node
            .and_then(|n| n.get("external_link"))
            .and_then(Value::as_str)
            .filter(|u| !u.trim().is_empty())
        {
            out.push(ChunkSource::Link(url.trim().to_string()));
        }
    }

    let mut sources = Vec::new();
    let chunk = response.get("chunk").filter(|c| c.is_object());
    let top = Some(response);

    inline(chunk, "rows", &mut sources);
    inline(chunk, "data_array", &mut sources);
    link(chunk, &mut sources);
    inline(top, "data_array", &mut sources);
    inline(top, "rows", &mut sources);
    link(top, &mut sources);
    if let Some(links) = response.get("external_links").and_then(Value::as_array) {
        for entry in links {
            link(Some(entry), &mut sources);
        }
    }
    sources
}
