//! Row chunk encoding: JSON rows, then gzip.

use bytes::Bytes;

use rowcache_core::{CoreResult, Row};

use crate::compression::{compress, decompress, CompressionConfig};

pub fn encode_rows(rows: &[Row], config: CompressionConfig) -> CoreResult<Bytes> {
    let json = serde_json::to_vec(rows)?;
    compress(&json, config)
}

pub fn decode_rows(data: &[u8]) -> CoreResult<Vec<Row>> {
    let json = decompress(data)?;
    Ok(serde_json::from_slice(&json)?)
}
