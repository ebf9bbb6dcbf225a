//! Gzip compression for cached row chunks

use bytes::Bytes;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use rowcache_core::{CoreError, CoreResult};

/// Gzip stream magic bytes.
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression configuration
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// Compression level (0-9, default: 6)
    pub level: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl CompressionConfig {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    fn compression_level(&self) -> Compression {
        match self.level {
            0 => Compression::none(),
            1 => Compression::fast(),
            9 => Compression::best(),
            n => Compression::new(n),
        }
    }
}

/// True when `data` starts with the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[..2] == GZIP_MAGIC
}

/// Compress bytes with gzip
pub fn compress(data: &[u8], config: CompressionConfig) -> CoreResult<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), config.compression_level());
    encoder
        .write_all(data)
        .map_err(|e| CoreError::SerializationError(format!("Gzip compression failed: {}", e)))?;

    let compressed = encoder
        .finish()
        .map_err(|e| CoreError::SerializationError(format!("Gzip finish failed: {}", e)))?;

    Ok(Bytes::from(compressed))
}

/// Decompress gzip bytes
pub fn decompress(data: &[u8]) -> CoreResult<Bytes> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();

    decoder.read_to_end(&mut decompressed).map_err(|e| {
        CoreError::DeserializationError(format!("Gzip decompression failed: {}", e))
    })?;

    Ok(Bytes::from(decompressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_compress_decompress() {
        let data = br#"[["Acme Inc",150,null],["Globex",250,"2024-01-05"]]"#;
        let compressed = compress(data, CompressionConfig::default()).unwrap();

        assert!(is_gzip(&compressed));
        assert_eq!(decompress(&compressed).unwrap().as_ref(), data);
    }

    #[test]
    fn test_gzip_repetitive_data() {
        let data = "[\"row\",1],".repeat(2_000);
        let compressed = compress(data.as_bytes(), CompressionConfig::new(9)).unwrap();

        assert!(compressed.len() * 10 < data.len());
    }

    #[test]
    fn test_plain_json_is_not_gzip() {
        assert!(!is_gzip(b"[[1,2]]"));
        assert!(!is_gzip(b""));
        assert!(decompress(b"[[1,2]]").is_err());
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(CompressionConfig::new(42).level, 9);
    }
}
