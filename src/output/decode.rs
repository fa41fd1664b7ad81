//! Gzip → UTF-8 → JSON decoding of report documents

use flate2::read::MultiGzDecoder;
use std::io::Read;

use crate::{ParsedArtifact, RawArtifact};

/// Decoding failures, by stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Not a valid gzip stream
    #[error("gzip decompression failed: {0}")]
    Gzip(String),

    /// Decompressed bytes are not UTF-8
    #[error("document is not valid UTF-8: {0}")]
    Utf8(String),

    /// Text is not a JSON document
    #[error("document is not valid JSON: {0}")]
    Json(String),
}

/// Decompress a gzip payload
///
/// Concatenated gzip members are read as one stream.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| DecodeError::Gzip(e.to_string()))?;
    Ok(decompressed)
}

/// Decode a gzip-compressed JSON report document
pub fn decode_gzip_json(raw: &RawArtifact) -> Result<ParsedArtifact, DecodeError> {
    let decompressed = gunzip(raw.bytes())?;
    let text = String::from_utf8(decompressed).map_err(|e| DecodeError::Utf8(e.to_string()))?;
    let value = serde_json::from_str(&text).map_err(|e| DecodeError::Json(e.to_string()))?;
    Ok(ParsedArtifact::new(value))
}
