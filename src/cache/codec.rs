//! Payload codec: serialization plus size-gated zstd compression.
//!
//! Every cached value is serialized to JSON; payloads above the compression
//! threshold are additionally zstd-compressed. The compressed flag travels
//! with the stored entry so the read path knows which way to decode.
//! Compression has fixed CPU overhead, so small payloads skip it.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::config::CodecConfig;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zstd compression failed: {0}")]
    Zstd(#[from] std::io::Error),
}

/// Serialization + compression engine for cache payloads.
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// Serialize a value, compressing when the serialized form exceeds the
    /// threshold. Returns the payload bytes and whether they are compressed.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<(Vec<u8>, bool), CodecError> {
        let raw = serde_json::to_vec(value)?;
        if raw.len() > self.config.compression_threshold_bytes {
            let compressed = zstd::encode_all(raw.as_slice(), self.config.zstd_level)?;
            Ok((compressed, true))
        } else {
            Ok((raw, false))
        }
    }

    /// Inverse of [`encode`](Self::encode). `decode(encode(v)) == v` holds
    /// for every serializable value on both code paths.
    pub fn decode<T: DeserializeOwned>(
        &self,
        payload: &[u8],
        compressed: bool,
    ) -> Result<T, CodecError> {
        if compressed {
            let raw = zstd::decode_all(payload)?;
            Ok(serde_json::from_slice(&raw)?)
        } else {
            Ok(serde_json::from_slice(payload)?)
        }
    }
}
