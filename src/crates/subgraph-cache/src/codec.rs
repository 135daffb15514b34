//! Gzip + JSON blob codec

use crate::error::{CacheError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

/// Compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// Stored without compression (still gzip framed)
    None,
    /// Level 1
    Fast,
    /// Level 6
    #[default]
    Default,
    /// Level 9
    Best,
}

impl CompressionLevel {
    fn to_flate2(self) -> Compression {
        match self {
            CompressionLevel::None => Compression::none(),
            CompressionLevel::Fast => Compression::fast(),
            CompressionLevel::Default => Compression::default(),
            CompressionLevel::Best => Compression::best(),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(CompressionLevel::None),
            "fast" => Ok(CompressionLevel::Fast),
            "default" => Ok(CompressionLevel::Default),
            "best" | "maximum" => Ok(CompressionLevel::Best),
            other => Err(format!("unknown compression level '{}'", other)),
        }
    }
}

/// Serializes values to JSON and gzips the bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobCodec {
    level: CompressionLevel,
}

impl BlobCodec {
    pub fn new(level: CompressionLevel) -> Self {
        Self { level }
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(value)?;

        let mut encoder = GzEncoder::new(Vec::new(), self.level.to_flate2());
        encoder
            .write_all(&json)
            .map_err(|e| CacheError::Compression(format!("gzip encode failed: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Compression(format!("gzip finish failed: {}", e)))
    }

    pub fn decode<T: DeserializeOwned>(&self, blob: &[u8]) -> Result<T> {
        let mut decoder = GzDecoder::new(blob);
        let mut json = Vec::new();
        decoder
            .read_to_end(&mut json)
            .map_err(|e| CacheError::Compression(format!("gzip decode failed: {}", e)))?;

        Ok(serde_json::from_slice(&json)?)
    }
}
