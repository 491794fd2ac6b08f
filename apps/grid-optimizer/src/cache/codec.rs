//! Payload compression codec.
//!
//! Operates on already-serialized bytes. Placement decisions stay in
//! [`super::policy`]; the codec only decides whether a payload destined for a
//! tier gets gzip-compressed.

use std::fmt::Debug;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use super::entry::CacheTier;
use super::error::CacheError;

/// Encoded payload ready for storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Stored bytes.
    pub bytes: Vec<u8>,
    /// Whether `bytes` is gzip data.
    pub compressed: bool,
    /// Size before compression.
    pub original_size: usize,
}

/// Codec between serialized bytes and stored bytes.
pub trait PayloadCodec: Send + Sync + Debug {
    /// Encode `raw` for storage in `tier`.
    fn encode(&self, raw: Vec<u8>, tier: CacheTier) -> Result<EncodedPayload, CacheError>;

    /// Decode stored bytes back to serialized bytes.
    fn decode(&self, stored: &[u8], compressed: bool) -> Result<Vec<u8>, CacheError>;
}

/// Gzip codec applied to non-hot tiers above a size threshold.
#[derive(Debug, Clone, Copy)]
pub struct GzipCodec {
    enabled: bool,
    threshold_bytes: usize,
    level: u32,
}

impl GzipCodec {
    /// Create a codec.
    #[must_use]
    pub fn new(enabled: bool, threshold_bytes: usize, level: u32) -> Self {
        Self {
            enabled,
            threshold_bytes,
            level: level.min(9),
        }
    }

    /// Codec that never compresses.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            enabled: false,
            threshold_bytes: usize::MAX,
            level: 0,
        }
    }

    fn should_compress(&self, size: usize, tier: CacheTier) -> bool {
        self.enabled && tier != CacheTier::Hot && size > self.threshold_bytes
    }
}

impl PayloadCodec for GzipCodec {
    fn encode(&self, raw: Vec<u8>, tier: CacheTier) -> Result<EncodedPayload, CacheError> {
        let original_size = raw.len();
        if !self.should_compress(original_size, tier) {
            return Ok(EncodedPayload {
                bytes: raw,
                compressed: false,
                original_size,
            });
        }

        let mut encoder = GzEncoder::new(
            Vec::with_capacity(original_size / 4),
            Compression::new(self.level),
        );
        encoder
            .write_all(&raw)
            .map_err(|e| CacheError::Compression {
                message: e.to_string(),
            })?;
        let bytes = encoder.finish().map_err(|e| CacheError::Compression {
            message: e.to_string(),
        })?;

        Ok(EncodedPayload {
            bytes,
            compressed: true,
            original_size,
        })
    }

    fn decode(&self, stored: &[u8], compressed: bool) -> Result<Vec<u8>, CacheError> {
        if !compressed {
            return Ok(stored.to_vec());
        }
        let mut decoder = GzDecoder::new(stored);
        let mut out = Vec::with_capacity(stored.len() * 4);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| CacheError::Compression {
                message: e.to_string(),
            })?;
        Ok(out)
    }
}
