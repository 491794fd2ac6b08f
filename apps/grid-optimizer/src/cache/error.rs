//! Error types for cache operations.

use thiserror::Error;

/// Errors from cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Value could not be serialized or deserialized.
    #[error("Cache serialization failed: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },

    /// Payload could not be compressed or decompressed.
    #[error("Cache compression failed: {message}")]
    Compression {
        /// Error message.
        message: String,
    },
}
