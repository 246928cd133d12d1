//! Error types for eustress-world-layers
//!
//! Only setup and IO paths are fallible. Per-frame reads, writes and
//! spatial queries degrade to `None` / default values instead.
//!
//! ## Table of Contents
//! 1. WorldLayersError - Main error enum
//! 2. Result type alias

use std::path::PathBuf;

use thiserror::Error;

use crate::config::LayerMutability;

/// Result type alias for world layer operations
pub type Result<T> = std::result::Result<T, WorldLayersError>;

/// Errors that can occur while configuring, loading or exporting layers
#[derive(Error, Debug)]
pub enum WorldLayersError {
    /// File I/O error
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `layers.toml` parse error
    #[error("Failed to parse {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Layer configuration rejected at registration
    #[error("Invalid layer '{name}': {reason}")]
    InvalidLayer { name: String, reason: String },

    /// No layer registered under this name
    #[error("Layer '{0}' is not registered")]
    UnknownLayer(String),

    /// Raw buffer does not match `width * height * bytes_per_pixel`
    #[error("Raw buffer size mismatch: expected {expected} bytes, got {actual}")]
    RawBufferSize { expected: usize, actual: usize },

    /// Bulk write refused by the layer's mutability setting
    #[error("Layer '{name}' does not accept writes ({mutability:?})")]
    WriteRejected {
        name: String,
        mutability: LayerMutability,
    },

    /// Image decode/encode error
    #[cfg(feature = "image-io")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
