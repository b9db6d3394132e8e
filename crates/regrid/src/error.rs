//! Error types for regridding.

use mosaic_grid::GridError;
use thiserror::Error;

/// Errors that can occur while building weights or interpolating.
#[derive(Error, Debug)]
pub enum RegridError {
    /// Invalid configuration or unsupported grid combination.
    #[error("configuration error: {0}")]
    Config(String),

    /// A field buffer is inconsistent with the grid or the method.
    #[error("field error: {0}")]
    Field(String),

    /// A bilinear target node could not be located in any source tile.
    #[error("no enclosing source cell for target node (i={i}, j={j}, lon={lon:.6}, lat={lat:.6})")]
    Unresolved { i: usize, j: usize, lon: f64, lat: f64 },

    /// A cached weight file does not match the requested grids.
    #[error("remap cache mismatch in {path}: {reason}")]
    CacheMismatch { path: String, reason: String },

    /// A cached weight file is malformed or corrupted.
    #[error("remap file format error: {0}")]
    Format(String),

    /// Grid model error.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Header (de)serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl RegridError {
    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Field error.
    pub fn field(msg: impl Into<String>) -> Self {
        Self::Field(msg.into())
    }

    /// Create a Format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create a CacheMismatch error.
    pub fn cache_mismatch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;
