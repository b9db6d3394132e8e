//! Error types for mosaic grids.

use thiserror::Error;

/// Errors raised while building or querying a mosaic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    /// A coordinate or value array does not match the declared tile shape.
    #[error("shape mismatch for {what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// A tile is unusable (zero size, non-finite coordinates, ...).
    #[error("invalid tile '{tile}': {reason}")]
    InvalidTile { tile: String, reason: String },

    /// A tile index is out of range for the mosaic.
    #[error("tile index {index} out of range for mosaic with {count} tiles")]
    TileOutOfRange { index: usize, count: usize },

    /// A decomposition request cannot be satisfied.
    #[error("invalid decomposition: {0}")]
    Decomposition(String),
}

impl GridError {
    /// Create a ShapeMismatch error.
    pub fn shape_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    /// Create an InvalidTile error.
    pub fn invalid_tile(tile: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTile {
            tile: tile.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for mosaic grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
