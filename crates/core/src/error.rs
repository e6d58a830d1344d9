//! Error types for kharif
//!
//! Statistical gaps (empty years, degenerate VHI ranges, unmatched joins)
//! never surface here: they are absorbed as invalid cells. Every variant
//! below aborts the run.

use thiserror::Error;

/// Main error type for kharif operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Grid mismatch in {context}: {detail}")]
    GridMismatch { context: String, detail: String },

    #[error("Missing band '{band}' in {context}")]
    MissingBand { band: String, context: String },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for kharif operations
pub type Result<T> = std::result::Result<T, Error>;
