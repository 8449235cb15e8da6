//! Custom error types for pixelmark.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the pixelmark library.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load an image file.
    #[error("failed to load image from {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Failed to save an image file.
    #[error("failed to save image to {path}: {source}")]
    ImageSave {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    /// Invalid configuration value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Watermark algorithm identifier not recognised.
    #[error("unknown watermark algorithm: {0}")]
    UnknownAlgorithm(String),

    /// The converter's input directory does not exist.
    #[error("input directory '{}' does not exist", path.display())]
    MissingInputDir { path: PathBuf },

    /// Filesystem operation on a specific path failed.
    #[error("IO error on {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an IO error with the path it happened on.
    pub(crate) fn file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for pixelmark operations.
pub type Result<T> = std::result::Result<T, Error>;
