//! Error types for JP2 metadata operations
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Error types for JP2 metadata operations
#[derive(Debug, Error)]
pub enum MetaError {
    /// The data source could not be opened for reading
    #[error("Data source open failed: {0}")]
    DataSourceOpenFailed(String),

    /// The stream does not start with the expected image signature
    #[error("Not an image of type {0}")]
    NotAnImage(&'static str),

    /// A length or structural invariant check failed
    #[error("Corrupted metadata")]
    CorruptedMetadata,

    /// The reader returned an I/O error in the middle of a box
    #[error("Failed to read image data")]
    FailedToReadImageData,

    /// A short read where a full read was required
    #[error("Input data read failed")]
    InputDataReadFailed,

    /// The sink refused bytes
    #[error("Image write failed")]
    ImageWriteFailed,

    /// A setting that this image format does not support
    #[error("Setting not supported by {0} images")]
    InvalidSettingForImage(&'static str),

    /// Writing would require the 64-bit extended box length form
    #[error("Image or box too large to encode")]
    ImageTooLarge,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for JP2 metadata operations
pub type MetaResult<T> = Result<T, MetaError>;
