//! Error types for dataset writers.

use thiserror::Error;

/// Errors that can occur while writing a dataset.
#[derive(Error, Debug)]
pub enum FormatError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive could not be built
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid output structure or content
    #[error("Invalid format: {message}")]
    InvalidFormat {
        /// Description of the format error
        message: String,
    },

    /// A coordinate does not fit the 16-bit fields of the output format
    #[error("Coordinate {value} of '{entry}' does not fit in 16 bits")]
    CoordinateOverflow {
        /// Entry the coordinate belongs to
        entry: String,
        /// The offending value
        value: i64,
    },
}

impl FormatError {
    /// Create an invalid format error with a message.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}
