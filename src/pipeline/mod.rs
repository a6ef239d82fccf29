//! Segmentation pipeline handoff.
//!
//! The producer turns raw images into complete per-image region batches on a
//! background thread; the session commits each batch into a fresh registry.

mod loader;
mod postprocess;
mod producer;
mod segmenter;

pub use loader::{MaskDirectory, load_intensity, load_label_npy, load_label_png};
pub use postprocess::{PostProcessor, SegmentedRegion};
pub use producer::{BatchProducer, ImageBatch, PipelineEvent, process_image};
pub use segmenter::{CancelToken, PrecomputedSegmenter, Segmenter, SourceImage};

use thiserror::Error;

/// Errors raised while producing image batches.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The segmenter could not produce a label grid
    #[error("Segmentation failed: {0}")]
    Segmentation(String),

    /// An input file could not be read or decoded
    #[error("Failed to load '{name}': {message}")]
    Load { name: String, message: String },

    /// The pipeline settings are unusable
    #[error("Invalid pipeline configuration: {0}")]
    Config(String),

    /// Cancellation was requested
    #[error("Processing cancelled")]
    Cancelled,

    /// A channel does not match the label grid
    #[error("Dimension mismatch for '{image}': expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        image: String,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl PipelineError {
    pub fn load(name: impl Into<String>, message: impl ToString) -> Self {
        Self::Load {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
