//! Data models for regions and their identity.

mod label;
mod mask;
mod region;

pub use label::{LabelId, ParseLabelError, Provenance, RegionKey};
pub use mask::Mask;
pub use region::Region;

/// Per-pixel brightness image, indexed `(row, col)`.
pub type IntensityImage = ndarray::Array2<f32>;

/// Integer label grid produced by a segmenter. 0 is background.
pub type LabelGrid = ndarray::Array2<u32>;
