//! Dataset format implementations.

mod roi;
mod table;

#[cfg(test)]
mod tests;

pub use roi::{RoiArchiveFormat, encode_archive, encode_roi};
pub use table::TableFormat;
