//! Dataset output formats.
//!
//! Writers render a reconciled [`Dataset`](crate::export::Dataset) through
//! the [`DatasetFormat`] trait. Each format can render in memory with
//! `export_to_bytes` or write below an output directory with `export`.
//!
//! ## Supported Formats
//!
//! - **CSV**: results table plus the excluded-objects audit table
//! - **ImageJ ROI**: one ZIP archive of freehand `.roi` outlines per image
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cellcurate::format::{ExportOptions, FormatRegistry};
//!
//! let registry = FormatRegistry::new();
//! let format = registry.get("csv").unwrap();
//! let result = format.export(&dataset, out_dir, &ExportOptions::from_config(&config.export))?;
//! ```

mod error;
pub mod formats;
mod registry;
mod traits;

pub use error::FormatError;
pub use formats::{RoiArchiveFormat, TableFormat};
pub use registry::FormatRegistry;
pub use traits::{DatasetFormat, ExportOptions, ExportResult, FormatWarning, RenderedFile, WarningSeverity};
