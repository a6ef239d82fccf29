//! Export reconciliation and unit conversion.
//!
//! The reconciler walks live registries and produces a deduplicated,
//! unit-converted [`Dataset`]: included rows, an audit set of excluded rows
//! and outline polygons per image. Pixel measurements are converted exactly
//! once, when a record is built.

mod outline;
mod reconcile;
mod record;
mod units;

pub use outline::trace_outlines;
pub use reconcile::{Dataset, Reconciler, exported_labels, reconcile};
pub use record::{ExportRecord, ImageOutlines, OutlineEntry, Polygon, image_stem, output_identifier};
pub use units::{CalibratedProperties, PixelRate, calibrate};
