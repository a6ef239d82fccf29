//! Unit tests for dataset writers.
//!
//! Writers are exercised through `export_to_bytes`; files on disk are
//! checked only where the stale-file handling matters.


use crate::config::ExportConfig;
use crate::export::{Dataset, Reconciler};
use crate::model::Mask;
use crate::registry::Registry;

/// Two segmented squares and one drawn square; region 2 is toggled off.
fn sample_registry() -> Registry {
    let mut registry = Registry::new("plate_A1.tif", (40, 40), None);
    registry
        .insert_segmented(1, Mask::with_rect(40, 40, 2, 2, 6, 6), None)
        .unwrap();
    registry
        .insert_segmented(2, Mask::with_rect(40, 40, 2, 20, 6, 6), None)
        .unwrap();
    registry
        .add_drawn(Mask::with_rect(40, 40, 20, 20, 10, 10))
        .unwrap();
    registry
        .toggle(&crate::model::LabelId::Integer(2))
        .unwrap();
    registry
}

fn sample_dataset(config: &ExportConfig) -> Dataset {
    let registry = sample_registry();
    Reconciler::new(config).unwrap().reconcile([&registry])
}
