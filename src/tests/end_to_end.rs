//! Full curation runs from label grid to written outputs.

use std::sync::Arc;

use ndarray::Array2;

use super::row_of_squares;
use crate::config::CurationConfig;
use crate::curation::{DisplaySize, Effect, Intent, StrokeAction};
use crate::export::{Reconciler, exported_labels};
use crate::format::{DatasetFormat, ExportOptions, RoiArchiveFormat, TableFormat};
use crate::measure::RegionProperties;
use crate::model::{LabelId, LabelGrid};
use crate::pipeline::{BatchProducer, PrecomputedSegmenter, SourceImage};
use crate::session::Session;

fn label(n: u32) -> LabelId {
    LabelId::Integer(n)
}

fn three_region_grid() -> LabelGrid {
    let mut grid = Array2::zeros((30, 60));
    for (i, left) in [5usize, 25, 45].into_iter().enumerate() {
        for r in 10..18 {
            for c in left..left + 8 {
                grid[(r, c)] = (i + 1) as u32 * 10;
            }
        }
    }
    grid
}

#[test]
fn test_connect_export_disconnect_export() {
    let mut registry = row_of_squares("X", 3);
    let config = CurationConfig::default();
    let reconciler = Reconciler::new(&config.export).unwrap();

    registry.toggle(&label(2)).unwrap();
    registry.toggle(&label(2)).unwrap();
    registry.connect(&[label(1), label(2)], true).unwrap();

    let dataset = reconciler.reconcile([&registry]);
    let merged = LabelId::merged(&[label(1), label(2)]);
    let labels = exported_labels(&dataset, "X");
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&&merged));
    assert!(labels.contains(&&label(3)));

    registry.disconnect(&merged).unwrap();
    let dataset = reconciler.reconcile([&registry]);
    assert_eq!(exported_labels(&dataset, "X"), vec![&label(1), &label(2), &label(3)]);
    for n in 1..=3 {
        assert!(registry.region(&label(n)).unwrap().active);
    }
}

#[test]
fn test_inactive_member_state_survives_merge() {
    let mut registry = row_of_squares("X", 3);
    registry.toggle(&label(1)).unwrap();
    registry.connect(&[label(1), label(2)], false).unwrap();
    registry
        .disconnect(&LabelId::merged(&[label(1), label(2)]))
        .unwrap();

    assert!(!registry.region(&label(1)).unwrap().active);
    assert!(registry.region(&label(2)).unwrap().active);

    let config = CurationConfig::default();
    let dataset = Reconciler::new(&config.export).unwrap().reconcile([&registry]);
    assert_eq!(exported_labels(&dataset, "X"), vec![&label(2), &label(3)]);
    assert_eq!(dataset.excluded.len(), 1);
    assert_eq!(dataset.excluded[0].label, label(1));
}

#[test]
fn test_unit_conversion_at_export() {
    let mut registry = row_of_squares("X", 1);
    let mut config = CurationConfig::default();
    config.export.pixel_rate = 0.18;

    let props = RegionProperties {
        area: 100.0,
        perimeter: 40.0,
        ..RegionProperties::default()
    };
    registry
        .insert_segmented(1, crate::model::Mask::with_rect(40, 16, 4, 4, 10, 10), Some(props))
        .unwrap();

    let dataset = Reconciler::new(&config.export).unwrap().reconcile([&registry]);
    let exported = dataset.records[0].properties.values();
    assert!((exported.area - 3.24).abs() < 1e-9);
    assert!((exported.perimeter - 7.2).abs() < 1e-9);
    // Stored properties stay in pixels.
    assert_eq!(registry.region(&label(1)).unwrap().area(), 100.0);
}

#[test]
fn test_pipeline_to_outputs() {
    let segmenter = PrecomputedSegmenter::new().with("well_B2.tif", three_region_grid());
    let intensity = Array2::from_elem((30, 60), 0.5f32);
    let images = vec![SourceImage::new("well_B2.tif").with_intensity(intensity)];

    let mut config = CurationConfig::default();
    config.export.condition = "treated".to_string();
    config.export.replicate = "2".to_string();

    let mut session = Session::new(&config);
    let producer = BatchProducer::spawn(images, Arc::new(segmenter), &config).unwrap();
    let summary = session.ingest(&producer);
    assert_eq!(summary.committed, vec!["well_B2.tif".to_string()]);
    assert!(!summary.cancelled);

    // Labels are dense after post-processing.
    let registry = session.registry("well_B2.tif").unwrap();
    assert_eq!(registry.region_count(), 3);
    assert!(registry.region(&label(3)).is_some());

    let effect = session
        .apply(Intent::Stroke {
            image: "well_B2.tif".to_string(),
            path: vec![(8.0, 12.0), (28.0, 12.0)],
            display_size: DisplaySize::new(60.0, 30.0),
            action: StrokeAction::Connect,
        })
        .unwrap();
    assert!(matches!(effect, Effect::Connected { .. }));

    let effect = session
        .apply(Intent::Toggle {
            image: "well_B2.tif".to_string(),
            label: label(3),
        })
        .unwrap();
    assert_eq!(
        effect,
        Effect::Toggled {
            label: label(3),
            active: false,
        }
    );

    let dataset = session.export().unwrap();
    assert_eq!(dataset.records.len(), 1);
    assert_eq!(dataset.excluded.len(), 1);
    assert!(dataset.has_intensity());

    let options = ExportOptions::from_config(&config.export);
    let tables = TableFormat.export_to_bytes(&dataset, &options).unwrap();
    let results = String::from_utf8(tables[0].contents.clone()).unwrap();
    let mut lines = results.lines();
    assert!(lines.next().unwrap().contains("mean_intensity,max_intensity,min_intensity,Condition"));
    let row = lines.next().unwrap();
    assert!(row.starts_with("well_B2.tif,\"(1,2)\","));
    assert!(row.ends_with(",0.5,0.5,0.5,treated,2,\"well_B2_label_(1,2)_merged.roi\""));

    let archives = RoiArchiveFormat.export_to_bytes(&dataset, &options).unwrap();
    assert_eq!(archives.len(), 1);
    assert!(archives[0].path.ends_with("well_B2.zip"));
}

#[test]
fn test_cancelled_producer_commits_nothing_partial() {
    let segmenter = PrecomputedSegmenter::new().with("a", three_region_grid());
    let config = CurationConfig::default();
    let producer = BatchProducer::spawn(vec![SourceImage::new("a")], Arc::new(segmenter), &config).unwrap();
    producer.cancel();

    let mut session = Session::new(&config);
    let summary = session.ingest(&producer);
    // Either the whole image arrived before the cancel or nothing did.
    match session.registry("a") {
        Some(registry) => assert_eq!(registry.region_count(), 3),
        None => assert!(summary.committed.is_empty()),
    }
}
