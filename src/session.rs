//! The interactive curation session.
//!
//! A [`Session`] owns one [`Registry`] per committed image and is the only
//! actor that mutates them. Batches arrive whole from the pipeline; edits
//! arrive one at a time as [`Intent`]s.

use web_time::Instant;

use crate::config::CurationConfig;
use crate::curation::{DrawingRasterizer, Effect, Intent, SketchCanvas, StrokeDecision, hit_regions, interpret};
use crate::error::{CurationError, Result};
use crate::export::{Dataset, reconcile};
use crate::model::LabelId;
use crate::pipeline::{BatchProducer, ImageBatch, PipelineEvent};
use crate::registry::{ConnectOutcome, Registry};

/// What [`Session::ingest`] received from a producer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestSummary {
    pub committed: Vec<String>,
    /// `(image, reason)` for images the producer could not process
    pub skipped: Vec<(String, String)>,
    pub cancelled: bool,
}

/// Registries of every committed image plus the tools that edit them.
#[derive(Debug, Clone)]
pub struct Session {
    config: CurationConfig,
    /// In commit order
    registries: Vec<Registry>,
    rasterizer: DrawingRasterizer,
    canvas: SketchCanvas,
}

impl Session {
    pub fn new(config: &CurationConfig) -> Self {
        Self {
            config: config.clone(),
            registries: Vec::new(),
            rasterizer: DrawingRasterizer::new(&config.drawing),
            canvas: SketchCanvas::new(&config.drawing),
        }
    }

    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    /// Build a registry from a complete batch.
    ///
    /// Nothing is committed if any region is rejected. Re-committing an
    /// image replaces its registry and discards its edits.
    pub fn commit(&mut self, batch: ImageBatch) -> Result<()> {
        let ImageBatch {
            image_name,
            dims,
            intensity,
            regions,
        } = batch;

        let mut registry = Registry::new(image_name.clone(), dims, intensity);
        for region in regions {
            registry.insert_segmented(region.label, region.mask, Some(region.properties))?;
        }

        match self.registries.iter_mut().find(|r| r.image_name() == image_name) {
            Some(slot) => {
                log::info!("{}: re-committed, previous edits discarded", image_name);
                *slot = registry;
            }
            None => {
                log::info!("{}: committed {} region(s)", image_name, registry.region_count());
                self.registries.push(registry);
            }
        }
        Ok(())
    }

    /// Commit every batch a producer sends until it finishes.
    pub fn ingest(&mut self, producer: &BatchProducer) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for event in producer.events() {
            match event {
                PipelineEvent::Started { total } => {
                    log::info!("Receiving {} image(s)", total);
                }
                PipelineEvent::ImageReady(batch) => {
                    let name = batch.image_name.clone();
                    match self.commit(batch) {
                        Ok(()) => summary.committed.push(name),
                        Err(e) => {
                            log::warn!("{}: batch rejected: {}", name, e);
                            summary.skipped.push((name, e.to_string()));
                        }
                    }
                }
                PipelineEvent::ImageSkipped { name, reason } => {
                    summary.skipped.push((name, reason));
                }
                PipelineEvent::Progress { done, total } => {
                    log::debug!("Pipeline progress {}/{}", done, total);
                }
                PipelineEvent::Finished { cancelled, .. } => {
                    summary.cancelled = cancelled;
                    break;
                }
            }
        }
        summary
    }

    pub fn registry(&self, image: &str) -> Option<&Registry> {
        self.registries.iter().find(|r| r.image_name() == image)
    }

    pub fn registries(&self) -> impl Iterator<Item = &Registry> {
        self.registries.iter()
    }

    /// Apply one edit synchronously.
    ///
    /// Unknown images and regions are returned as errors after a warning;
    /// the registry is left unchanged.
    pub fn apply(&mut self, intent: Intent) -> Result<Effect> {
        let image = intent.image().to_string();
        let result = self.apply_to(intent);
        if let Err(e) = &result {
            log::warn!("{}: intent rejected: {}", image, e);
        }
        result
    }

    fn apply_to(&mut self, intent: Intent) -> Result<Effect> {
        let rasterizer = &self.rasterizer;
        let canvas = &self.canvas;
        let registry = self
            .registries
            .iter_mut()
            .find(|r| r.image_name() == intent.image())
            .ok_or_else(|| CurationError::UnknownImage(intent.image().to_string()))?;

        match intent {
            Intent::Toggle { label, .. } => {
                let target = registry.group_of(&label).map(|g| g.label()).unwrap_or(label);
                let active = registry.toggle(&target)?;
                Ok(Effect::Toggled {
                    label: target,
                    active,
                })
            }
            Intent::Stroke {
                path,
                display_size,
                action,
                ..
            } => {
                let hits = hit_regions(registry, &path, display_size);
                match interpret(registry, &hits, action) {
                    StrokeDecision::Connect(labels) => Ok(connect_effect(registry.connect(&labels, true)?)),
                    StrokeDecision::Disconnect(groups) => {
                        let mut restored = Vec::new();
                        for group in &groups {
                            restored.extend(registry.disconnect(group)?);
                        }
                        Ok(Effect::Disconnected { restored })
                    }
                    StrokeDecision::Ignore(reason) => Ok(Effect::no_op(reason)),
                }
            }
            Intent::Disconnect { label, .. } => {
                let restored = registry.disconnect(&label)?;
                if restored.is_empty() {
                    Ok(Effect::no_op(format!("{} is not grouped", label)))
                } else {
                    Ok(Effect::Disconnected { restored })
                }
            }
            Intent::Draw { sketch, .. } => {
                let masks = rasterizer.rasterize_sketch(&sketch, canvas, registry.dims())?;
                if masks.is_empty() {
                    return Ok(Effect::no_op("drawing produced no closed region"));
                }
                let labels = masks
                    .into_iter()
                    .map(|mask| registry.add_drawn(mask))
                    .collect::<Result<Vec<LabelId>>>()?;
                Ok(Effect::Drawn { labels })
            }
        }
    }

    /// Reconcile every registry, in commit order.
    pub fn export(&self) -> Result<Dataset> {
        let start = Instant::now();
        let dataset = reconcile(&self.registries, &self.config.export)?;
        log::info!(
            "Exported {} record(s) from {} image(s) in {:.2?}",
            dataset.records.len(),
            self.registries.len(),
            start.elapsed()
        );
        Ok(dataset)
    }
}

fn connect_effect(outcome: ConnectOutcome) -> Effect {
    match outcome {
        ConnectOutcome::Created { label, members } => Effect::Connected { label, members },
        ConnectOutcome::Unchanged(label) => Effect::no_op(format!("{} already connected", label)),
        ConnectOutcome::TooFew => Effect::no_op("fewer than two active regions touched"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::{DisplaySize, Sketch, StrokeAction};
    use crate::measure::measure_mask;
    use crate::model::Mask;
    use crate::pipeline::SegmentedRegion;

    fn batch(name: &str) -> ImageBatch {
        let rects = [(10, 10), (10, 40), (40, 10)];
        let regions = rects
            .iter()
            .enumerate()
            .map(|(i, &(top, left))| {
                let mask = Mask::with_rect(64, 64, top, left, 8, 8);
                SegmentedRegion {
                    label: i as u32 + 1,
                    properties: measure_mask(&mask, None).unwrap(),
                    mask,
                }
            })
            .collect();
        ImageBatch {
            image_name: name.to_string(),
            dims: (64, 64),
            intensity: None,
            regions,
        }
    }

    fn session() -> Session {
        let mut session = Session::new(&CurationConfig::default());
        session.commit(batch("X.tif")).unwrap();
        session
    }

    fn stroke(path: Vec<(f64, f64)>) -> Intent {
        Intent::Stroke {
            image: "X.tif".to_string(),
            path,
            display_size: DisplaySize::new(64.0, 64.0),
            action: StrokeAction::Auto,
        }
    }

    #[test]
    fn test_recommit_resets_registry() {
        let mut session = session();
        session
            .apply(Intent::Toggle {
                image: "X.tif".to_string(),
                label: LabelId::Integer(1),
            })
            .unwrap();
        session.commit(batch("X.tif")).unwrap();
        let registry = session.registry("X.tif").unwrap();
        assert!(registry.is_effectively_active(&LabelId::Integer(1)));
        assert_eq!(session.registries().count(), 1);
    }

    #[test]
    fn test_unknown_image() {
        let mut session = session();
        let result = session.apply(Intent::Toggle {
            image: "Y.tif".to_string(),
            label: LabelId::Integer(1),
        });
        assert_eq!(result, Err(CurationError::UnknownImage("Y.tif".to_string())));
    }

    #[test]
    fn test_unknown_region_leaves_registry() {
        let mut session = session();
        let result = session.apply(Intent::Disconnect {
            image: "X.tif".to_string(),
            label: LabelId::Integer(99),
        });
        assert!(matches!(result, Err(CurationError::UnknownRegion { .. })));
        assert_eq!(session.registry("X.tif").unwrap().group_count(), 0);
    }

    #[test]
    fn test_stroke_connects_then_disconnects() {
        let mut session = session();
        let path = vec![(12.0, 12.0), (30.0, 12.0), (42.0, 12.0)];

        let effect = session.apply(stroke(path.clone())).unwrap();
        let merged = LabelId::merged(&[LabelId::Integer(1), LabelId::Integer(2)]);
        assert_eq!(
            effect,
            Effect::Connected {
                label: merged.clone(),
                members: vec![LabelId::Integer(1), LabelId::Integer(2)],
            }
        );

        let effect = session.apply(stroke(path)).unwrap();
        assert_eq!(
            effect,
            Effect::Disconnected {
                restored: vec![LabelId::Integer(1), LabelId::Integer(2)],
            }
        );
        assert_eq!(session.registry("X.tif").unwrap().group_count(), 0);
    }

    #[test]
    fn test_toggle_member_toggles_group() {
        let mut session = session();
        session
            .apply(stroke(vec![(12.0, 12.0), (42.0, 12.0)]))
            .unwrap();
        let effect = session
            .apply(Intent::Toggle {
                image: "X.tif".to_string(),
                label: LabelId::Integer(2),
            })
            .unwrap();
        assert_eq!(
            effect,
            Effect::Toggled {
                label: LabelId::merged(&[LabelId::Integer(1), LabelId::Integer(2)]),
                active: false,
            }
        );
    }

    #[test]
    fn test_single_hit_stroke_is_noop() {
        let mut session = session();
        let effect = session.apply(stroke(vec![(12.0, 12.0), (13.0, 13.0)])).unwrap();
        assert!(matches!(effect, Effect::NoOp { .. }));
    }

    #[test]
    fn test_draw_adds_region() {
        let mut session = session();
        let sketch = Sketch::new(64, 64).pen(vec![
            (30.0, 30.0),
            (55.0, 30.0),
            (55.0, 55.0),
            (30.0, 55.0),
            (30.0, 30.0),
        ]);
        let effect = session
            .apply(Intent::Draw {
                image: "X.tif".to_string(),
                sketch,
            })
            .unwrap();
        assert_eq!(
            effect,
            Effect::Drawn {
                labels: vec![LabelId::Drawn(1)],
            }
        );
        let drawn = session
            .registry("X.tif")
            .unwrap()
            .region(&LabelId::Drawn(1))
            .unwrap();
        assert!(drawn.mask.area() > 600);
    }

    #[test]
    fn test_tiny_drawing_is_noop() {
        let mut session = session();
        let sketch = Sketch::new(64, 64).pen(vec![(50.0, 50.0), (52.0, 50.0)]);
        let effect = session
            .apply(Intent::Draw {
                image: "X.tif".to_string(),
                sketch,
            })
            .unwrap();
        assert!(matches!(effect, Effect::NoOp { .. }));
    }
}
