//! Segmentation model boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::PipelineError;
use crate::model::{IntensityImage, LabelGrid};

/// Cooperative cancellation flag shared between the producer and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One raw image queued for processing.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    /// Channel measured for intensity descriptors
    pub intensity: Option<Arc<IntensityImage>>,
    /// Channel used by the nucleus-content filter
    pub nucleus: Option<Arc<IntensityImage>>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intensity: None,
            nucleus: None,
        }
    }

    pub fn with_intensity(mut self, image: IntensityImage) -> Self {
        self.intensity = Some(Arc::new(image));
        self
    }

    pub fn with_nucleus(mut self, image: IntensityImage) -> Self {
        self.nucleus = Some(Arc::new(image));
        self
    }
}

/// Produces an initial label grid for an image. 0 is background.
pub trait Segmenter: Send + Sync {
    fn segment(&self, source: &SourceImage, cancel: &CancelToken) -> Result<LabelGrid, PipelineError>;
}

/// Serves label grids computed ahead of time, keyed by image name.
#[derive(Debug, Clone, Default)]
pub struct PrecomputedSegmenter {
    grids: HashMap<String, LabelGrid>,
}

impl PrecomputedSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, grid: LabelGrid) {
        self.grids.insert(name.into(), grid);
    }

    pub fn with(mut self, name: impl Into<String>, grid: LabelGrid) -> Self {
        self.insert(name, grid);
        self
    }
}

impl Segmenter for PrecomputedSegmenter {
    fn segment(&self, source: &SourceImage, cancel: &CancelToken) -> Result<LabelGrid, PipelineError> {
        cancel.check()?;
        self.grids
            .get(&source.name)
            .cloned()
            .ok_or_else(|| PipelineError::Segmentation(format!("no label grid for '{}'", source.name)))
    }
}
