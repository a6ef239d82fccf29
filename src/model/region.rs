//! Region entity.

use super::{LabelId, Mask, Provenance, RegionKey};
use crate::measure::RegionProperties;

/// One binary mask plus identity and provenance within one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Image the region belongs to
    pub image_name: String,
    /// Label, unique within the owning registry
    pub label: LabelId,
    /// Original per-region mask. Never rewritten by grouping.
    pub mask: Mask,
    pub provenance: Provenance,
    /// Individual active flag
    pub active: bool,
    /// Pixel-space descriptors, if they could be computed
    pub properties: Option<RegionProperties>,
}

impl Region {
    pub fn new(
        image_name: impl Into<String>,
        label: LabelId,
        mask: Mask,
        provenance: Provenance,
        properties: Option<RegionProperties>,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            label,
            mask,
            provenance,
            active: true,
            properties,
        }
    }

    pub fn key(&self) -> RegionKey {
        RegionKey::new(self.image_name.clone(), self.label.clone())
    }

    /// Pixel area, taken from the measured properties when available.
    pub fn area(&self) -> f64 {
        self.properties
            .as_ref()
            .map(|p| p.area)
            .unwrap_or_else(|| self.mask.area() as f64)
    }
}
