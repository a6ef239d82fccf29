//! Morphological and intensity measurement of regions.
//!
//! [`measure_components`] measures every 8-connected component of a mask,
//! [`aggregate`] folds several records into one, and [`measure_mask`] chains
//! the two. Composite, drawn and restored regions all obtain their
//! properties through [`measure_mask`]. [`measure_texture`] adds optional
//! co-occurrence texture descriptors at export time.

mod aggregate;
mod components;
mod properties;
mod shape;
mod texture;

pub use aggregate::aggregate;
pub use components::{ComponentPixels, component_masks, label_components};
pub use properties::{IntensityStats, RegionProperties};
pub use shape::measure_component;
pub use texture::{HARALICK_FEATURES, TextureFeatures, measure_texture};

use crate::error::Result;
use crate::model::{IntensityImage, Mask};

/// Measure each 8-connected component of a mask separately.
pub fn measure_components(mask: &Mask, intensity: Option<&IntensityImage>) -> Vec<RegionProperties> {
    label_components(mask)
        .iter()
        .filter_map(|pixels| measure_component(pixels, intensity))
        .collect()
}

/// Measure a mask as one record, aggregating across its components.
pub fn measure_mask(mask: &Mask, intensity: Option<&IntensityImage>) -> Result<RegionProperties> {
    aggregate(&measure_components(mask, intensity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CurationError;

    #[test]
    fn test_measure_mask_sums_disjoint_parts() {
        let mut mask = Mask::with_rect(20, 20, 1, 1, 4, 4);
        mask.union_with(&Mask::with_rect(20, 20, 10, 10, 2, 8)).unwrap();
        let parts = measure_components(&mask, None);
        assert_eq!(parts.len(), 2);
        let merged = measure_mask(&mask, None).unwrap();
        assert_eq!(merged.area, 32.0);
        assert_eq!(merged.bbox_area, 32.0);
        let expected_y = (16.0 * 2.5 + 16.0 * 10.5) / 32.0;
        assert!((merged.centroid_y - expected_y).abs() < 1e-9);
    }

    #[test]
    fn test_measure_empty_mask_is_degenerate() {
        assert_eq!(
            measure_mask(&Mask::new(4, 4), None),
            Err(CurationError::DegenerateAggregate)
        );
    }
}
