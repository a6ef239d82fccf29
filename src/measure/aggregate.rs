//! Combining per-region descriptors into one composite record.

use super::properties::{IntensityStats, RegionProperties};
use crate::error::{CurationError, Result};

/// Combine constituent descriptors into one record.
///
/// Additive fields are summed, shape ratios and the centroid are area-weighted
/// means, Feret diameter is the maximum, mean intensity is the unweighted mean
/// of constituent means. Empty input or zero total area is rejected.
pub fn aggregate<'a>(
    parts: impl IntoIterator<Item = &'a RegionProperties>,
) -> Result<RegionProperties> {
    let parts: Vec<&RegionProperties> = parts.into_iter().collect();
    let total_area: f64 = parts.iter().map(|p| p.area).sum();
    if parts.is_empty() || total_area <= 0.0 {
        return Err(CurationError::DegenerateAggregate);
    }

    if let [single] = parts.as_slice() {
        return Ok((*single).clone());
    }

    let sum = |field: fn(&RegionProperties) -> f64| -> f64 { parts.iter().map(|p| field(p)).sum() };
    let weighted = |field: fn(&RegionProperties) -> f64| -> f64 {
        parts.iter().map(|p| p.area * field(p)).sum::<f64>() / total_area
    };

    let intensities: Vec<&IntensityStats> =
        parts.iter().filter_map(|p| p.intensity.as_ref()).collect();
    let intensity = (!intensities.is_empty()).then(|| IntensityStats {
        mean: intensities.iter().map(|s| s.mean).sum::<f64>() / intensities.len() as f64,
        max: intensities
            .iter()
            .map(|s| s.max)
            .fold(f64::NEG_INFINITY, f64::max),
        min: intensities.iter().map(|s| s.min).fold(f64::INFINITY, f64::min),
    });

    Ok(RegionProperties {
        area: total_area,
        bbox_area: sum(|p| p.bbox_area),
        convex_area: sum(|p| p.convex_area),
        perimeter: sum(|p| p.perimeter),
        perimeter_crofton: sum(|p| p.perimeter_crofton),
        eccentricity: weighted(|p| p.eccentricity),
        extent: weighted(|p| p.extent),
        major_axis_length: weighted(|p| p.major_axis_length),
        minor_axis_length: weighted(|p| p.minor_axis_length),
        equivalent_diameter: weighted(|p| p.equivalent_diameter),
        feret_diameter_max: parts
            .iter()
            .map(|p| p.feret_diameter_max)
            .fold(0.0, f64::max),
        orientation: weighted(|p| p.orientation),
        solidity: weighted(|p| p.solidity),
        centroid_y: weighted(|p| p.centroid_y),
        centroid_x: weighted(|p| p.centroid_x),
        intensity,
    })
}
