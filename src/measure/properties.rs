//! Flat descriptor records.

use serde::{Deserialize, Serialize};

/// Brightness descriptors over a region's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityStats {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
}

/// Morphological descriptors of one region (or the union of several), in pixel space.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionProperties {
    /// Pixel count
    pub area: f64,
    /// Area of the axis-aligned bounding box
    pub bbox_area: f64,
    /// Area of the convex hull
    pub convex_area: f64,
    /// Weighted border-length estimate
    pub perimeter: f64,
    /// Crofton-formula perimeter estimate
    pub perimeter_crofton: f64,
    pub eccentricity: f64,
    /// Area over bounding-box area
    pub extent: f64,
    pub major_axis_length: f64,
    pub minor_axis_length: f64,
    /// Diameter of the circle with the same area
    pub equivalent_diameter: f64,
    /// Maximum caliper diameter
    pub feret_diameter_max: f64,
    /// Angle between the row axis and the major axis, radians in [-pi/2, pi/2]
    pub orientation: f64,
    /// Area over convex area
    pub solidity: f64,
    pub centroid_y: f64,
    pub centroid_x: f64,
    /// Present when measured against an intensity image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<IntensityStats>,
}
