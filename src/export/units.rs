//! Pixel to physical unit conversion.

use serde::Serialize;

use crate::constants::MAX_PIXEL_RATE;
use crate::error::{CurationError, Result};
use crate::measure::RegionProperties;

/// Validated physical units per pixel, within `(0, MAX_PIXEL_RATE]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRate(f64);

impl PixelRate {
    pub fn new(rate: f64) -> Result<Self> {
        if !rate.is_finite() || rate <= 0.0 || rate > MAX_PIXEL_RATE {
            return Err(CurationError::InvalidConversionRate(rate));
        }
        Ok(Self(rate))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Convert a physical area to a pixel count.
    pub fn area_to_pixels(self, area: f64) -> f64 {
        area / (self.0 * self.0)
    }
}

/// Descriptors in physical units.
///
/// Only [`calibrate`] builds this type, so a record cannot be converted twice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CalibratedProperties(RegionProperties);

impl CalibratedProperties {
    pub fn values(&self) -> &RegionProperties {
        &self.0
    }
}

/// Scale area-like fields by `rate²` and length-like fields by `rate`.
///
/// Ratios, angles, the centroid and intensities are unit-free and kept as is.
pub fn calibrate(props: &RegionProperties, rate: PixelRate) -> CalibratedProperties {
    let linear = rate.value();
    let square = linear * linear;
    let mut out = props.clone();
    out.area *= square;
    out.bbox_area *= square;
    out.convex_area *= square;
    out.perimeter *= linear;
    out.perimeter_crofton *= linear;
    out.major_axis_length *= linear;
    out.minor_axis_length *= linear;
    out.equivalent_diameter *= linear;
    out.feret_diameter_max *= linear;
    CalibratedProperties(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds() {
        assert!(PixelRate::new(0.18).is_ok());
        assert!(PixelRate::new(2.0).is_ok());
        assert_eq!(
            PixelRate::new(0.0),
            Err(CurationError::InvalidConversionRate(0.0))
        );
        assert!(PixelRate::new(-0.5).is_err());
        assert!(PixelRate::new(2.01).is_err());
        assert!(PixelRate::new(f64::NAN).is_err());
    }

    #[test]
    fn test_calibrate_area_and_perimeter() {
        let props = RegionProperties {
            area: 100.0,
            perimeter: 40.0,
            eccentricity: 0.5,
            centroid_x: 12.0,
            ..Default::default()
        };
        let rate = PixelRate::new(0.18).unwrap();
        let out = calibrate(&props, rate);
        assert!((out.values().area - 3.24).abs() < 1e-9);
        assert!((out.values().perimeter - 7.2).abs() < 1e-9);
        assert_eq!(out.values().eccentricity, 0.5);
        assert_eq!(out.values().centroid_x, 12.0);
    }

    #[test]
    fn test_area_to_pixels() {
        let rate = PixelRate::new(0.5).unwrap();
        assert_eq!(rate.area_to_pixels(10.0), 40.0);
    }
}
