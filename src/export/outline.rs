//! Boundary tracing of masks into closed polygons.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};

use super::record::Polygon;
use crate::model::Mask;

/// Trace the outermost boundary of every component of a mask.
///
/// Hole borders and components nested inside holes are not reported.
pub fn trace_outlines(mask: &Mask) -> Vec<Polygon> {
    if mask.is_empty() {
        return Vec::new();
    }
    find_contours::<i32>(&padded_gray(mask))
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| contour.points.iter().map(|p| (p.x - 1, p.y - 1)).collect())
        .collect()
}

/// Mask as 0/255 with a one-pixel background frame.
///
/// The tracer only opens an outer border after a background pixel on the
/// same row, so components on the left edge need the frame to be found.
fn padded_gray(mask: &Mask) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32 + 2, rows as u32 + 2, |x, y| {
        let inside = x > 0 && y > 0 && mask.get(y as usize - 1, x as usize - 1);
        if inside { Luma([255u8]) } else { Luma([0u8]) }
    })
}
