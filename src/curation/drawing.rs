//! Freehand drawings to closed regions.

use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use imageproc::region_labelling::{Connectivity, connected_components};

use super::sketch::{Sketch, SketchCanvas};
use crate::config::DrawingConfig;
use crate::error::{CurationError, Result};
use crate::measure::component_masks;
use crate::model::Mask;

const ON: Luma<u8> = Luma([255]);
const OFF: Luma<u8> = Luma([0]);

/// Converts a possibly-open freehand outline into filled region masks.
#[derive(Debug, Clone)]
pub struct DrawingRasterizer {
    alpha_threshold: u8,
    closing_radius: u8,
    min_area: u32,
}

impl DrawingRasterizer {
    pub fn new(config: &DrawingConfig) -> Self {
        Self {
            alpha_threshold: config.alpha_threshold,
            closing_radius: config.closing_radius,
            min_area: config.min_area,
        }
    }

    /// Rasterize an alpha canvas, minus an optional erase canvas, at `dims` = `(rows, cols)`.
    ///
    /// Returns one mask per surviving component, in raster order of first pixel.
    pub fn rasterize(
        &self,
        canvas: &GrayImage,
        erase: Option<&GrayImage>,
        dims: (usize, usize),
    ) -> Result<Vec<Mask>> {
        let (width, height) = canvas.dimensions();
        if width == 0 || height == 0 {
            return Err(CurationError::DimensionMismatch {
                expected: dims,
                found: (height as usize, width as usize),
            });
        }

        let mut alpha = canvas.clone();
        if let Some(erase) = erase {
            if erase.dimensions() != canvas.dimensions() {
                let (ew, eh) = erase.dimensions();
                return Err(CurationError::DimensionMismatch {
                    expected: (height as usize, width as usize),
                    found: (eh as usize, ew as usize),
                });
            }
            for (pixel, erased) in alpha.pixels_mut().zip(erase.pixels()) {
                pixel.0[0] = pixel.0[0].saturating_sub(erased.0[0]);
            }
        }

        let (rows, cols) = dims;
        if (height as usize, width as usize) != dims {
            log::debug!(
                "Rescaling drawing canvas {}x{} to mask grid {}x{}",
                width,
                height,
                cols,
                rows
            );
            alpha = imageops::resize(&alpha, cols as u32, rows as u32, FilterType::Nearest);
        }

        let threshold = self.alpha_threshold;
        let binary = GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            if alpha.get_pixel(x, y).0[0] >= threshold {
                ON
            } else {
                OFF
            }
        });

        let closed = close(&binary, Norm::LInf, self.closing_radius);
        let filled = fill_enclosed(&closed);

        let masks: Vec<Mask> = component_masks(&Mask::from_gray(&filled, 128))
            .into_iter()
            .filter(|mask| {
                let keep = mask.area() >= self.min_area as usize;
                if !keep {
                    log::debug!("Dropped drawn component of {} px", mask.area());
                }
                keep
            })
            .collect();

        if masks.is_empty() {
            log::warn!("Drawing produced no closed region; the outline may need redrawing");
        }
        Ok(masks)
    }

    /// Render a sketch and rasterize it at `dims`.
    pub fn rasterize_sketch(
        &self,
        sketch: &Sketch,
        canvas: &SketchCanvas,
        dims: (usize, usize),
    ) -> Result<Vec<Mask>> {
        self.rasterize(&canvas.render(sketch), None, dims)
    }
}

/// Fill every background area not connected to the image edge.
///
/// This fills the interior of each outermost contour, including holes in it.
fn fill_enclosed(binary: &GrayImage) -> GrayImage {
    let (width, height) = binary.dimensions();
    let inverted = GrayImage::from_fn(width, height, |x, y| {
        if binary.get_pixel(x, y).0[0] == 0 {
            ON
        } else {
            OFF
        }
    });
    // Background is 4-connected when the foreground is 8-connected.
    let background = connected_components(&inverted, Connectivity::Four, OFF);

    let mut outside = std::collections::HashSet::new();
    for (x, y, label) in background.enumerate_pixels() {
        let on_edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
        if on_edge && label.0[0] != 0 {
            outside.insert(label.0[0]);
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let label = background.get_pixel(x, y).0[0];
        if label == 0 || !outside.contains(&label) {
            ON
        } else {
            OFF
        }
    })
}
