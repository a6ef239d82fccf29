//! Label grid clean-up before regions are handed to curation.

use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use super::PipelineError;
use super::segmenter::CancelToken;
use crate::config::{NucleusFilter, PipelineConfig};
use crate::export::PixelRate;
use crate::measure::{ComponentPixels, RegionProperties, measure_component};
use crate::model::{IntensityImage, LabelGrid, Mask};

/// A region that survived post-processing, labelled densely from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedRegion {
    pub label: u32,
    pub mask: Mask,
    pub properties: RegionProperties,
}

/// Border clearing, size and nucleus filters, dense relabelling.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    /// Regions must be strictly larger than this many pixels
    min_area_pixels: f64,
    clear_border: bool,
    nucleus: Option<NucleusFilter>,
}

impl PostProcessor {
    pub fn new(config: &PipelineConfig, rate: PixelRate) -> Self {
        Self {
            min_area_pixels: rate.area_to_pixels(config.min_area),
            clear_border: config.clear_border,
            nucleus: config.nucleus.clone(),
        }
    }

    pub fn process(
        &self,
        grid: &LabelGrid,
        intensity: Option<&IntensityImage>,
        nucleus: Option<&IntensityImage>,
        cancel: &CancelToken,
    ) -> Result<Vec<SegmentedRegion>, PipelineError> {
        let (rows, cols) = grid.dim();
        let mut components = split_components(grid);
        cancel.check()?;

        if self.clear_border {
            components.retain(|pixels| {
                !pixels
                    .iter()
                    .any(|&(r, c)| r == 0 || c == 0 || r + 1 == rows || c + 1 == cols)
            });
        }

        components.retain(|pixels| pixels.len() as f64 > self.min_area_pixels);

        if let Some(filter) = &self.nucleus {
            match nucleus {
                Some(channel) => components.retain(|pixels| nucleus_ok(pixels, channel, filter)),
                None => log::warn!("Nucleus filter configured but no nucleus channel supplied"),
            }
        }
        cancel.check()?;

        let mut regions = Vec::with_capacity(components.len());
        for (index, pixels) in components.iter().enumerate() {
            if index % 64 == 0 {
                cancel.check()?;
            }
            let Some(properties) = measure_component(pixels, intensity) else {
                continue;
            };
            let mut mask = Mask::new(rows, cols);
            for &(r, c) in pixels {
                mask.set(r, c, true);
            }
            regions.push(SegmentedRegion {
                label: regions.len() as u32 + 1,
                mask,
                properties,
            });
        }
        Ok(regions)
    }
}

/// 8-connected components of equal non-zero labels, in raster order.
fn split_components(grid: &LabelGrid) -> Vec<ComponentPixels> {
    let (rows, cols) = grid.dim();
    let image: ImageBuffer<Luma<u32>, Vec<u32>> =
        ImageBuffer::from_fn(cols as u32, rows as u32, |x, y| {
            Luma([grid[(y as usize, x as usize)]])
        });
    let labelled = connected_components(&image, Connectivity::Eight, Luma([0u32]));

    let mut index_of = std::collections::HashMap::new();
    let mut components: Vec<ComponentPixels> = Vec::new();
    for (x, y, pixel) in labelled.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        let index = *index_of.entry(label).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[index].push((y as usize, x as usize));
    }
    components
}

fn nucleus_ok(pixels: &ComponentPixels, channel: &IntensityImage, filter: &NucleusFilter) -> bool {
    let bright = pixels
        .iter()
        .filter(|&&(r, c)| channel.get((r, c)).is_some_and(|&v| v >= filter.pixel_threshold))
        .count();
    bright as f64 >= filter.min_pixels_percentage / 100.0 * pixels.len() as f64
}
