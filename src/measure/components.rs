//! Connected-component labelling of masks.

use std::collections::HashMap;

use image::Luma;
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::model::Mask;

/// Pixel list of one 8-connected component, `(row, col)` in raster order.
pub type ComponentPixels = Vec<(usize, usize)>;

/// Split a mask into its 8-connected components.
///
/// Components are ordered by the raster position of their first pixel.
pub fn label_components(mask: &Mask) -> Vec<ComponentPixels> {
    if mask.is_empty() {
        return Vec::new();
    }

    let labelled = connected_components(&mask.to_gray(), Connectivity::Eight, Luma([0u8]));

    let mut index_of: HashMap<u32, usize> = HashMap::new();
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

/// Split a mask into one mask per 8-connected component.
pub fn component_masks(mask: &Mask) -> Vec<Mask> {
    let (rows, cols) = mask.dim();
    label_components(mask)
        .into_iter()
        .map(|pixels| {
            let mut component = Mask::new(rows, cols);
            for (r, c) in pixels {
                component.set(r, c, true);
            }
            component
        })
        .collect()
}
