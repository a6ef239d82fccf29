//! Haralick texture descriptors from gray-level co-occurrence matrices.
//!
//! The region's intensities are clipped to a percentile range, quantized to
//! a fixed number of levels and paired along each displacement of
//! [`TEXTURE_OFFSETS`]. Only pairs with both pixels inside the mask count.
//! Each feature is reported as its mean and its range over the
//! displacements.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::TextureConfig;
use crate::constants::TEXTURE_OFFSETS;
use crate::model::{IntensityImage, Mask};

/// Feature names, in the order of [`TextureFeatures`] values.
pub const HARALICK_FEATURES: [&str; 13] = [
    "ASM",
    "Contrast",
    "Correlation",
    "SumOfSquares",
    "IDM",
    "SumAverage",
    "SumVariance",
    "SumEntropy",
    "Entropy",
    "DifferenceVariance",
    "DifferenceEntropy",
    "IMC1",
    "IMC2",
];

const FEATURE_COUNT: usize = HARALICK_FEATURES.len();

/// Texture of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureFeatures {
    /// Mean of each feature over the displacements
    pub mean: [f64; FEATURE_COUNT],
    /// Largest minus smallest value of each feature over the displacements
    pub range: [f64; FEATURE_COUNT],
}

impl TextureFeatures {
    /// `(feature name, mean, range)` triples in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64, f64)> + '_ {
        HARALICK_FEATURES
            .iter()
            .enumerate()
            .map(|(i, name)| (*name, self.mean[i], self.range[i]))
    }
}

/// Linear-interpolated percentile of sorted values, `q` in 0-100.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let Some(&last) = sorted.last() else {
        return 0.0;
    };
    let position = q / 100.0 * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if upper >= sorted.len() {
        return last;
    }
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Gray level of every masked pixel; `None` outside the mask.
fn quantize(mask: &Mask, intensity: &IntensityImage, config: &TextureConfig) -> Array2<Option<u8>> {
    let mut values: Vec<f64> = mask
        .pixels()
        .map(|(r, c)| f64::from(intensity[(r, c)]))
        .collect();
    values.sort_by(f64::total_cmp);
    let low = percentile(&values, config.clip_low);
    let high = percentile(&values, config.clip_high);
    let top = (config.levels - 1) as f64;

    Array2::from_shape_fn(mask.dim(), |(r, c)| {
        if !mask.get(r, c) {
            return None;
        }
        if high <= low {
            return Some(0);
        }
        let value = f64::from(intensity[(r, c)]).clamp(low, high);
        Some(((value - low) / (high - low) * top) as u8)
    })
}

/// Symmetric, normalized co-occurrence matrix for one displacement.
/// `None` when no pair of masked pixels lies at that displacement.
fn cooccurrence(levels: &Array2<Option<u8>>, offset: (isize, isize), count: usize) -> Option<Array2<f64>> {
    let (rows, cols) = levels.dim();
    let mut glcm = Array2::<f64>::zeros((count, count));
    let mut pairs = 0usize;

    for ((r, c), level) in levels.indexed_iter() {
        let Some(a) = level else {
            continue;
        };
        let (nr, nc) = (r as isize + offset.0, c as isize + offset.1);
        if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
            continue;
        }
        if let Some(b) = levels[(nr as usize, nc as usize)] {
            glcm[(*a as usize, b as usize)] += 1.0;
            glcm[(b as usize, *a as usize)] += 1.0;
            pairs += 1;
        }
    }

    if pairs == 0 {
        return None;
    }
    let total = 2.0 * pairs as f64;
    glcm.mapv_inplace(|v| v / total);
    Some(glcm)
}

fn entropy<'a>(probabilities: impl IntoIterator<Item = &'a f64>) -> f64 {
    -probabilities
        .into_iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| p * p.log2())
        .sum::<f64>()
}

/// The thirteen Haralick features of one normalized matrix.
fn haralick(p: &Array2<f64>) -> [f64; FEATURE_COUNT] {
    let n = p.nrows();
    let px: Vec<f64> = p.rows().into_iter().map(|row| row.sum()).collect();
    let py: Vec<f64> = p.columns().into_iter().map(|col| col.sum()).collect();
    let mut sum_of = vec![0.0; 2 * n - 1];
    let mut difference_of = vec![0.0; n];

    let mean_x: f64 = px.iter().enumerate().map(|(i, v)| i as f64 * v).sum();
    let mean_y: f64 = py.iter().enumerate().map(|(j, v)| j as f64 * v).sum();
    let var_x: f64 = px.iter().enumerate().map(|(i, v)| (i as f64 - mean_x).powi(2) * v).sum();
    let var_y: f64 = py.iter().enumerate().map(|(j, v)| (j as f64 - mean_y).powi(2) * v).sum();

    let mut asm = 0.0;
    let mut cross = 0.0;
    let mut idm = 0.0;
    let mut hxy1 = 0.0;
    let mut hxy2 = 0.0;
    for ((i, j), &v) in p.indexed_iter() {
        let marginal = px[i] * py[j];
        if marginal > 0.0 {
            hxy2 -= marginal * marginal.log2();
        }
        if v == 0.0 {
            continue;
        }
        let d = i.abs_diff(j);
        sum_of[i + j] += v;
        difference_of[d] += v;
        asm += v * v;
        cross += (i * j) as f64 * v;
        idm += v / (1.0 + (d * d) as f64);
        hxy1 -= v * marginal.log2();
    }

    let contrast: f64 = difference_of.iter().enumerate().map(|(k, v)| (k * k) as f64 * v).sum();
    let spread = (var_x * var_y).sqrt();
    let correlation = if spread > f64::EPSILON {
        (cross - mean_x * mean_y) / spread
    } else {
        1.0
    };
    let sum_average: f64 = sum_of.iter().enumerate().map(|(k, v)| k as f64 * v).sum();
    let sum_variance: f64 = sum_of
        .iter()
        .enumerate()
        .map(|(k, v)| (k as f64 - sum_average).powi(2) * v)
        .sum();
    let difference_mean: f64 = difference_of.iter().enumerate().map(|(k, v)| k as f64 * v).sum();
    let difference_variance: f64 = difference_of
        .iter()
        .enumerate()
        .map(|(k, v)| (k as f64 - difference_mean).powi(2) * v)
        .sum();

    let hxy = entropy(p.iter());
    let hx_max = entropy(&px).max(entropy(&py));
    let imc1 = if hx_max > 0.0 { (hxy - hxy1) / hx_max } else { 0.0 };
    let imc2 = (1.0 - (-2.0 * (hxy2 - hxy)).exp()).max(0.0).sqrt();

    [
        asm,
        contrast,
        correlation,
        var_x,
        idm,
        sum_average,
        sum_variance,
        entropy(&sum_of),
        hxy,
        difference_variance,
        entropy(&difference_of),
        imc1,
        imc2,
    ]
}

/// Texture of the masked part of `intensity`.
///
/// `None` for an empty mask, a shape mismatch, or a region too small to
/// hold a pair at any displacement.
pub fn measure_texture(mask: &Mask, intensity: &IntensityImage, config: &TextureConfig) -> Option<TextureFeatures> {
    if mask.is_empty() || mask.dim() != intensity.dim() {
        return None;
    }
    let levels = quantize(mask, intensity, config);
    let per_offset: Vec<[f64; FEATURE_COUNT]> = TEXTURE_OFFSETS
        .iter()
        .filter_map(|&offset| cooccurrence(&levels, offset, config.levels))
        .map(|glcm| haralick(&glcm))
        .collect();
    if per_offset.is_empty() {
        return None;
    }

    let mut mean = [0.0; FEATURE_COUNT];
    let mut range = [0.0; FEATURE_COUNT];
    for (k, (mean, range)) in mean.iter_mut().zip(range.iter_mut()).enumerate() {
        let values = per_offset.iter().map(|f| f[k]);
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
        *mean = values.sum::<f64>() / per_offset.len() as f64;
        *range = max - min;
    }
    Some(TextureFeatures { mean, range })
}
