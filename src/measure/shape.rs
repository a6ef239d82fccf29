//! Per-component shape descriptors.
//!
//! All geometry is computed on a bounding-box crop padded by one pixel, so
//! neighbour lookups never leave the grid.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI, SQRT_2};

use imageproc::geometry::convex_hull;
use imageproc::point::Point;
use ndarray::Array2;

use super::properties::{IntensityStats, RegionProperties};
use crate::model::IntensityImage;

/// Tolerance for treating the inertia tensor diagonal as isotropic.
const ISOTROPY_EPSILON: f64 = 1e-12;

/// Weighted border code: centre 1, edge neighbours 2, corner neighbours 10.
fn perimeter_weight(code: u32) -> f64 {
    match code {
        5 | 7 | 15 | 17 | 25 | 27 => 1.0,
        21 | 33 => SQRT_2,
        13 | 23 => (1.0 + SQRT_2) / 2.0,
        _ => 0.0,
    }
}

struct Crop {
    cells: Array2<bool>,
    /// Global `(row, col)` of padded cell `(1, 1)`
    origin: (usize, usize),
}

impl Crop {
    fn new(pixels: &[(usize, usize)], bbox: (usize, usize, usize, usize)) -> Self {
        let (r0, c0, r1, c1) = bbox;
        let mut cells = Array2::from_elem((r1 - r0 + 3, c1 - c0 + 3), false);
        for &(r, c) in pixels {
            cells[(r - r0 + 1, c - c0 + 1)] = true;
        }
        Self {
            cells,
            origin: (r0, c0),
        }
    }

    fn at(&self, r: isize, c: isize) -> bool {
        if r < 0 || c < 0 {
            return false;
        }
        self.cells
            .get((r as usize, c as usize))
            .copied()
            .unwrap_or(false)
    }

    /// Set cells with at least one unset 4-neighbour.
    fn border(&self) -> Array2<bool> {
        Array2::from_shape_fn(self.cells.dim(), |(r, c)| {
            let (r, c) = (r as isize, c as isize);
            self.at(r, c)
                && !(self.at(r - 1, c) && self.at(r + 1, c) && self.at(r, c - 1) && self.at(r, c + 1))
        })
    }

    fn perimeter(&self, border: &Array2<bool>) -> f64 {
        let on = |r: isize, c: isize| -> u32 {
            if r < 0 || c < 0 {
                return 0;
            }
            u32::from(border.get((r as usize, c as usize)).copied().unwrap_or(false))
        };
        border
            .indexed_iter()
            .filter(|&(_, &b)| b)
            .map(|((r, c), _)| {
                let (r, c) = (r as isize, c as isize);
                let edges = on(r - 1, c) + on(r + 1, c) + on(r, c - 1) + on(r, c + 1);
                let corners =
                    on(r - 1, c - 1) + on(r - 1, c + 1) + on(r + 1, c - 1) + on(r + 1, c + 1);
                perimeter_weight(1 + 2 * edges + 10 * corners)
            })
            .sum()
    }

    /// Boundary crossings along lines of direction `(dr, dc)`.
    fn transitions(&self, dr: isize, dc: isize) -> usize {
        let (rows, cols) = self.cells.dim();
        let mut count = 0;
        for r in 0..rows as isize {
            for c in 0..cols as isize {
                let (nr, nc) = (r + dr, c + dc);
                if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
                    continue;
                }
                if self.at(r, c) != self.at(nr, nc) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Four-direction Cauchy-Crofton estimate.
    fn perimeter_crofton(&self) -> f64 {
        let axial = (self.transitions(0, 1) + self.transitions(1, 0)) as f64;
        let diagonal = (self.transitions(1, 1) + self.transitions(1, -1)) as f64;
        PI / 8.0 * (axial + diagonal * FRAC_1_SQRT_2)
    }

    /// Border cells in global coordinates as hull points (`x` = col, `y` = row).
    fn border_points(&self, border: &Array2<bool>) -> Vec<(i32, i32)> {
        border
            .indexed_iter()
            .filter(|&(_, &b)| b)
            .map(|((r, c), _)| {
                (
                    (self.origin.1 + c) as i32 - 1,
                    (self.origin.0 + r) as i32 - 1,
                )
            })
            .collect()
    }
}

fn cross(o: Point<i32>, a: Point<i32>, b: (i64, i64)) -> i64 {
    let (ox, oy) = (i64::from(o.x), i64::from(o.y));
    (i64::from(a.x) - ox) * (b.1 - oy) - (i64::from(a.y) - oy) * (b.0 - ox)
}

/// Inclusive point-in-convex-polygon test.
fn inside_hull(hull: &[Point<i32>], point: (i64, i64)) -> bool {
    let mut positive = false;
    let mut negative = false;
    for (i, &a) in hull.iter().enumerate() {
        let b = hull[(i + 1) % hull.len()];
        let side = cross(a, b, point);
        positive |= side > 0;
        negative |= side < 0;
        if positive && negative {
            return false;
        }
    }
    true
}

/// Pixels whose centre lies inside the convex hull of the region's pixel centres.
fn convex_area(border_points: &[(i32, i32)], bbox: (usize, usize, usize, usize), area: f64) -> f64 {
    let points: Vec<Point<i32>> = border_points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    let hull = convex_hull(points.as_slice());
    if hull.len() < 3 {
        return area;
    }
    let (r0, c0, r1, c1) = bbox;
    let mut count = 0usize;
    for r in r0..=r1 {
        for c in c0..=c1 {
            if inside_hull(&hull, (c as i64, r as i64)) {
                count += 1;
            }
        }
    }
    (count as f64).max(area)
}

/// Largest distance between two pixel corners of the region.
fn feret_diameter_max(border_points: &[(i32, i32)]) -> f64 {
    let corners: Vec<Point<i32>> = border_points
        .iter()
        .flat_map(|&(x, y)| {
            [
                Point::new(x, y),
                Point::new(x + 1, y),
                Point::new(x, y + 1),
                Point::new(x + 1, y + 1),
            ]
        })
        .collect();
    let hull = convex_hull(corners.as_slice());
    let mut best = 0.0f64;
    for (i, a) in hull.iter().enumerate() {
        for b in &hull[i + 1..] {
            let dx = f64::from(a.x - b.x);
            let dy = f64::from(a.y - b.y);
            best = best.max((dx * dx + dy * dy).sqrt());
        }
    }
    best
}

/// Second-moment descriptors: `(major, minor, eccentricity, orientation)`.
fn inertia(pixels: &[(usize, usize)], centroid: (f64, f64)) -> (f64, f64, f64, f64) {
    let n = pixels.len() as f64;
    let (mut row_var, mut col_var, mut cov) = (0.0, 0.0, 0.0);
    for &(r, c) in pixels {
        let dr = r as f64 - centroid.0;
        let dc = c as f64 - centroid.1;
        row_var += dr * dr;
        col_var += dc * dc;
        cov += dr * dc;
    }
    // Inertia tensor [[a, b], [b, c]]
    let a = col_var / n;
    let b = -cov / n;
    let c = row_var / n;

    let mean = (a + c) / 2.0;
    let spread = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let l1 = (mean + spread).max(0.0);
    let l2 = (mean - spread).max(0.0);

    let eccentricity = if l1 > 0.0 { (1.0 - l2 / l1).sqrt() } else { 0.0 };
    let orientation = if (a - c).abs() < ISOTROPY_EPSILON {
        if b < 0.0 { FRAC_PI_4 } else { -FRAC_PI_4 }
    } else {
        0.5 * (-2.0 * b).atan2(c - a)
    };
    (4.0 * l1.sqrt(), 4.0 * l2.sqrt(), eccentricity, orientation)
}

fn intensity_stats(pixels: &[(usize, usize)], image: &IntensityImage) -> Option<IntensityStats> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    for &(r, c) in pixels {
        if let Some(&v) = image.get((r, c)) {
            let v = f64::from(v);
            sum += v;
            count += 1;
            max = max.max(v);
            min = min.min(v);
        }
    }
    (count > 0).then(|| IntensityStats {
        mean: sum / count as f64,
        max,
        min,
    })
}

/// Measure one connected component given as a pixel list.
///
/// Returns `None` for an empty pixel list.
pub fn measure_component(
    pixels: &[(usize, usize)],
    intensity: Option<&IntensityImage>,
) -> Option<RegionProperties> {
    let &(first_r, first_c) = pixels.first()?;
    let bbox = pixels.iter().fold(
        (first_r, first_c, first_r, first_c),
        |(r0, c0, r1, c1), &(r, c)| (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
    );

    let area = pixels.len() as f64;
    let bbox_area = ((bbox.2 - bbox.0 + 1) * (bbox.3 - bbox.1 + 1)) as f64;
    let centroid = (
        pixels.iter().map(|&(r, _)| r as f64).sum::<f64>() / area,
        pixels.iter().map(|&(_, c)| c as f64).sum::<f64>() / area,
    );

    let crop = Crop::new(pixels, bbox);
    let border = crop.border();
    let points = crop.border_points(&border);
    let convex = convex_area(&points, bbox, area);
    let (major, minor, eccentricity, orientation) = inertia(pixels, centroid);

    Some(RegionProperties {
        area,
        bbox_area,
        convex_area: convex,
        perimeter: crop.perimeter(&border),
        perimeter_crofton: crop.perimeter_crofton(),
        eccentricity,
        extent: area / bbox_area,
        major_axis_length: major,
        minor_axis_length: minor,
        equivalent_diameter: (4.0 * area / PI).sqrt(),
        feret_diameter_max: feret_diameter_max(&points),
        orientation,
        solidity: area / convex,
        centroid_y: centroid.0,
        centroid_x: centroid.1,
        intensity: intensity.and_then(|image| intensity_stats(pixels, image)),
    })
}
