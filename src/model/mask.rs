//! Binary region mask over an image grid.

use image::{GrayImage, Luma};
use ndarray::{Array2, Zip};

use crate::error::{CurationError, Result};

/// A 2D boolean grid, indexed `(row, col)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    cells: Array2<bool>,
}

impl Mask {
    /// Create an empty mask of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cells: Array2::from_elem((rows, cols), false),
        }
    }

    /// Mask with an axis-aligned filled rectangle. Out-of-range parts are clipped.
    pub fn with_rect(
        rows: usize,
        cols: usize,
        top: usize,
        left: usize,
        height: usize,
        width: usize,
    ) -> Self {
        let mut mask = Self::new(rows, cols);
        for r in top..(top + height).min(rows) {
            for c in left..(left + width).min(cols) {
                mask.cells[(r, c)] = true;
            }
        }
        mask
    }

    /// Cells of an 8-bit image at or above `threshold`.
    pub fn from_gray(image: &GrayImage, threshold: u8) -> Self {
        let (width, height) = image.dimensions();
        let cells = Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
            image.get_pixel(c as u32, r as u32).0[0] >= threshold
        });
        Self { cells }
    }

    /// Render as a 0/255 grayscale image.
    pub fn to_gray(&self) -> GrayImage {
        let (rows, cols) = self.dim();
        GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
            if self.cells[(y as usize, x as usize)] {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        })
    }

    /// Shape as `(rows, cols)`.
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    /// Cell value, `false` outside the grid.
    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells.get((row, col)).copied().unwrap_or(false)
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        if let Some(cell) = self.cells.get_mut((row, col)) {
            *cell = value;
        }
    }

    /// Number of set cells.
    pub fn area(&self) -> usize {
        self.cells.iter().filter(|&&v| v).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&v| v)
    }

    /// Coordinates `(row, col)` of every set cell in raster order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|(idx, &v)| if v { Some(idx) } else { None })
    }

    /// Bounding box as `(min_row, min_col, max_row, max_col)`, inclusive.
    pub fn bbox(&self) -> Option<(usize, usize, usize, usize)> {
        self.pixels().fold(None, |acc, (r, c)| match acc {
            None => Some((r, c, r, c)),
            Some((r0, c0, r1, c1)) => Some((r0.min(r), c0.min(c), r1.max(r), c1.max(c))),
        })
    }

    fn check_dim(&self, other: &Mask) -> Result<()> {
        if self.dim() != other.dim() {
            return Err(CurationError::DimensionMismatch {
                expected: self.dim(),
                found: other.dim(),
            });
        }
        Ok(())
    }

    /// Bitwise OR with another mask of the same shape.
    pub fn union_with(&mut self, other: &Mask) -> Result<()> {
        self.check_dim(other)?;
        Zip::from(&mut self.cells)
            .and(&other.cells)
            .for_each(|a, &b| *a |= b);
        Ok(())
    }

    /// Clear every cell set in `other`.
    pub fn subtract(&mut self, other: &Mask) -> Result<()> {
        self.check_dim(other)?;
        Zip::from(&mut self.cells)
            .and(&other.cells)
            .for_each(|a, &b| *a &= !b);
        Ok(())
    }

    /// Union of several masks. Returns `None` for an empty input.
    pub fn union_all<'a>(masks: impl IntoIterator<Item = &'a Mask>) -> Result<Option<Mask>> {
        let mut iter = masks.into_iter();
        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let mut union = first.clone();
        for mask in iter {
            union.union_with(mask)?;
        }
        Ok(Some(union))
    }
}
