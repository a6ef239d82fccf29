//! Global constants for cellcurate

/// Largest accepted pixel-to-physical conversion rate (physical units per pixel).
pub const MAX_PIXEL_RATE: f64 = 2.0;

/// Default pixel-to-physical conversion rate (microns per pixel).
pub const DEFAULT_PIXEL_RATE: f64 = 0.18;

/// Canvas alpha at or above this value counts as drawn.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 200;

/// Chebyshev radius of the closing element (5 gives an 11x11 square).
pub const DEFAULT_CLOSING_RADIUS: u8 = 5;

/// Drawn components smaller than this many pixels are discarded as noise.
pub const DEFAULT_MIN_DRAWN_AREA: u32 = 100;

/// Pen width for freehand outlines, in canvas pixels.
pub const DEFAULT_PEN_WIDTH: f32 = 3.0;

/// Eraser width, in canvas pixels.
pub const DEFAULT_ERASER_WIDTH: f32 = 30.0;

/// Outlines with fewer vertices than this are not written to ROI archives.
pub const DEFAULT_MIN_OUTLINE_POINTS: usize = 10;

/// Default base name of the exported measurement table.
pub const DEFAULT_TABLE_NAME: &str = "results";

/// Default base name of the audit table for deactivated regions.
pub const DEFAULT_EXCLUDED_TABLE_NAME: &str = "excluded_objects";

/// Default name of the folder holding per-image ROI archives.
pub const DEFAULT_ROI_FOLDER: &str = "ROIs";

/// Gray levels of the quantized image behind texture descriptors.
pub const DEFAULT_TEXTURE_LEVELS: usize = 64;

/// Intensity percentiles (0-100) clipped before quantization.
pub const DEFAULT_TEXTURE_CLIP: (f64, f64) = (1.0, 99.0);

/// Co-occurrence displacements as `(row, col)`: one-pixel and five-pixel
/// neighbours in four directions.
pub const TEXTURE_OFFSETS: [(isize, isize); 8] = [
    (0, 1),
    (1, 0),
    (1, 1),
    (-1, 1),
    (0, 5),
    (5, 0),
    (5, 5),
    (-5, 5),
];
