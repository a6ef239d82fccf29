//! Configuration file support for cellcurate.
//!
//! Settings for the drawing rasterizer, the export reconciler and the
//! pipeline post-processing live in one versioned JSON document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ALPHA_THRESHOLD, DEFAULT_CLOSING_RADIUS, DEFAULT_ERASER_WIDTH,
    DEFAULT_EXCLUDED_TABLE_NAME, DEFAULT_MIN_DRAWN_AREA, DEFAULT_MIN_OUTLINE_POINTS,
    DEFAULT_PEN_WIDTH, DEFAULT_PIXEL_RATE, DEFAULT_ROI_FOLDER, DEFAULT_TABLE_NAME,
    DEFAULT_TEXTURE_CLIP, DEFAULT_TEXTURE_LEVELS,
};
use crate::export::PixelRate;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show every registry mutation
    Debug,
    /// Show all log messages including per-point hit tests
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Complete curation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Version of the configuration file format
    pub version: u32,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub drawing: DrawingConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Freehand drawing rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingConfig {
    /// Canvas alpha at or above this value counts as drawn
    pub alpha_threshold: u8,
    /// Chebyshev radius of the closing element
    pub closing_radius: u8,
    /// Components below this pixel area are dropped
    pub min_area: u32,
    /// Pen stroke width in canvas pixels
    pub pen_width: f32,
    /// Eraser stroke width in canvas pixels
    pub eraser_width: f32,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            closing_radius: DEFAULT_CLOSING_RADIUS,
            min_area: DEFAULT_MIN_DRAWN_AREA,
            pen_width: DEFAULT_PEN_WIDTH,
            eraser_width: DEFAULT_ERASER_WIDTH,
        }
    }
}

/// Export reconciliation and output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Physical units per pixel
    pub pixel_rate: f64,
    /// Experiment condition attached to every row
    pub condition: String,
    /// Experiment replicate attached to every row
    pub replicate: String,
    /// Base name of the measurement table
    pub table_name: String,
    /// Base name of the audit table for deactivated regions
    pub excluded_table_name: String,
    /// Folder (under the output directory) holding ROI archives
    pub roi_folder_name: String,
    /// Add the rendered output identifier column
    pub include_output_names: bool,
    /// Outlines with fewer vertices are not written
    pub min_outline_points: usize,
    /// Haralick texture columns; omitted when `None`
    pub texture: Option<TextureConfig>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pixel_rate: DEFAULT_PIXEL_RATE,
            condition: String::new(),
            replicate: String::new(),
            table_name: DEFAULT_TABLE_NAME.to_string(),
            excluded_table_name: DEFAULT_EXCLUDED_TABLE_NAME.to_string(),
            roi_folder_name: DEFAULT_ROI_FOLDER.to_string(),
            include_output_names: true,
            min_outline_points: DEFAULT_MIN_OUTLINE_POINTS,
            texture: None,
        }
    }
}

/// Gray-level co-occurrence settings for texture descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureConfig {
    /// Quantization levels, 2 to 256
    pub levels: usize,
    /// Lower clipping percentile of the region's intensities
    pub clip_low: f64,
    /// Upper clipping percentile of the region's intensities
    pub clip_high: f64,
}

impl Default for TextureConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_TEXTURE_LEVELS,
            clip_low: DEFAULT_TEXTURE_CLIP.0,
            clip_high: DEFAULT_TEXTURE_CLIP.1,
        }
    }
}

/// Nucleus-content filter applied after segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NucleusFilter {
    /// Minimum share (0-100) of a region's pixels that must be bright
    pub min_pixels_percentage: f64,
    /// Nucleus-channel value above which a pixel counts as bright
    pub pixel_threshold: f32,
}

/// Pipeline-side post-processing of label grids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Minimum region area in physical units squared
    pub min_area: f64,
    /// Drop regions touching the image edge
    pub clear_border: bool,
    /// Optional nucleus-content filter
    pub nucleus: Option<NucleusFilter>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_area: 0.0,
            clear_border: true,
            nucleus: None,
        }
    }
}

impl CurationConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            drawing: DrawingConfig::default(),
            export: ExportConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize and validate configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Validated pixel conversion rate.
    pub fn pixel_rate(&self) -> Result<PixelRate, ConfigError> {
        PixelRate::new(self.export.pixel_rate)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pixel_rate()?;
        if self.drawing.closing_radius == 0 {
            return Err(ConfigError::Invalid(
                "drawing.closing_radius must be at least 1".to_string(),
            ));
        }
        if !(self.drawing.pen_width > 0.0 && self.drawing.eraser_width > 0.0) {
            return Err(ConfigError::Invalid(
                "drawing.pen_width and drawing.eraser_width must be positive".to_string(),
            ));
        }
        if !self.pipeline.min_area.is_finite() || self.pipeline.min_area < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "pipeline.min_area must be a non-negative number, got {}",
                self.pipeline.min_area
            )));
        }
        if let Some(nucleus) = &self.pipeline.nucleus
            && !(0.0..=100.0).contains(&nucleus.min_pixels_percentage)
        {
            return Err(ConfigError::Invalid(format!(
                "pipeline.nucleus.min_pixels_percentage must be within 0-100, got {}",
                nucleus.min_pixels_percentage
            )));
        }
        if let Some(texture) = &self.export.texture {
            if !(2..=256).contains(&texture.levels) {
                return Err(ConfigError::Invalid(format!(
                    "export.texture.levels must be within 2-256, got {}",
                    texture.levels
                )));
            }
            if !(0.0 <= texture.clip_low && texture.clip_low < texture.clip_high && texture.clip_high <= 100.0) {
                return Err(ConfigError::Invalid(format!(
                    "export.texture clip percentiles must satisfy 0 <= low < high <= 100, got {} and {}",
                    texture.clip_low, texture.clip_high
                )));
            }
        }
        for (field, name) in [
            ("export.table_name", &self.export.table_name),
            ("export.excluded_table_name", &self.export.excluded_table_name),
            ("export.roi_folder_name", &self.export.roi_folder_name),
        ] {
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a plain file name, got '{}'",
                    field, name
                )));
            }
        }
        Ok(())
    }
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A value is outside its accepted range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
