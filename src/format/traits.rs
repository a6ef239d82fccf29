//! Trait definitions for dataset writers.

use std::path::{Path, PathBuf};

use crate::config::ExportConfig;
use crate::export::Dataset;
use crate::format::error::FormatError;

/// Trait for dataset output formats.
///
/// Each format renders a reconciled [`Dataset`] into one or more files
/// relative to an output directory.
pub trait DatasetFormat: Send + Sync {
    /// Unique identifier for this format (e.g., "csv", "imagej-roi").
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn display_name(&self) -> &'static str;

    /// Render the dataset in memory as `(relative path, contents)` files.
    fn export_to_bytes(
        &self,
        dataset: &Dataset,
        options: &ExportOptions,
    ) -> Result<Vec<RenderedFile>, FormatError>;

    /// Write the dataset below `dir`.
    fn export(
        &self,
        dataset: &Dataset,
        dir: &Path,
        options: &ExportOptions,
    ) -> Result<ExportResult, FormatError>;
}

/// One rendered output file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFile {
    /// Path relative to the output directory
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl RenderedFile {
    pub fn new(path: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            contents,
        }
    }
}

/// Options for export operations.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Base name of the results table, without extension.
    pub table_name: String,

    /// Base name of the excluded-objects table, without extension.
    pub excluded_table_name: String,

    /// Folder receiving one ROI archive per image.
    pub roi_folder_name: String,

    /// Whether to append the output identifier column.
    pub include_output_names: bool,
}

impl ExportOptions {
    /// Take file names and columns from the export configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            table_name: config.table_name.clone(),
            excluded_table_name: config.excluded_table_name.clone(),
            roi_folder_name: config.roi_folder_name.clone(),
            include_output_names: config.include_output_names,
        }
    }
}

/// Result of an export operation.
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Number of images with output.
    pub images_exported: usize,

    /// Number of rows or outlines written.
    pub records_exported: usize,

    /// Warnings generated during export (e.g., skipped outlines).
    pub warnings: Vec<FormatWarning>,

    /// Files created during export.
    pub files_created: Vec<PathBuf>,
}

impl ExportResult {
    /// Create a new export result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning to the result.
    pub fn add_warning(&mut self, warning: FormatWarning) {
        self.warnings.push(warning);
    }

    /// Check if there were any warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Warning generated while writing a dataset.
#[derive(Debug, Clone)]
pub struct FormatWarning {
    /// Image this warning relates to (if applicable).
    pub image: Option<String>,

    /// Human-readable warning message.
    pub message: String,

    /// Severity level of the warning.
    pub severity: WarningSeverity,
}

impl FormatWarning {
    /// Create a new warning.
    pub fn new(message: impl Into<String>, severity: WarningSeverity) -> Self {
        Self {
            image: None,
            message: message.into(),
            severity,
        }
    }

    /// Create an info-level warning.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, WarningSeverity::Info)
    }

    /// Create a warning-level warning.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, WarningSeverity::Warning)
    }

    /// Set the image this warning relates to.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// Severity level for format warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    /// Informational message, not a problem.
    Info,
    /// Warning that something was skipped or modified.
    Warning,
}

/// Write rendered files below `dir`, recording them in `result`.
pub(crate) fn write_rendered(
    dir: &Path,
    files: Vec<RenderedFile>,
    result: &mut ExportResult,
) -> Result<(), FormatError> {
    for file in files {
        let path = dir.join(&file.path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &file.contents)?;
        log::debug!("Wrote {:?} ({} bytes)", path, file.contents.len());
        result.files_created.push(path);
    }
    Ok(())
}
