//! ImageJ region-of-interest archives.
//!
//! One `<image stem>.zip` per image, holding one freehand `.roi` entry per
//! outline polygon. Entries use the big-endian ImageJ layout: a 64-byte
//! header, x then y coordinates relative to the bounding box, and a second
//! 64-byte header followed by the UTF-16 name.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::CurationError;
use crate::export::{Dataset, ImageOutlines, Polygon, image_stem};
use crate::format::error::FormatError;
use crate::format::traits::{
    DatasetFormat, ExportOptions, ExportResult, FormatWarning, RenderedFile, write_rendered,
};

const MAGIC: &[u8; 4] = b"Iout";
const VERSION: u16 = 228;
const FREEHAND: u8 = 7;
const HEADER_SIZE: usize = 64;
const HEADER2_SIZE: usize = 64;

// Header field offsets.
const OFFSET_VERSION: usize = 4;
const OFFSET_TYPE: usize = 6;
const OFFSET_TOP: usize = 8;
const OFFSET_COUNT: usize = 16;
const OFFSET_HEADER2: usize = 60;
const OFFSET_NAME: usize = 16;
const OFFSET_NAME_LENGTH: usize = 20;

/// ImageJ ROI archive format.
pub struct RoiArchiveFormat;

fn overflow(entry: &str, value: i64) -> FormatError {
    FormatError::CoordinateOverflow {
        entry: entry.to_string(),
        value,
    }
}

fn to_i16(entry: &str, value: i32) -> Result<i16, FormatError> {
    i16::try_from(value).map_err(|_| overflow(entry, value as i64))
}

/// Encode one polygon as a freehand ImageJ ROI named `name`.
pub fn encode_roi(name: &str, polygon: &Polygon) -> Result<Vec<u8>, FormatError> {
    if polygon.is_empty() {
        return Err(FormatError::invalid_format(format!("'{}' has no vertices", name)));
    }
    let count = u16::try_from(polygon.len()).map_err(|_| {
        FormatError::invalid_format(format!("'{}' has {} vertices", name, polygon.len()))
    })?;

    let left = polygon.iter().map(|p| p.0).min().unwrap_or(0);
    let right = polygon.iter().map(|p| p.0).max().unwrap_or(0);
    let top = polygon.iter().map(|p| p.1).min().unwrap_or(0);
    let bottom = polygon.iter().map(|p| p.1).max().unwrap_or(0);

    let mut bytes = vec![0u8; HEADER_SIZE];
    bytes[..4].copy_from_slice(MAGIC);
    bytes[OFFSET_VERSION..OFFSET_VERSION + 2].copy_from_slice(&VERSION.to_be_bytes());
    bytes[OFFSET_TYPE] = FREEHAND;
    for (i, bound) in [top, left, bottom, right].into_iter().enumerate() {
        let at = OFFSET_TOP + 2 * i;
        bytes[at..at + 2].copy_from_slice(&to_i16(name, bound)?.to_be_bytes());
    }
    bytes[OFFSET_COUNT..OFFSET_COUNT + 2].copy_from_slice(&count.to_be_bytes());

    for &(x, _) in polygon {
        bytes.extend_from_slice(&to_i16(name, x - left)?.to_be_bytes());
    }
    for &(_, y) in polygon {
        bytes.extend_from_slice(&to_i16(name, y - top)?.to_be_bytes());
    }

    let header2 = bytes.len();
    let name_units: Vec<u16> = name.encode_utf16().collect();
    bytes[OFFSET_HEADER2..OFFSET_HEADER2 + 4].copy_from_slice(&(header2 as u32).to_be_bytes());
    bytes.resize(header2 + HEADER2_SIZE, 0);
    let name_offset = (header2 + HEADER2_SIZE) as u32;
    bytes[header2 + OFFSET_NAME..header2 + OFFSET_NAME + 4].copy_from_slice(&name_offset.to_be_bytes());
    bytes[header2 + OFFSET_NAME_LENGTH..header2 + OFFSET_NAME_LENGTH + 4]
        .copy_from_slice(&(name_units.len() as u32).to_be_bytes());
    for unit in name_units {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Ok(bytes)
}

/// Entry name for the `index`-th polygon of an outline: `x.roi`, `x-2.roi`...
fn entry_name(name: &str, index: usize) -> String {
    if index == 0 {
        return name.to_string();
    }
    let base = name.strip_suffix(".roi").unwrap_or(name);
    format!("{}-{}.roi", base, index + 1)
}

/// Build the archive of one image, or `None` when no entry could be written.
///
/// Entries with a duplicate name or an outline the ROI layout cannot hold
/// are skipped with a warning.
pub fn encode_archive(
    outlines: &ImageOutlines,
    result: &mut ExportResult,
) -> Result<Option<Vec<u8>>, FormatError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut seen: HashSet<String> = HashSet::new();
    let mut written = 0;

    for entry in &outlines.entries {
        for (index, polygon) in entry.polygons.iter().enumerate() {
            let name = entry_name(&entry.name, index);
            if !seen.insert(name.clone()) {
                log::warn!("{}: duplicate ROI entry {}, skipped", outlines.image_name, name);
                result.add_warning(
                    FormatWarning::warning(format!("duplicate ROI entry {}", name))
                        .with_image(&outlines.image_name),
                );
                continue;
            }
            let roi_name = name.strip_suffix(".roi").unwrap_or(&name);
            let bytes = match encode_roi(roi_name, polygon) {
                Ok(bytes) => bytes,
                Err(e @ (FormatError::CoordinateOverflow { .. } | FormatError::InvalidFormat { .. })) => {
                    log::warn!("{}: {}, entry skipped", outlines.image_name, e);
                    result.add_warning(
                        FormatWarning::warning(format!("{}, entry skipped", e))
                            .with_image(&outlines.image_name),
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&bytes)?;
            result.records_exported += 1;
            written += 1;
        }
    }

    let bytes = zip.finish()?.into_inner();
    Ok((written > 0).then_some(bytes))
}

fn archive_path(folder: &str, image_name: &str) -> PathBuf {
    Path::new(folder).join(format!("{}.zip", image_stem(image_name)))
}

fn render(dataset: &Dataset, options: &ExportOptions, result: &mut ExportResult) -> Result<Vec<RenderedFile>, FormatError> {
    for issue in &dataset.issues {
        if let CurationError::UnresolvedMask { image, .. } = issue {
            result.add_warning(FormatWarning::warning(issue.to_string()).with_image(image));
        }
    }

    let mut files = Vec::with_capacity(dataset.outlines.len());
    for outlines in &dataset.outlines {
        if outlines.entries.is_empty() {
            continue;
        }
        let Some(bytes) = encode_archive(outlines, result)? else {
            continue;
        };
        files.push(RenderedFile::new(
            archive_path(&options.roi_folder_name, &outlines.image_name),
            bytes,
        ));
        result.images_exported += 1;
    }
    Ok(files)
}

impl DatasetFormat for RoiArchiveFormat {
    fn id(&self) -> &'static str {
        "imagej-roi"
    }

    fn display_name(&self) -> &'static str {
        "ImageJ ROI archive"
    }

    fn export_to_bytes(
        &self,
        dataset: &Dataset,
        options: &ExportOptions,
    ) -> Result<Vec<RenderedFile>, FormatError> {
        render(dataset, options, &mut ExportResult::new())
    }

    fn export(
        &self,
        dataset: &Dataset,
        dir: &Path,
        options: &ExportOptions,
    ) -> Result<ExportResult, FormatError> {
        let folder = dir.join(&options.roi_folder_name);
        log::info!("Exporting ROI archives to {:?}", folder);

        // Previous archives are kept when rendering fails.
        let mut result = ExportResult::new();
        let files = render(dataset, options, &mut result)?;
        if folder.exists() {
            std::fs::remove_dir_all(&folder)?;
        }
        std::fs::create_dir_all(&folder)?;
        write_rendered(dir, files, &mut result)?;

        log::info!(
            "ROI export complete: {} outline(s) in {} archive(s)",
            result.records_exported,
            result.images_exported
        );
        Ok(result)
    }
}
