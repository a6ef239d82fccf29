//! Label masks and intensity channels stored on disk by an external segmenter.
//!
//! A directory holds, per image stem:
//! - `<stem>_labels.npy` or `<stem>_labels.png`: the label grid (required)
//! - `<stem>.npy`: intensity channel (optional)
//! - `<stem>_nucleus.npy`: nucleus channel for the nucleus filter (optional)

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::ReadNpyExt;

use super::PipelineError;
use super::segmenter::{CancelToken, Segmenter, SourceImage};
use crate::model::{IntensityImage, LabelGrid};

const LABELS_NPY: &str = "_labels.npy";
const LABELS_PNG: &str = "_labels.png";
const NUCLEUS_NPY: &str = "_nucleus.npy";

/// Segmenter backed by precomputed label files in one directory.
#[derive(Debug, Clone)]
pub struct MaskDirectory {
    root: PathBuf,
}

impl MaskDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Image stems with a label file, sorted by name.
    pub fn stems(&self) -> Result<Vec<String>, PipelineError> {
        let display = self.root.display().to_string();
        let entries = std::fs::read_dir(&self.root).map_err(|e| PipelineError::load(&display, e))?;

        let mut stems = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PipelineError::load(&display, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name
                .strip_suffix(LABELS_NPY)
                .or_else(|| name.strip_suffix(LABELS_PNG))
            {
                stems.push(stem.to_string());
            }
        }
        stems.sort();
        stems.dedup();
        log::info!("Found {} label mask(s) in {:?}", stems.len(), self.root);
        Ok(stems)
    }

    /// Queue every image found, with its optional channels loaded.
    pub fn scan(&self) -> Result<Vec<SourceImage>, PipelineError> {
        let mut images = Vec::new();
        for stem in self.stems()? {
            let mut source = SourceImage::new(stem.clone());
            let intensity = self.root.join(format!("{}.npy", stem));
            if intensity.exists() {
                source = source.with_intensity(load_intensity(&intensity)?);
            }
            let nucleus = self.root.join(format!("{}{}", stem, NUCLEUS_NPY));
            if nucleus.exists() {
                source = source.with_nucleus(load_intensity(&nucleus)?);
            }
            images.push(source);
        }
        Ok(images)
    }
}

impl Segmenter for MaskDirectory {
    fn segment(&self, source: &SourceImage, cancel: &CancelToken) -> Result<LabelGrid, PipelineError> {
        cancel.check()?;
        let npy = self.root.join(format!("{}{}", source.name, LABELS_NPY));
        if npy.exists() {
            return load_label_npy(&npy);
        }
        let png = self.root.join(format!("{}{}", source.name, LABELS_PNG));
        if png.exists() {
            return load_label_png(&png);
        }
        Err(PipelineError::Segmentation(format!(
            "no label mask for '{}' in {:?}",
            source.name, self.root
        )))
    }
}

fn read(path: &Path) -> Result<Vec<u8>, PipelineError> {
    std::fs::read(path).map_err(|e| PipelineError::load(path.display().to_string(), e))
}

fn to_label<T>(path: &Path, value: T) -> Result<u32, PipelineError>
where
    T: Copy + std::fmt::Display + TryInto<u32>,
{
    value
        .try_into()
        .map_err(|_| PipelineError::load(path.display().to_string(), format!("invalid label value {}", value)))
}

fn convert_labels<T>(path: &Path, array: Array2<T>) -> Result<LabelGrid, PipelineError>
where
    T: Copy + std::fmt::Display + TryInto<u32>,
{
    let (rows, cols) = array.dim();
    let values = array
        .iter()
        .map(|&v| to_label(path, v))
        .collect::<Result<Vec<u32>, _>>()?;
    Array2::from_shape_vec((rows, cols), values)
        .map_err(|e| PipelineError::load(path.display().to_string(), e))
}

/// Load an integer label grid, accepting the common integer dtypes.
pub fn load_label_npy(path: &Path) -> Result<LabelGrid, PipelineError> {
    let bytes = read(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());

    if let Ok(array) = Array2::<u32>::read_npy(&mut cursor) {
        return Ok(array);
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<i32>::read_npy(&mut cursor) {
        return convert_labels(path, array);
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<i64>::read_npy(&mut cursor) {
        return convert_labels(path, array);
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<u16>::read_npy(&mut cursor) {
        return Ok(array.mapv(u32::from));
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<u8>::read_npy(&mut cursor) {
        return Ok(array.mapv(u32::from));
    }

    Err(PipelineError::load(
        path.display().to_string(),
        "expected a 2D integer array",
    ))
}

/// Load a 8- or 16-bit grayscale PNG whose pixel values are labels.
pub fn load_label_png(path: &Path) -> Result<LabelGrid, PipelineError> {
    let image = image::open(path)
        .map_err(|e| PipelineError::load(path.display().to_string(), e))?
        .into_luma16();
    let (width, height) = image.dimensions();
    Ok(Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        u32::from(image.get_pixel(c as u32, r as u32).0[0])
    }))
}

/// Load a 2D intensity channel as raw `f32` values.
pub fn load_intensity(path: &Path) -> Result<IntensityImage, PipelineError> {
    let bytes = read(path)?;
    let mut cursor = Cursor::new(bytes.as_slice());

    if let Ok(array) = Array2::<f32>::read_npy(&mut cursor) {
        return Ok(array);
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<f64>::read_npy(&mut cursor) {
        return Ok(array.mapv(|v| v as f32));
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<u16>::read_npy(&mut cursor) {
        return Ok(array.mapv(f32::from));
    }
    cursor.set_position(0);
    if let Ok(array) = Array2::<u8>::read_npy(&mut cursor) {
        return Ok(array.mapv(f32::from));
    }

    Err(PipelineError::load(
        path.display().to_string(),
        "expected a 2D numeric array",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use ndarray_npy::WriteNpyExt;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cellcurate-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_npy<T: ndarray_npy::WritableElement>(path: &Path, array: &Array2<T>) {
        let mut bytes = Vec::new();
        array.write_npy(&mut bytes).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_scan_and_segment() {
        let dir = temp_dir("loader");
        let mut labels = Array2::<i32>::zeros((6, 8));
        labels[(2, 3)] = 4;
        write_npy(&dir.join("b_labels.npy"), &labels);
        write_npy(&dir.join("b.npy"), &Array2::<f64>::from_elem((6, 8), 2.5));

        let png: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(5, 4, |x, y| Luma([if x == 1 && y == 2 { 300 } else { 0 }]));
        png.save(dir.join("a_labels.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let masks = MaskDirectory::new(&dir);
        let images = masks.scan().unwrap();
        let names: Vec<&str> = images.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(images[0].intensity.is_none());
        assert_eq!(images[1].intensity.as_ref().map(|i| i[(0, 0)]), Some(2.5));

        let cancel = CancelToken::new();
        let a = masks.segment(&images[0], &cancel).unwrap();
        assert_eq!(a.dim(), (4, 5));
        assert_eq!(a[(2, 1)], 300);
        let b = masks.segment(&images[1], &cancel).unwrap();
        assert_eq!(b[(2, 3)], 4);

        assert!(matches!(
            masks.segment(&SourceImage::new("c"), &cancel),
            Err(PipelineError::Segmentation(_))
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_negative_labels_rejected() {
        let dir = temp_dir("negative");
        let mut labels = Array2::<i32>::zeros((3, 3));
        labels[(1, 1)] = -1;
        let path = dir.join("x_labels.npy");
        write_npy(&path, &labels);
        assert!(matches!(load_label_npy(&path), Err(PipelineError::Load { .. })));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
