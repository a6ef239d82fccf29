//! Reconciled export records.

use std::path::Path;

use serde::Serialize;

use super::units::CalibratedProperties;
use crate::measure::TextureFeatures;
use crate::model::LabelId;

/// Closed polygon as `(x, y)` pixel vertices.
pub type Polygon = Vec<(i32, i32)>;

/// One row of the final dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub image_name: String,
    pub label: LabelId,
    /// Physical-unit descriptors
    pub properties: CalibratedProperties,
    /// Co-occurrence texture, when enabled and an intensity image exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<TextureFeatures>,
    pub condition: String,
    pub replicate: String,
    /// Rendered output identifier, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

/// Outline polygons of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    /// Output identifier of the record, ending in `.roi`
    pub name: String,
    pub polygons: Vec<Polygon>,
}

/// All outlines of one image, destined for one archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutlines {
    pub image_name: String,
    pub entries: Vec<OutlineEntry>,
}

impl ImageOutlines {
    pub fn polygon_count(&self) -> usize {
        self.entries.iter().map(|e| e.polygons.len()).sum()
    }
}

/// Image name without its extension.
pub fn image_stem(image_name: &str) -> &str {
    Path::new(image_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_name)
}

/// Output identifier for a record: `<stem>_label<N>.roi`,
/// `<stem>_label_(...)_merged.roi` or `<stem>_label_drawn_<N>.roi`.
pub fn output_identifier(image_name: &str, label: &LabelId) -> String {
    let stem = image_stem(image_name);
    match label {
        LabelId::Integer(n) => format!("{}_label{}.roi", stem, n),
        LabelId::Merged(_) => format!("{}_label_{}_merged.roi", stem, label),
        LabelId::Drawn(_) => format!("{}_label_{}.roi", stem, label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_identifier_variants() {
        assert_eq!(
            output_identifier("img01.tif", &LabelId::Integer(4)),
            "img01_label4.roi"
        );
        assert_eq!(
            output_identifier(
                "img01.tif",
                &LabelId::merged(&[LabelId::Integer(2), LabelId::Integer(1)])
            ),
            "img01_label_(1,2)_merged.roi"
        );
        assert_eq!(
            output_identifier("img01", &LabelId::Drawn(3)),
            "img01_label_drawn_3.roi"
        );
    }
}
