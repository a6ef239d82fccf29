//! CSV results table.
//!
//! Writes one row per reconciled record in `<table_name>.csv`, and the
//! curator-excluded rows in `<excluded_table_name>.csv` with the same columns.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::export::{Dataset, ExportRecord};
use crate::measure::HARALICK_FEATURES;
use crate::format::error::FormatError;
use crate::format::traits::{
    DatasetFormat, ExportOptions, ExportResult, FormatWarning, RenderedFile, write_rendered,
};

/// Descriptor columns, in output order.
const DESCRIPTOR_COLUMNS: [&str; 15] = [
    "area",
    "bbox_area",
    "area_convex",
    "perimeter",
    "perimeter_crofton",
    "eccentricity",
    "extent",
    "major_axis_length",
    "minor_axis_length",
    "equivalent_diameter_area",
    "feret_diameter_max",
    "orientation",
    "solidity",
    "centroid_y",
    "centroid_x",
];

const INTENSITY_COLUMNS: [&str; 3] = ["mean_intensity", "max_intensity", "min_intensity"];

/// CSV table format.
///
/// Intensity and `Haralick.*` texture columns appear only when some record
/// carries them; the `roi_name` column only when output names are requested.
pub struct TableFormat;

/// Column layout shared by both tables of one export.
struct Layout {
    intensity: bool,
    texture: bool,
    output_names: bool,
}

impl Layout {
    fn header(&self) -> Vec<String> {
        let mut columns: Vec<String> = ["image_name", "label"]
            .into_iter()
            .chain(DESCRIPTOR_COLUMNS)
            .map(String::from)
            .collect();
        if self.intensity {
            columns.extend(INTENSITY_COLUMNS.map(String::from));
        }
        if self.texture {
            for name in HARALICK_FEATURES {
                columns.push(format!("Haralick.{}.Mean", name));
                columns.push(format!("Haralick.{}.Range", name));
            }
        }
        columns.extend(["Condition", "Replicate"].map(String::from));
        if self.output_names {
            columns.push("roi_name".to_string());
        }
        columns
    }

    fn row(&self, record: &ExportRecord) -> Vec<String> {
        let p = record.properties.values();
        let mut fields = vec![record.image_name.clone(), record.label.to_string()];
        fields.extend(
            [
                p.area,
                p.bbox_area,
                p.convex_area,
                p.perimeter,
                p.perimeter_crofton,
                p.eccentricity,
                p.extent,
                p.major_axis_length,
                p.minor_axis_length,
                p.equivalent_diameter,
                p.feret_diameter_max,
                p.orientation,
                p.solidity,
                p.centroid_y,
                p.centroid_x,
            ]
            .iter()
            .map(|v| v.to_string()),
        );
        if self.intensity {
            match &p.intensity {
                Some(stats) => fields.extend([stats.mean, stats.max, stats.min].iter().map(|v| v.to_string())),
                None => fields.extend(std::iter::repeat_n(String::new(), 3)),
            }
        }
        if self.texture {
            match &record.texture {
                Some(texture) => {
                    for (_, mean, range) in texture.iter() {
                        fields.push(mean.to_string());
                        fields.push(range.to_string());
                    }
                }
                None => fields.extend(std::iter::repeat_n(String::new(), 2 * HARALICK_FEATURES.len())),
            }
        }
        fields.push(record.condition.clone());
        fields.push(record.replicate.clone());
        if self.output_names {
            fields.push(record.output_name.clone().unwrap_or_default());
        }
        fields
    }
}

/// Quote a field when it holds a separator, a quote or a line break.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_line<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    let line: Vec<String> = fields.iter().map(|f| escape(f.as_ref())).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

fn render_table(layout: &Layout, records: &[ExportRecord]) -> Vec<u8> {
    let mut out = String::new();
    write_line(&mut out, &layout.header());
    for record in records {
        write_line(&mut out, &layout.row(record));
    }
    out.into_bytes()
}

fn table_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}.csv", name))
}

impl DatasetFormat for TableFormat {
    fn id(&self) -> &'static str {
        "csv"
    }

    fn display_name(&self) -> &'static str {
        "CSV table"
    }

    fn export_to_bytes(
        &self,
        dataset: &Dataset,
        options: &ExportOptions,
    ) -> Result<Vec<RenderedFile>, FormatError> {
        let layout = Layout {
            intensity: dataset.has_intensity(),
            texture: dataset.has_texture(),
            output_names: options.include_output_names,
        };

        let mut files = vec![RenderedFile::new(
            table_path(&options.table_name),
            render_table(&layout, &dataset.records),
        )];
        if !dataset.excluded.is_empty() {
            files.push(RenderedFile::new(
                table_path(&options.excluded_table_name),
                render_table(&layout, &dataset.excluded),
            ));
        }
        Ok(files)
    }

    fn export(
        &self,
        dataset: &Dataset,
        dir: &Path,
        options: &ExportOptions,
    ) -> Result<ExportResult, FormatError> {
        log::info!("Exporting CSV tables to {:?}", dir);
        std::fs::create_dir_all(dir)?;

        let mut result = ExportResult::new();
        write_rendered(dir, self.export_to_bytes(dataset, options)?, &mut result)?;

        let stale = dir.join(table_path(&options.excluded_table_name));
        if dataset.excluded.is_empty() && stale.exists() {
            std::fs::remove_file(&stale)?;
            log::info!("Removed stale {:?}", stale);
            result.add_warning(FormatWarning::info(format!(
                "removed stale {}",
                stale.display()
            )));
        }

        result.records_exported = dataset.records.len();
        result.images_exported = dataset
            .records
            .iter()
            .map(|r| r.image_name.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        log::info!(
            "CSV export complete: {} row(s), {} excluded",
            dataset.records.len(),
            dataset.excluded.len()
        );
        Ok(result)
    }
}
