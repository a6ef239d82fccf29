//! Reconciliation of live registries into the final dataset.

use std::collections::HashMap;

use web_time::Instant;

use super::outline::trace_outlines;
use super::record::{ExportRecord, ImageOutlines, OutlineEntry, output_identifier};
use super::units::{PixelRate, calibrate};
use crate::config::ExportConfig;
use crate::error::{CurationError, Result};
use crate::measure::{RegionProperties, measure_mask, measure_texture};
use crate::model::{LabelId, Mask, RegionKey};
use crate::registry::Registry;

/// Final output of an export run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// One row per reconciled region
    pub records: Vec<ExportRecord>,
    /// Rows for regions the curator deactivated
    pub excluded: Vec<ExportRecord>,
    /// Outline polygons per image, for records with a resolvable mask
    pub outlines: Vec<ImageOutlines>,
    /// Recoverable problems met while reconciling
    pub issues: Vec<CurationError>,
}

impl Dataset {
    /// Whether any record carries intensity descriptors.
    pub fn has_intensity(&self) -> bool {
        self.records
            .iter()
            .chain(&self.excluded)
            .any(|r| r.properties.values().intensity.is_some())
    }

    /// Whether any record carries texture descriptors.
    pub fn has_texture(&self) -> bool {
        self.records
            .iter()
            .chain(&self.excluded)
            .any(|r| r.texture.is_some())
    }
}

/// A region or group selected for export, before conversion.
struct Candidate<'a> {
    key: RegionKey,
    properties: Option<&'a RegionProperties>,
    mask: Option<&'a Mask>,
}

/// Select the rows of one registry: `(included, excluded)`.
///
/// Included rows are active ungrouped regions (pipeline and restored first,
/// then drawn) followed by active groups. Grouped regions are never
/// reported individually, whatever the group's state.
fn select(registry: &Registry) -> (Vec<Candidate<'_>>, Vec<Candidate<'_>>) {
    let image = registry.image_name();
    let mut included = Vec::new();
    let mut drawn = Vec::new();
    let mut excluded = Vec::new();

    for region in registry.regions() {
        if registry.is_grouped(&region.label) {
            continue;
        }
        let candidate = Candidate {
            key: region.key(),
            properties: region.properties.as_ref(),
            mask: Some(&region.mask),
        };
        match (region.active, region.label.is_drawn()) {
            (false, _) => excluded.push(candidate),
            (true, false) => included.push(candidate),
            (true, true) => drawn.push(candidate),
        }
    }

    let mut groups = Vec::new();
    for group in registry.groups() {
        let candidate = Candidate {
            key: RegionKey::new(image, group.label()),
            properties: group.properties.as_ref(),
            mask: Some(&group.mask),
        };
        if group.active {
            groups.push(candidate);
        } else {
            excluded.push(candidate);
        }
    }

    included.extend(groups);
    included.extend(drawn);
    (included, excluded)
}

/// Keep the last candidate per `(image, label)`, at the position of the first.
fn dedup_keep_last(candidates: Vec<Candidate<'_>>) -> Vec<Candidate<'_>> {
    let mut index: HashMap<RegionKey, usize> = HashMap::new();
    let mut out: Vec<Candidate<'_>> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match index.get(&candidate.key) {
            Some(&i) => {
                log::warn!("Duplicate export row for {}, keeping the latest", candidate.key);
                out[i] = candidate;
            }
            None => {
                index.insert(candidate.key.clone(), out.len());
                out.push(candidate);
            }
        }
    }
    out
}

/// Builds the final dataset from registries.
pub struct Reconciler<'a> {
    config: &'a ExportConfig,
    rate: PixelRate,
}

impl<'a> Reconciler<'a> {
    /// Validate the conversion rate up front; an invalid rate blocks the export.
    pub fn new(config: &'a ExportConfig) -> Result<Self> {
        let rate = PixelRate::new(config.pixel_rate)?;
        Ok(Self { config, rate })
    }

    /// Reconcile the given registries, in order.
    pub fn reconcile<'r>(&self, registries: impl IntoIterator<Item = &'r Registry>) -> Dataset {
        let start = Instant::now();
        let mut dataset = Dataset::default();
        let mut included = Vec::new();
        let mut excluded = Vec::new();
        let mut by_image: HashMap<String, &Registry> = HashMap::new();

        for registry in registries {
            let (inc, exc) = select(registry);
            included.extend(inc);
            excluded.extend(exc);
            by_image.insert(registry.image_name().to_string(), registry);
        }

        let included = dedup_keep_last(included);
        let excluded = dedup_keep_last(excluded);

        // Outlines keep the order images were first seen in.
        let mut outline_index: HashMap<String, usize> = HashMap::new();

        for candidate in &included {
            let registry = by_image.get(&candidate.key.image).copied();
            let Some(record) = self.to_record(candidate, registry, &mut dataset.issues) else {
                continue;
            };
            match candidate.mask.filter(|m| !m.is_empty()) {
                Some(mask) => {
                    let polygons: Vec<_> = trace_outlines(mask)
                        .into_iter()
                        .filter(|p| p.len() >= self.config.min_outline_points)
                        .collect();
                    if polygons.is_empty() {
                        log::debug!("{}: no outline long enough to keep", candidate.key);
                    } else {
                        let slot = *outline_index
                            .entry(candidate.key.image.clone())
                            .or_insert_with(|| {
                                dataset.outlines.push(ImageOutlines {
                                    image_name: candidate.key.image.clone(),
                                    entries: Vec::new(),
                                });
                                dataset.outlines.len() - 1
                            });
                        dataset.outlines[slot].entries.push(OutlineEntry {
                            name: output_identifier(&candidate.key.image, &candidate.key.label),
                            polygons,
                        });
                    }
                }
                None => {
                    let err = CurationError::UnresolvedMask {
                        image: candidate.key.image.clone(),
                        label: candidate.key.label.clone(),
                    };
                    log::warn!("{}, outline skipped", err);
                    dataset.issues.push(err);
                }
            }
            dataset.records.push(record);
        }

        for candidate in &excluded {
            let registry = by_image.get(&candidate.key.image).copied();
            if let Some(record) = self.to_record(candidate, registry, &mut dataset.issues) {
                dataset.excluded.push(record);
            }
        }

        log::info!(
            "Reconciled {} record(s), {} excluded, {} outline set(s) in {:.2?}",
            dataset.records.len(),
            dataset.excluded.len(),
            dataset.outlines.len(),
            start.elapsed()
        );
        dataset
    }

    fn to_record(
        &self,
        candidate: &Candidate<'_>,
        registry: Option<&Registry>,
        issues: &mut Vec<CurationError>,
    ) -> Option<ExportRecord> {
        let measured;
        let properties = match candidate.properties {
            Some(props) => props,
            None => {
                let Some(mask) = candidate.mask else {
                    let err = CurationError::UnresolvedMask {
                        image: candidate.key.image.clone(),
                        label: candidate.key.label.clone(),
                    };
                    log::warn!("{}, row dropped", err);
                    issues.push(err);
                    return None;
                };
                match measure_mask(mask, registry.and_then(Registry::intensity)) {
                    Ok(props) => {
                        measured = props;
                        &measured
                    }
                    Err(err) => {
                        log::warn!("{}: {}, row dropped", candidate.key, err);
                        issues.push(err);
                        return None;
                    }
                }
            }
        };

        let texture = match (&self.config.texture, registry.and_then(Registry::intensity), candidate.mask) {
            (Some(texture), Some(intensity), Some(mask)) => {
                let features = measure_texture(mask, intensity, texture);
                if features.is_none() {
                    log::debug!("{}: region too small for texture descriptors", candidate.key);
                }
                features
            }
            _ => None,
        };

        let output_name = self
            .config
            .include_output_names
            .then(|| output_identifier(&candidate.key.image, &candidate.key.label));

        Some(ExportRecord {
            image_name: candidate.key.image.clone(),
            label: candidate.key.label.clone(),
            properties: calibrate(properties, self.rate),
            texture,
            condition: self.config.condition.clone(),
            replicate: self.config.replicate.clone(),
            output_name,
        })
    }
}

/// Reconcile registries with one call.
pub fn reconcile<'r>(
    registries: impl IntoIterator<Item = &'r Registry>,
    config: &ExportConfig,
) -> Result<Dataset> {
    Ok(Reconciler::new(config)?.reconcile(registries))
}

/// Labels of the included rows for one image, in output order.
pub fn exported_labels<'d>(dataset: &'d Dataset, image: &str) -> Vec<&'d LabelId> {
    dataset
        .records
        .iter()
        .filter(|r| r.image_name == image)
        .map(|r| &r.label)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(n: u32) -> LabelId {
        LabelId::Integer(n)
    }

    fn registry(name: &str, n: u32) -> Registry {
        let mut registry = Registry::new(name, (30, 60), None);
        for i in 0..n {
            let mask = Mask::with_rect(30, 60, 5, 2 + 12 * i as usize, 10, 10);
            registry.insert_segmented(i + 1, mask, None).unwrap();
        }
        registry
    }

    fn config() -> ExportConfig {
        ExportConfig {
            condition: "ctrl".to_string(),
            replicate: "1".to_string(),
            ..Default::default()
        }
    }

    fn render(labels: Vec<&LabelId>) -> Vec<String> {
        labels.into_iter().map(LabelId::render).collect()
    }

    #[test]
    fn test_group_supersedes_members() {
        let mut reg = registry("X", 3);
        reg.connect(&[label(1), label(2)], true).unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(render(exported_labels(&dataset, "X")), vec!["3", "(1,2)"]);
    }

    #[test]
    fn test_inactive_group_members_not_reported() {
        let mut reg = registry("X", 3);
        reg.connect(&[label(1), label(2)], true).unwrap();
        reg.toggle(&label(1)).unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(render(exported_labels(&dataset, "X")), vec!["3"]);
        assert_eq!(dataset.excluded.len(), 1);
        assert_eq!(dataset.excluded[0].label.render(), "(1,2)");
    }

    #[test]
    fn test_inactive_region_goes_to_excluded() {
        let mut reg = registry("X", 2);
        reg.toggle(&label(2)).unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(render(exported_labels(&dataset, "X")), vec!["1"]);
        assert_eq!(dataset.excluded[0].label, label(2));
    }

    #[test]
    fn test_units_applied_once() {
        let reg = registry("X", 1);
        let dataset = reconcile([&reg], &config()).unwrap();
        let props = dataset.records[0].properties.values();
        assert!((props.area - 100.0 * 0.18 * 0.18).abs() < 1e-9);
        assert_eq!(dataset.records[0].condition, "ctrl");
        assert_eq!(
            dataset.records[0].output_name.as_deref(),
            Some("X_label1.roi")
        );
    }

    #[test]
    fn test_invalid_rate_blocks_export() {
        let reg = registry("X", 1);
        let mut cfg = config();
        cfg.pixel_rate = 3.0;
        assert_eq!(
            reconcile([&reg], &cfg).err(),
            Some(CurationError::InvalidConversionRate(3.0))
        );
    }

    #[test]
    fn test_dedup_keeps_latest_registry() {
        let first = registry("X", 1);
        let mut second = registry("X", 1);
        second
            .insert_segmented(1, Mask::with_rect(30, 60, 0, 0, 4, 4), None)
            .unwrap();
        let dataset = reconcile([&first, &second], &config()).unwrap();
        assert_eq!(dataset.records.len(), 1);
        let area = dataset.records[0].properties.values().area;
        assert!((area - 16.0 * 0.18 * 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_outlines_follow_records() {
        let mut reg = registry("img.tif", 2);
        reg.add_drawn(Mask::with_rect(30, 60, 20, 40, 6, 6)).unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(dataset.outlines.len(), 1);
        let names: Vec<&str> = dataset.outlines[0]
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["img_label1.roi", "img_label2.roi", "img_label_drawn_1.roi"]
        );
    }

    #[test]
    fn test_texture_only_when_enabled() {
        let intensity =
            crate::model::IntensityImage::from_shape_fn((30, 60), |(r, c)| ((r * 7 + c * 3) % 11) as f32);
        let mut reg = Registry::new("X", (30, 60), Some(std::sync::Arc::new(intensity)));
        reg.insert_segmented(1, Mask::with_rect(30, 60, 5, 2, 10, 10), None)
            .unwrap();
        reg.insert_segmented(2, Mask::with_rect(30, 60, 5, 20, 1, 1), None)
            .unwrap();

        let plain = reconcile([&reg], &config()).unwrap();
        assert!(!plain.has_texture());

        let mut cfg = config();
        cfg.texture = Some(crate::config::TextureConfig::default());
        let textured = reconcile([&reg], &cfg).unwrap();
        assert!(textured.has_texture());
        assert!(textured.records[0].texture.is_some());
        assert!(textured.records[1].texture.is_none());

        let without_intensity = reconcile([&registry("Y", 1)], &cfg).unwrap();
        assert!(!without_intensity.has_texture());
    }

    #[test]
    fn test_left_edge_region_keeps_outline() {
        let mut reg = Registry::new("X", (30, 60), None);
        reg.insert_segmented(1, Mask::with_rect(30, 60, 5, 0, 10, 10), None)
            .unwrap();
        reg.insert_segmented(2, Mask::with_rect(30, 60, 5, 20, 10, 10), None)
            .unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(dataset.records.len(), 2);
        assert!(dataset.issues.is_empty());
        let names: Vec<&str> = dataset.outlines[0]
            .entries
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["X_label1.roi", "X_label2.roi"]);
        let xs = dataset.outlines[0].entries[0].polygons[0].iter().map(|p| p.0);
        assert_eq!(xs.min(), Some(0));
    }

    #[test]
    fn test_short_outlines_dropped() {
        let mut reg = Registry::new("X", (10, 10), None);
        reg.insert_segmented(1, Mask::with_rect(10, 10, 4, 4, 1, 2), None)
            .unwrap();
        let dataset = reconcile([&reg], &config()).unwrap();
        assert_eq!(dataset.records.len(), 1);
        assert!(dataset.outlines.is_empty());
    }
}
