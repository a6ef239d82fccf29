//! Pointer strokes to connect and disconnect decisions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::LabelId;
use crate::registry::Registry;

/// Size of the surface the path was recorded on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// How a stroke should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrokeAction {
    /// Disconnect when the hits are exactly one group's members, else connect.
    #[default]
    Auto,
    /// Always connect the hits.
    Connect,
    /// Disconnect every group the hits belong to.
    Disconnect,
}

/// What a stroke resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeDecision {
    Connect(Vec<LabelId>),
    /// Merged labels of the groups to dissolve
    Disconnect(Vec<LabelId>),
    Ignore(&'static str),
}

/// Map display-space points to `(row, col)` grid cells inside `dims`.
fn to_grid(path: &[(f64, f64)], display: DisplaySize, dims: (usize, usize)) -> BTreeSet<(usize, usize)> {
    let (rows, cols) = dims;
    if !(display.width > 0.0 && display.height > 0.0) {
        log::warn!("Stroke ignored: display size {:?} is empty", display);
        return BTreeSet::new();
    }
    let sx = cols as f64 / display.width;
    let sy = rows as f64 / display.height;
    path.iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite() && *x >= 0.0 && *y >= 0.0)
        .map(|(x, y)| ((y * sy).floor() as usize, (x * sx).floor() as usize))
        .filter(|&(r, c)| r < rows && c < cols)
        .collect()
}

/// Labels of active regions under any point of the path.
pub fn hit_regions(registry: &Registry, path: &[(f64, f64)], display: DisplaySize) -> BTreeSet<LabelId> {
    let cells = to_grid(path, display, registry.dims());
    let mut hits = BTreeSet::new();
    for region in registry.active_regions() {
        if cells.iter().any(|&(r, c)| region.mask.get(r, c)) {
            log::trace!("{}: stroke hit {}", registry.image_name(), region.label);
            hits.insert(region.label.clone());
        }
    }
    hits
}

/// Resolve a hit set against the registry's groups.
pub fn interpret(registry: &Registry, hits: &BTreeSet<LabelId>, action: StrokeAction) -> StrokeDecision {
    if hits.len() < 2 {
        return StrokeDecision::Ignore("fewer than two regions touched");
    }

    let mut touched_groups: BTreeMap<LabelId, bool> = BTreeMap::new();
    for hit in hits {
        if let Some(group) = registry.group_of(hit) {
            touched_groups
                .entry(group.label())
                .or_insert_with(|| &group.members == hits);
        }
    }

    match action {
        StrokeAction::Connect => StrokeDecision::Connect(hits.iter().cloned().collect()),
        StrokeAction::Disconnect if touched_groups.is_empty() => {
            StrokeDecision::Ignore("no grouped region touched")
        }
        StrokeAction::Disconnect => StrokeDecision::Disconnect(touched_groups.into_keys().collect()),
        StrokeAction::Auto => match touched_groups.iter().find(|(_, exact)| **exact) {
            Some((label, _)) => StrokeDecision::Disconnect(vec![label.clone()]),
            None => StrokeDecision::Connect(hits.iter().cloned().collect()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Mask;

    fn label(n: u32) -> LabelId {
        LabelId::Integer(n)
    }

    /// Three 4x4 squares at columns 0, 10 and 20 of a 10x30 grid.
    fn registry() -> Registry {
        let mut reg = Registry::new("X", (10, 30), None);
        for i in 0..3u32 {
            let mask = Mask::with_rect(10, 30, 3, 10 * i as usize, 4, 4);
            reg.insert_segmented(i + 1, mask, None).unwrap();
        }
        reg
    }

    fn across(cols: &[f64]) -> Vec<(f64, f64)> {
        cols.iter().map(|&x| (x, 4.0)).collect()
    }

    #[test]
    fn test_hits_with_scaling() {
        let reg = registry();
        // Display is twice the grid size.
        let path: Vec<(f64, f64)> = vec![(2.0, 8.0), (22.0, 8.0)];
        let hits = hit_regions(&reg, &path, DisplaySize::new(60.0, 20.0));
        assert_eq!(hits, BTreeSet::from([label(1), label(2)]));
    }

    #[test]
    fn test_inactive_not_hit() {
        let mut reg = registry();
        reg.toggle(&label(2)).unwrap();
        let hits = hit_regions(&reg, &across(&[1.0, 11.0, 21.0]), DisplaySize::new(30.0, 10.0));
        assert_eq!(hits, BTreeSet::from([label(1), label(3)]));
    }

    #[test]
    fn test_out_of_range_points_ignored() {
        let reg = registry();
        let path = vec![(-5.0, 4.0), (500.0, 4.0), (f64::NAN, 1.0)];
        assert!(hit_regions(&reg, &path, DisplaySize::new(30.0, 10.0)).is_empty());
        assert!(hit_regions(&reg, &across(&[1.0]), DisplaySize::new(0.0, 10.0)).is_empty());
    }

    #[test]
    fn test_single_hit_ignored() {
        let reg = registry();
        let hits = BTreeSet::from([label(1)]);
        assert!(matches!(
            interpret(&reg, &hits, StrokeAction::Auto),
            StrokeDecision::Ignore(_)
        ));
    }

    #[test]
    fn test_exact_group_disconnects() {
        let mut reg = registry();
        reg.connect(&[label(1), label(2)], true).unwrap();
        let hits = BTreeSet::from([label(1), label(2)]);
        assert_eq!(
            interpret(&reg, &hits, StrokeAction::Auto),
            StrokeDecision::Disconnect(vec![LabelId::merged(&[label(1), label(2)])])
        );
    }

    #[test]
    fn test_group_plus_extra_connects() {
        let mut reg = registry();
        reg.connect(&[label(1), label(2)], true).unwrap();
        let hits = BTreeSet::from([label(1), label(2), label(3)]);
        assert_eq!(
            interpret(&reg, &hits, StrokeAction::Auto),
            StrokeDecision::Connect(vec![label(1), label(2), label(3)])
        );
    }

    #[test]
    fn test_explicit_modes() {
        let mut reg = registry();
        reg.connect(&[label(1), label(2)], true).unwrap();
        let hits = BTreeSet::from([label(1), label(2)]);
        assert!(matches!(
            interpret(&reg, &hits, StrokeAction::Connect),
            StrokeDecision::Connect(_)
        ));
        let loose = BTreeSet::from([label(2), label(3)]);
        assert_eq!(
            interpret(&reg, &loose, StrokeAction::Disconnect),
            StrokeDecision::Disconnect(vec![LabelId::merged(&[label(1), label(2)])])
        );
    }
}
