//! Registry invariants under long deterministic edit sequences.

use super::row_of_squares;
use crate::config::ExportConfig;
use crate::export::Reconciler;
use crate::model::{LabelId, Mask};
use crate::registry::Registry;

/// Small linear congruential generator so sequences are reproducible.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }
}

fn region_labels(registry: &Registry) -> Vec<LabelId> {
    registry.regions().map(|r| r.label.clone()).collect()
}

fn any_label(registry: &Registry, rng: &mut Lcg) -> LabelId {
    let mut labels = region_labels(registry);
    labels.extend(registry.groups().map(|g| g.label()));
    labels[rng.below(labels.len())].clone()
}

fn step(registry: &mut Registry, rng: &mut Lcg) {
    match rng.below(5) {
        0 => {
            let label = any_label(registry, rng);
            registry.toggle(&label).unwrap();
        }
        1 | 2 => {
            let count = 2 + rng.below(3);
            let labels: Vec<LabelId> = (0..count).map(|_| any_label(registry, rng)).collect();
            registry.connect(&labels, rng.below(2) == 0).unwrap();
        }
        3 => {
            let label = any_label(registry, rng);
            registry.disconnect(&label).unwrap();
        }
        _ => {
            if rng.below(4) == 0 {
                let (rows, cols) = registry.dims();
                let top = 20 + rng.below(10);
                let left = rng.below(cols - 8);
                registry
                    .add_drawn(Mask::with_rect(rows, cols, top, left, 5, 5))
                    .unwrap();
            }
        }
    }
}

#[test]
fn test_membership_stays_inverse_of_groups() {
    for seed in 1..=20u64 {
        let mut registry = row_of_squares("seq", 6);
        let mut rng = Lcg(seed);
        for _ in 0..200 {
            step(&mut registry, &mut rng);
            registry.check_invariants().unwrap();
        }
    }
}

#[test]
fn test_grouped_regions_never_exported_individually() {
    let config = ExportConfig::default();
    let reconciler = Reconciler::new(&config).unwrap();
    for seed in 100..110u64 {
        let mut registry = row_of_squares("seq", 6);
        let mut rng = Lcg(seed);
        for i in 0..150 {
            step(&mut registry, &mut rng);
            if i % 10 != 0 {
                continue;
            }
            let dataset = reconciler.reconcile([&registry]);
            for record in dataset.records.iter().chain(&dataset.excluded) {
                assert!(
                    record.label.is_merged() || !registry.is_grouped(&record.label),
                    "seed {}: {} exported while grouped",
                    seed,
                    record.label
                );
            }
            let mut seen: Vec<&LabelId> = dataset.records.iter().map(|r| &r.label).collect();
            seen.sort();
            let total = seen.len();
            seen.dedup();
            assert_eq!(seen.len(), total, "seed {}: duplicate rows", seed);
        }
    }
}

#[test]
fn test_toggle_twice_is_identity() {
    let mut rng = Lcg(7);
    let mut registry = row_of_squares("seq", 6);
    for _ in 0..60 {
        step(&mut registry, &mut rng);
    }
    for label in region_labels(&registry) {
        let before = registry.is_effectively_active(&label);
        registry.toggle(&label).unwrap();
        registry.toggle(&label).unwrap();
        assert_eq!(registry.is_effectively_active(&label), before);
    }
}

#[test]
fn test_connect_disconnect_round_trip() {
    let mut registry = row_of_squares("seq", 4);
    registry.toggle(&LabelId::Integer(3)).unwrap();
    let masks: Vec<Mask> = registry.regions().map(|r| r.mask.clone()).collect();
    let states: Vec<bool> = registry.regions().map(|r| r.active).collect();

    let merged = LabelId::merged(&[LabelId::Integer(2), LabelId::Integer(3)]);
    registry
        .connect(&[LabelId::Integer(2), LabelId::Integer(3)], false)
        .unwrap();
    assert_eq!(registry.group_count(), 1);
    registry.disconnect(&merged).unwrap();

    assert_eq!(registry.group_count(), 0);
    assert!(registry.group_by_label(&merged).is_none());
    let after_masks: Vec<Mask> = registry.regions().map(|r| r.mask.clone()).collect();
    let after_states: Vec<bool> = registry.regions().map(|r| r.active).collect();
    assert_eq!(after_masks, masks);
    assert_eq!(after_states, states);
}
