//! Per-image region registry and grouping.
//!
//! The registry owns every [`Region`] of one image, addressed by [`LabelId`].
//! Groups hold label sets, never references, and `membership` is the reverse
//! index from a member label to its group. Both are updated together by every
//! mutation; [`Registry::check_invariants`] verifies they agree.

mod group;

pub use group::{Group, GroupId};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{CurationError, Result};
use crate::measure::{RegionProperties, measure_mask};
use crate::model::{IntensityImage, LabelId, Mask, Provenance, Region};

/// Result of a connect request.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// A new group was formed (possibly absorbing older ones).
    Created {
        label: LabelId,
        members: Vec<LabelId>,
    },
    /// The touched regions already form exactly this group.
    Unchanged(LabelId),
    /// Fewer than two distinct regions were touched.
    TooFew,
}

/// All regions and groups of one image.
#[derive(Debug, Clone)]
pub struct Registry {
    image_name: String,
    dims: (usize, usize),
    regions: BTreeMap<LabelId, Region>,
    groups: BTreeMap<GroupId, Group>,
    membership: HashMap<LabelId, GroupId>,
    /// Active state to restore on disconnect, keyed by member label
    pre_group_snapshot: HashMap<LabelId, bool>,
    next_group: u32,
    next_drawn: u32,
    intensity: Option<Arc<IntensityImage>>,
}

impl Registry {
    /// Create an empty registry for an image of `dims` = `(rows, cols)`.
    pub fn new(
        image_name: impl Into<String>,
        dims: (usize, usize),
        intensity: Option<Arc<IntensityImage>>,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            dims,
            regions: BTreeMap::new(),
            groups: BTreeMap::new(),
            membership: HashMap::new(),
            pre_group_snapshot: HashMap::new(),
            next_group: 1,
            next_drawn: 1,
            intensity,
        }
    }

    pub fn image_name(&self) -> &str {
        &self.image_name
    }

    pub fn dims(&self) -> (usize, usize) {
        self.dims
    }

    pub fn intensity(&self) -> Option<&IntensityImage> {
        self.intensity.as_deref()
    }

    pub fn region(&self, label: &LabelId) -> Option<&Region> {
        self.regions.get(label)
    }

    /// All regions in label order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// All groups in creation order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Group containing the given base label.
    pub fn group_of(&self, label: &LabelId) -> Option<&Group> {
        self.membership.get(label).and_then(|id| self.groups.get(id))
    }

    pub fn is_grouped(&self, label: &LabelId) -> bool {
        self.membership.contains_key(label)
    }

    /// Group whose canonical label equals `label`.
    pub fn group_by_label(&self, label: &LabelId) -> Option<&Group> {
        self.find_group_id(label).and_then(|id| self.groups.get(&id))
    }

    fn find_group_id(&self, label: &LabelId) -> Option<GroupId> {
        let LabelId::Merged(members) = label else {
            return None;
        };
        let first = members.first()?;
        let id = *self.membership.get(first)?;
        let group = self.groups.get(&id)?;
        (group.members.len() == members.len() && members.iter().all(|m| group.contains(m)))
            .then_some(id)
    }

    /// Whether a region counts as active: a grouped region follows its group.
    pub fn is_effectively_active(&self, label: &LabelId) -> bool {
        match self.group_of(label) {
            Some(group) => group.active,
            None => self.regions.get(label).is_some_and(|r| r.active),
        }
    }

    /// Regions eligible for hit-testing.
    pub fn active_regions(&self) -> impl Iterator<Item = &Region> {
        self.regions
            .values()
            .filter(|r| self.is_effectively_active(&r.label))
    }

    /// Snapshot value recorded for a grouped member.
    pub fn snapshot(&self, label: &LabelId) -> Option<bool> {
        self.pre_group_snapshot.get(label).copied()
    }

    fn check_dims(&self, mask: &Mask) -> Result<()> {
        if mask.dim() != self.dims {
            return Err(CurationError::DimensionMismatch {
                expected: self.dims,
                found: mask.dim(),
            });
        }
        Ok(())
    }

    fn measure(&self, mask: &Mask) -> Option<RegionProperties> {
        match measure_mask(mask, self.intensity()) {
            Ok(props) => Some(props),
            Err(err) => {
                log::warn!("{}: could not measure region: {}", self.image_name, err);
                None
            }
        }
    }

    /// Register a pipeline region.
    ///
    /// Labels must be `Integer`. An existing region with the same label is replaced.
    pub fn insert_segmented(
        &mut self,
        label: u32,
        mask: Mask,
        properties: Option<RegionProperties>,
    ) -> Result<()> {
        self.check_dims(&mask)?;
        let label = LabelId::Integer(label);
        let properties = properties.or_else(|| self.measure(&mask));
        let region = Region::new(
            self.image_name.clone(),
            label.clone(),
            mask,
            Provenance::Segmented,
            properties,
        );
        self.regions.insert(label, region);
        Ok(())
    }

    /// Register a freehand-drawn region as `Drawn(n)`, active and ungrouped.
    pub fn add_drawn(&mut self, mask: Mask) -> Result<LabelId> {
        self.check_dims(&mask)?;
        let label = LabelId::Drawn(self.next_drawn);
        self.next_drawn += 1;
        let properties = self.measure(&mask);
        let region = Region::new(
            self.image_name.clone(),
            label.clone(),
            mask,
            Provenance::Drawn,
            properties,
        );
        log::debug!("{}: added drawn region {}", self.image_name, label);
        self.regions.insert(label.clone(), region);
        Ok(label)
    }

    /// Flip the active state of a region or of the group containing it.
    ///
    /// Returns the new state. A merged label toggles that group.
    pub fn toggle(&mut self, label: &LabelId) -> Result<bool> {
        let group_id = if label.is_merged() {
            Some(
                self.find_group_id(label)
                    .ok_or_else(|| CurationError::unknown_region(&self.image_name, label.clone()))?,
            )
        } else {
            self.membership.get(label).copied()
        };

        let state = match group_id {
            Some(id) => {
                let group = self
                    .groups
                    .get_mut(&id)
                    .ok_or_else(|| CurationError::invariant(format!("dangling {}", id)))?;
                group.active = !group.active;
                let state = group.active;
                for member in &group.members {
                    self.pre_group_snapshot.insert(member.clone(), state);
                }
                log::debug!(
                    "{}: toggled group {} -> {}",
                    self.image_name,
                    group.label(),
                    state
                );
                state
            }
            None => {
                let region = self
                    .regions
                    .get_mut(label)
                    .ok_or_else(|| CurationError::unknown_region(&self.image_name, label.clone()))?;
                region.active = !region.active;
                log::debug!(
                    "{}: toggled region {} -> {}",
                    self.image_name,
                    label,
                    region.active
                );
                region.active
            }
        };
        debug_assert!(self.check_invariants().is_ok());
        Ok(state)
    }

    /// Merge the touched regions into one group.
    ///
    /// Groups touching any key are flattened into the new group and removed.
    /// With `active_only`, inactive regions and inactive groups are ignored.
    pub fn connect(&mut self, labels: &[LabelId], active_only: bool) -> Result<ConnectOutcome> {
        let mut touched: BTreeSet<LabelId> = BTreeSet::new();
        for label in labels {
            let base = if label.is_merged() {
                let group = self
                    .group_by_label(label)
                    .ok_or_else(|| CurationError::unknown_region(&self.image_name, label.clone()))?;
                group.members.iter().cloned().collect()
            } else if self.regions.contains_key(label) {
                vec![label.clone()]
            } else {
                return Err(CurationError::unknown_region(&self.image_name, label.clone()));
            };
            for member in base {
                if !active_only || self.is_effectively_active(&member) {
                    touched.insert(member);
                }
            }
        }

        if touched.len() < 2 {
            return Ok(ConnectOutcome::TooFew);
        }

        let absorbed: BTreeSet<GroupId> = touched
            .iter()
            .filter_map(|label| self.membership.get(label).copied())
            .collect();
        let mut members = touched;
        for id in &absorbed {
            if let Some(group) = self.groups.get(id) {
                members.extend(group.members.iter().cloned());
            }
        }

        let same_group = absorbed.len() == 1
            && absorbed
                .iter()
                .next()
                .and_then(|id| self.groups.get(id))
                .is_some_and(|g| g.members == members);
        if same_group {
            return Ok(ConnectOutcome::Unchanged(LabelId::merged(&members)));
        }

        let mask = Mask::union_all(members.iter().filter_map(|m| self.regions.get(m).map(|r| &r.mask)))?
            .ok_or_else(|| CurationError::invariant("group without member masks"))?;
        let properties = self.measure(&mask);

        for member in &members {
            if !self.pre_group_snapshot.contains_key(member) {
                let active = self.regions.get(member).is_some_and(|r| r.active);
                self.pre_group_snapshot.insert(member.clone(), active);
            }
        }
        for id in &absorbed {
            self.groups.remove(id);
        }

        let id = GroupId(self.next_group);
        self.next_group += 1;
        for member in &members {
            self.membership.insert(member.clone(), id);
        }
        let group = Group {
            id,
            members,
            mask,
            active: true,
            properties,
        };
        let label = group.label();
        let member_list: Vec<LabelId> = group.members.iter().cloned().collect();
        log::debug!(
            "{}: connected {} (absorbed {} group(s))",
            self.image_name,
            label,
            absorbed.len()
        );
        self.groups.insert(id, group);

        debug_assert!(self.check_invariants().is_ok());
        Ok(ConnectOutcome::Created {
            label,
            members: member_list,
        })
    }

    /// Dissolve a group, or remove one member from its group.
    ///
    /// A merged label removes the whole group. A member label removes that
    /// member; if fewer than two remain, the group dissolves. Returns the
    /// labels restored to individual status, empty if `label` was ungrouped.
    pub fn disconnect(&mut self, label: &LabelId) -> Result<Vec<LabelId>> {
        let (id, whole) = if label.is_merged() {
            let id = self
                .find_group_id(label)
                .ok_or_else(|| CurationError::unknown_region(&self.image_name, label.clone()))?;
            (id, true)
        } else if let Some(&id) = self.membership.get(label) {
            (id, false)
        } else if self.regions.contains_key(label) {
            return Ok(Vec::new());
        } else {
            return Err(CurationError::unknown_region(&self.image_name, label.clone()));
        };

        let group = self
            .groups
            .get_mut(&id)
            .ok_or_else(|| CurationError::invariant(format!("dangling {}", id)))?;

        let released: Vec<LabelId> = if whole || group.len() <= 2 {
            let members = std::mem::take(&mut group.members);
            self.groups.remove(&id);
            members.into_iter().collect()
        } else {
            group.members.remove(label);
            vec![label.clone()]
        };

        for member in &released {
            self.restore(member);
        }

        if !released.is_empty() && self.groups.contains_key(&id) {
            self.recompute_group(id)?;
        }

        log::debug!(
            "{}: disconnected {} (restored {})",
            self.image_name,
            label,
            released.len()
        );
        debug_assert!(self.check_invariants().is_ok());
        Ok(released)
    }

    fn restore(&mut self, label: &LabelId) {
        self.membership.remove(label);
        let active = self.pre_group_snapshot.remove(label).unwrap_or(true);
        let missing_properties = match self.regions.get_mut(label) {
            Some(region) => {
                region.active = active;
                if region.provenance == Provenance::Segmented {
                    region.provenance = Provenance::Disconnected;
                }
                region.properties.is_none()
            }
            None => {
                log::warn!("{}: restored member {} has no region", self.image_name, label);
                false
            }
        };
        if missing_properties {
            let props = self.regions.get(label).and_then(|r| self.measure(&r.mask));
            if let Some(region) = self.regions.get_mut(label) {
                region.properties = props;
            }
        }
    }

    fn recompute_group(&mut self, id: GroupId) -> Result<()> {
        let Some(group) = self.groups.get(&id) else {
            return Ok(());
        };
        let mask = Mask::union_all(
            group
                .members
                .iter()
                .filter_map(|m| self.regions.get(m).map(|r| &r.mask)),
        )?
        .ok_or_else(|| CurationError::invariant("group without member masks"))?;
        let properties = self.measure(&mask);
        if let Some(group) = self.groups.get_mut(&id) {
            group.mask = mask;
            group.properties = properties;
        }
        Ok(())
    }

    /// Verify that `membership` is exactly the inverse of `groups[*].members`.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen: HashMap<&LabelId, GroupId> = HashMap::new();
        for (id, group) in &self.groups {
            if group.id != *id {
                return Err(CurationError::invariant(format!("{} stored under {}", group.id, id)));
            }
            if group.len() < 2 {
                return Err(CurationError::invariant(format!(
                    "{} has {} member(s)",
                    id,
                    group.len()
                )));
            }
            for member in &group.members {
                if member.is_merged() {
                    return Err(CurationError::invariant(format!("{} contains nested {}", id, member)));
                }
                if !self.regions.contains_key(member) {
                    return Err(CurationError::invariant(format!("{} references missing {}", id, member)));
                }
                if let Some(other) = seen.insert(member, *id) {
                    return Err(CurationError::invariant(format!(
                        "{} belongs to {} and {}",
                        member, other, id
                    )));
                }
                if self.membership.get(member) != Some(id) {
                    return Err(CurationError::invariant(format!(
                        "membership index disagrees for {}",
                        member
                    )));
                }
            }
        }
        if seen.len() != self.membership.len() {
            return Err(CurationError::invariant(format!(
                "membership index has {} entries, groups have {}",
                self.membership.len(),
                seen.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(n: u32) -> LabelId {
        LabelId::Integer(n)
    }

    /// Registry with `n` disjoint 3x3 squares in a row.
    fn registry(n: u32) -> Registry {
        let mut registry = Registry::new("X", (10, 40), None);
        for i in 0..n {
            let mask = Mask::with_rect(10, 40, 2, 1 + 5 * i as usize, 3, 3);
            registry.insert_segmented(i + 1, mask, None).unwrap();
        }
        registry
    }

    #[test]
    fn test_toggle_twice_is_identity() {
        let mut reg = registry(2);
        assert!(!reg.toggle(&label(1)).unwrap());
        assert!(reg.toggle(&label(1)).unwrap());
        assert!(reg.region(&label(1)).unwrap().active);
    }

    #[test]
    fn test_toggle_unknown() {
        let mut reg = registry(1);
        assert_eq!(
            reg.toggle(&label(9)),
            Err(CurationError::unknown_region("X", label(9)))
        );
    }

    #[test]
    fn test_connect_creates_group() {
        let mut reg = registry(3);
        let outcome = reg.connect(&[label(2), label(1)], true).unwrap();
        let merged = LabelId::merged(&[label(1), label(2)]);
        assert_eq!(
            outcome,
            ConnectOutcome::Created {
                label: merged.clone(),
                members: vec![label(1), label(2)],
            }
        );
        let group = reg.group_by_label(&merged).unwrap();
        assert_eq!(group.mask.area(), 18);
        assert_eq!(group.properties.as_ref().unwrap().area, 18.0);
        assert!(reg.is_grouped(&label(1)));
        assert!(!reg.is_grouped(&label(3)));
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_connect_single_is_noop() {
        let mut reg = registry(2);
        assert_eq!(
            reg.connect(&[label(1), label(1)], true).unwrap(),
            ConnectOutcome::TooFew
        );
        assert_eq!(reg.group_count(), 0);
    }

    #[test]
    fn test_connect_flattens_groups() {
        let mut reg = registry(4);
        reg.connect(&[label(1), label(2)], true).unwrap();
        reg.connect(&[label(3), label(4)], true).unwrap();
        reg.connect(&[label(2), label(3)], true).unwrap();
        assert_eq!(reg.group_count(), 1);
        let group = reg.group_of(&label(1)).unwrap();
        assert_eq!(group.label().render(), "(1,2,3,4)");
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_connect_existing_group_unchanged() {
        let mut reg = registry(2);
        reg.connect(&[label(1), label(2)], true).unwrap();
        assert_eq!(
            reg.connect(&[label(1), label(2)], true).unwrap(),
            ConnectOutcome::Unchanged(LabelId::merged(&[label(1), label(2)]))
        );
        assert_eq!(reg.group_count(), 1);
    }

    #[test]
    fn test_connect_active_only_skips_inactive() {
        let mut reg = registry(3);
        reg.toggle(&label(3)).unwrap();
        assert_eq!(
            reg.connect(&[label(1), label(3)], true).unwrap(),
            ConnectOutcome::TooFew
        );
        assert!(matches!(
            reg.connect(&[label(1), label(3)], false).unwrap(),
            ConnectOutcome::Created { .. }
        ));
    }

    #[test]
    fn test_disconnect_round_trip_restores_state() {
        let mut reg = registry(2);
        let before_mask = reg.region(&label(1)).unwrap().mask.clone();
        reg.connect(&[label(1), label(2)], false).unwrap();
        let restored = reg.disconnect(&LabelId::merged(&[label(1), label(2)])).unwrap();
        assert_eq!(restored, vec![label(1), label(2)]);
        assert_eq!(reg.group_count(), 0);
        assert!(reg.region(&label(1)).unwrap().active);
        assert_eq!(reg.region(&label(1)).unwrap().mask, before_mask);
        assert_eq!(
            reg.region(&label(1)).unwrap().provenance,
            Provenance::Disconnected
        );
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_disconnect_restores_pre_merge_inactive() {
        let mut reg = registry(2);
        reg.toggle(&label(2)).unwrap();
        reg.connect(&[label(1), label(2)], false).unwrap();
        reg.disconnect(&label(1)).unwrap();
        assert!(reg.region(&label(1)).unwrap().active);
        assert!(!reg.region(&label(2)).unwrap().active);
    }

    #[test]
    fn test_group_toggle_propagates_to_members() {
        let mut reg = registry(2);
        reg.connect(&[label(1), label(2)], true).unwrap();
        assert!(!reg.toggle(&label(1)).unwrap());
        assert!(!reg.is_effectively_active(&label(2)));
        assert_eq!(reg.snapshot(&label(2)), Some(false));
        reg.disconnect(&label(2)).unwrap();
        assert_eq!(reg.snapshot(&label(2)), None);
        assert!(!reg.region(&label(1)).unwrap().active);
        assert!(!reg.region(&label(2)).unwrap().active);
    }

    #[test]
    fn test_disconnect_member_keeps_larger_group() {
        let mut reg = registry(3);
        reg.connect(&[label(1), label(2), label(3)], true).unwrap();
        let restored = reg.disconnect(&label(3)).unwrap();
        assert_eq!(restored, vec![label(3)]);
        let group = reg.group_of(&label(1)).unwrap();
        assert_eq!(group.label().render(), "(1,2)");
        assert_eq!(group.mask.area(), 18);
        reg.check_invariants().unwrap();
    }

    #[test]
    fn test_disconnect_ungrouped_and_unknown() {
        let mut reg = registry(1);
        assert!(reg.disconnect(&label(1)).unwrap().is_empty());
        assert!(reg.disconnect(&label(5)).is_err());
        assert!(
            reg.disconnect(&LabelId::merged(&[label(1), label(5)]))
                .is_err()
        );
    }

    #[test]
    fn test_add_drawn_labels_are_unique() {
        let mut reg = registry(0);
        let a = reg.add_drawn(Mask::with_rect(10, 40, 0, 0, 2, 2)).unwrap();
        let b = reg.add_drawn(Mask::with_rect(10, 40, 5, 5, 2, 2)).unwrap();
        assert_eq!(a, LabelId::Drawn(1));
        assert_eq!(b, LabelId::Drawn(2));
        assert_eq!(reg.region(&b).unwrap().provenance, Provenance::Drawn);
        assert!(reg.add_drawn(Mask::new(3, 3)).is_err());
    }

    #[test]
    fn test_drawn_region_can_join_group() {
        let mut reg = registry(1);
        let drawn = reg.add_drawn(Mask::with_rect(10, 40, 6, 6, 2, 2)).unwrap();
        reg.connect(&[label(1), drawn], true).unwrap();
        assert_eq!(reg.groups().next().unwrap().label().render(), "(1,drawn_1)");
    }
}
