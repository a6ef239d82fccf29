//! Region groups.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::measure::RegionProperties;
use crate::model::{LabelId, Mask};

/// Stable identifier of a group within one registry.
///
/// Also serves as the opaque display token; it is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// A set of two or more regions treated as one composite object.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    /// Base labels of the members. Never contains a merged label.
    pub members: BTreeSet<LabelId>,
    /// Union of the member masks
    pub mask: Mask,
    /// Effective active state of the composite
    pub active: bool,
    /// Composite descriptors in pixel space
    pub properties: Option<RegionProperties>,
}

impl Group {
    /// Canonical merged label of this group.
    pub fn label(&self) -> LabelId {
        LabelId::merged(&self.members)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, label: &LabelId) -> bool {
        self.members.contains(label)
    }
}
