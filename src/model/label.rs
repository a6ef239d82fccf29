//! Region identity: labels, keys and provenance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Prefix used when rendering drawn labels.
const DRAWN_PREFIX: &str = "drawn_";

/// Label of a region within one image.
///
/// Variant order defines the canonical sort order of merged members:
/// pipeline labels first (numerically), then drawn labels, then merges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LabelId {
    /// Pipeline-assigned label, dense 1..N per image.
    Integer(u32),
    /// Freehand-added region, unique per image.
    Drawn(u32),
    /// Composite of several base labels. Always sorted, deduplicated and flat.
    Merged(Vec<LabelId>),
}

impl LabelId {
    /// Build the canonical merged label of a set of members.
    ///
    /// Nested merges are flattened so a merged label never contains another one.
    pub fn merged<'a>(members: impl IntoIterator<Item = &'a LabelId>) -> Self {
        let mut flat = Vec::new();
        for member in members {
            match member {
                LabelId::Merged(inner) => flat.extend(inner.iter().cloned()),
                other => flat.push(other.clone()),
            }
        }
        flat.sort();
        flat.dedup();
        LabelId::Merged(flat)
    }

    /// Whether this label names a composite region.
    pub fn is_merged(&self) -> bool {
        matches!(self, LabelId::Merged(_))
    }

    /// Whether this label names a freehand-added region.
    pub fn is_drawn(&self) -> bool {
        matches!(self, LabelId::Drawn(_))
    }

    /// Members of a merged label, or the label itself for a base label.
    pub fn members(&self) -> Vec<LabelId> {
        match self {
            LabelId::Merged(inner) => inner.clone(),
            other => vec![other.clone()],
        }
    }

    /// Canonical string rendering (`3`, `drawn_2`, `(1,2,drawn_1)`).
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelId::Integer(n) => write!(f, "{}", n),
            LabelId::Drawn(n) => write!(f, "{}{}", DRAWN_PREFIX, n),
            LabelId::Merged(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Error returned when a label string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid label '{0}'")]
pub struct ParseLabelError(pub String);

impl FromStr for LabelId {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseLabelError(s.to_string());

        if let Some(inner) = s.strip_prefix('(').and_then(|rest| rest.strip_suffix(')')) {
            let members = inner
                .split(',')
                .map(|part| match part.trim().parse::<LabelId>() {
                    Ok(LabelId::Merged(_)) | Err(_) => Err(invalid()),
                    Ok(label) => Ok(label),
                })
                .collect::<Result<Vec<_>, _>>()?;
            let label = LabelId::merged(&members);
            if label.members().len() < 2 {
                return Err(invalid());
            }
            return Ok(label);
        }

        if let Some(n) = s.strip_prefix(DRAWN_PREFIX) {
            return n.parse().map(LabelId::Drawn).map_err(|_| invalid());
        }

        s.parse().map(LabelId::Integer).map_err(|_| invalid())
    }
}

impl TryFrom<String> for LabelId {
    type Error = ParseLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LabelId> for String {
    fn from(label: LabelId) -> Self {
        label.render()
    }
}

/// Identity of a region across registries: `(image_name, label)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    /// Image the region belongs to
    pub image: String,
    /// Label within that image
    pub label: LabelId,
}

impl RegionKey {
    pub fn new(image: impl Into<String>, label: LabelId) -> Self {
        Self {
            image: image.into(),
            label,
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.image, self.label)
    }
}

/// Origin of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Produced by the segmentation pipeline.
    #[default]
    Segmented,
    /// Added by the curator with the drawing tool.
    Drawn,
    /// Restored to individual status after its group was dissolved.
    Disconnected,
}
