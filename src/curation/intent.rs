//! Edit commands and their outcomes.

use serde::{Deserialize, Serialize};

use super::sketch::Sketch;
use super::stroke::{DisplaySize, StrokeAction};
use crate::model::LabelId;

/// One curator edit against one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Flip a region, or the group containing it.
    Toggle { image: String, label: LabelId },
    /// Freehand path over regions, resolved by the stroke interpreter.
    Stroke {
        image: String,
        /// `(x, y)` positions in display space
        path: Vec<(f64, f64)>,
        display_size: DisplaySize,
        #[serde(default)]
        action: StrokeAction,
    },
    /// Dissolve a group, or take one member out of it.
    Disconnect { image: String, label: LabelId },
    /// Add regions from a freehand drawing.
    Draw { image: String, sketch: Sketch },
}

impl Intent {
    /// Image the intent targets.
    pub fn image(&self) -> &str {
        match self {
            Intent::Toggle { image, .. }
            | Intent::Stroke { image, .. }
            | Intent::Disconnect { image, .. }
            | Intent::Draw { image, .. } => image,
        }
    }
}

/// Observable result of an applied intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    Toggled { label: LabelId, active: bool },
    Connected { label: LabelId, members: Vec<LabelId> },
    Disconnected { restored: Vec<LabelId> },
    Drawn { labels: Vec<LabelId> },
    NoOp { reason: String },
}

impl Effect {
    pub fn no_op(reason: impl Into<String>) -> Self {
        Effect::NoOp {
            reason: reason.into(),
        }
    }
}
