//! Error types for curation operations.

use thiserror::Error;

use crate::model::LabelId;

/// Result type alias for curation operations.
pub type Result<T> = std::result::Result<T, CurationError>;

/// Errors raised by the registry, the aggregator and the export reconciler.
///
/// Only [`CurationError::InvalidConversionRate`] blocks an export; the other
/// recoverable variants are logged and the offending region is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurationError {
    /// An operation referenced a region that is not in the registry.
    #[error("Unknown region '{label}' in image '{image}'")]
    UnknownRegion {
        /// Image the lookup was made against
        image: String,
        /// The label that was not found
        label: LabelId,
    },

    /// An operation referenced an image with no registry.
    #[error("Unknown image '{0}'")]
    UnknownImage(String),

    /// Group/membership bookkeeping is inconsistent. This is a defect.
    #[error("Registry invariant violated: {0}")]
    InvariantViolation(String),

    /// The aggregator was given no constituents or zero total area.
    #[error("Cannot aggregate an empty or zero-area constituent set")]
    DegenerateAggregate,

    /// Export could not find the mask behind a record.
    #[error("No mask available for '{label}' in image '{image}'")]
    UnresolvedMask {
        /// Image of the record
        image: String,
        /// Label of the record
        label: LabelId,
    },

    /// Pixel-to-physical rate is non-positive, not finite or above the ceiling.
    #[error("Invalid pixel conversion rate {0} (must be > 0 and <= {max})", max = crate::constants::MAX_PIXEL_RATE)]
    InvalidConversionRate(f64),

    /// A mask or canvas does not match the registry's grid.
    #[error("Dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        /// Expected (rows, cols)
        expected: (usize, usize),
        /// Actual (rows, cols)
        found: (usize, usize),
    },
}

impl CurationError {
    /// Create an unknown-region error.
    pub fn unknown_region(image: impl Into<String>, label: LabelId) -> Self {
        Self::UnknownRegion {
            image: image.into(),
            label,
        }
    }

    /// Create an invariant-violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Whether the caller may skip the offending item and carry on.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CurationError::InvariantViolation(_) | CurationError::InvalidConversionRate(_)
        )
    }
}
