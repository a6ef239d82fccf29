//! cellcurate - curation core for cell segmentation masks.
//!
//! Segmented regions arrive per image from a pipeline, a curator toggles,
//! connects, disconnects and draws regions, and the export reconciler turns
//! the live state into a deduplicated, unit-converted dataset with outline
//! polygons.
//!
//! ```rust,ignore
//! use cellcurate::{CurationConfig, Session};
//!
//! let mut session = Session::new(&CurationConfig::default());
//! session.commit(batch)?;
//! session.apply(intent)?;
//! let dataset = session.export()?;
//! ```

pub mod config;
pub mod constants;
pub mod curation;
pub mod error;
pub mod export;
pub mod format;
pub mod measure;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod session;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, CurationConfig};
pub use error::{CurationError, Result};
pub use session::Session;
