//! Format registry for discovering dataset writers.

use std::collections::HashMap;

use crate::format::formats::{RoiArchiveFormat, TableFormat};
use crate::format::traits::DatasetFormat;

/// Registry of available dataset formats.
///
/// All built-in formats are registered automatically on creation.
pub struct FormatRegistry {
    formats: HashMap<&'static str, Box<dyn DatasetFormat>>,
}

impl FormatRegistry {
    /// Create a new registry with all built-in formats registered.
    pub fn new() -> Self {
        let mut registry = Self {
            formats: HashMap::new(),
        };

        registry.register(Box::new(TableFormat));
        registry.register(Box::new(RoiArchiveFormat));

        registry
    }

    /// Register a format implementation.
    pub fn register(&mut self, format: Box<dyn DatasetFormat>) {
        self.formats.insert(format.id(), format);
    }

    /// Get a format by its ID.
    pub fn get(&self, id: &str) -> Option<&dyn DatasetFormat> {
        self.formats.get(id).map(|f| f.as_ref())
    }

    /// Get all format IDs, sorted.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.formats.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_formats() {
        let registry = FormatRegistry::new();

        assert!(registry.get("csv").is_some());
        assert!(registry.get("imagej-roi").is_some());
        assert!(registry.get("coco").is_none());
        assert_eq!(registry.ids(), vec!["csv", "imagej-roi"]);
    }
}
