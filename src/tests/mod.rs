//! Crate-level scenario tests.
//!
//! These drive the public API the way a curation run does: batches from the
//! producer, intents through the session, export through the writers.

mod end_to_end;
mod invariants;

use crate::model::Mask;
use crate::registry::Registry;

/// `n` 6x6 squares on one row of a 40 x (12n + 4) image, labelled 1..=n.
fn row_of_squares(name: &str, n: usize) -> Registry {
    let cols = 12 * n + 4;
    let mut registry = Registry::new(name, (40, cols), None);
    for i in 0..n {
        let mask = Mask::with_rect(40, cols, 4, 4 + 12 * i, 6, 6);
        registry.insert_segmented(i as u32 + 1, mask, None).unwrap();
    }
    registry
}
