//! Translation of raw curator input into registry mutations.
//!
//! Strokes become connect/disconnect decisions, drawings become filled
//! masks, and both are expressed as [`Intent`]s applied by the session.

mod drawing;
mod intent;
mod sketch;
mod stroke;

pub use drawing::DrawingRasterizer;
pub use intent::{Effect, Intent};
pub use sketch::{Sketch, SketchCanvas, SketchStroke, SketchTool};
pub use stroke::{DisplaySize, StrokeAction, StrokeDecision, hit_regions, interpret};
