//! Freehand sketches and their rasterization onto an alpha canvas.

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use serde::{Deserialize, Serialize};

use crate::config::DrawingConfig;

/// Tool used for a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SketchTool {
    Pen,
    Eraser,
}

/// One pointer-down to pointer-up path, in canvas pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SketchStroke {
    pub tool: SketchTool,
    /// `(x, y)` positions
    pub points: Vec<(f32, f32)>,
}

/// Strokes drawn on a canvas of `width` x `height` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sketch {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub strokes: Vec<SketchStroke>,
}

impl Sketch {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            strokes: Vec::new(),
        }
    }

    pub fn pen(mut self, points: Vec<(f32, f32)>) -> Self {
        self.strokes.push(SketchStroke {
            tool: SketchTool::Pen,
            points,
        });
        self
    }

    pub fn eraser(mut self, points: Vec<(f32, f32)>) -> Self {
        self.strokes.push(SketchStroke {
            tool: SketchTool::Eraser,
            points,
        });
        self
    }
}

/// Renders sketches into an 8-bit alpha canvas.
#[derive(Debug, Clone, Copy)]
pub struct SketchCanvas {
    pen_radius: i32,
    eraser_radius: i32,
}

fn radius_for(width: f32) -> i32 {
    ((width - 1.0) / 2.0).round().max(0.0) as i32
}

impl SketchCanvas {
    pub fn new(config: &DrawingConfig) -> Self {
        Self {
            pen_radius: radius_for(config.pen_width),
            eraser_radius: radius_for(config.eraser_width),
        }
    }

    /// Paint pen strokes opaque and clear eraser strokes, in order.
    pub fn render(&self, sketch: &Sketch) -> GrayImage {
        let mut canvas = GrayImage::new(sketch.width, sketch.height);
        for stroke in &sketch.strokes {
            let (radius, value) = match stroke.tool {
                SketchTool::Pen => (self.pen_radius, 255u8),
                SketchTool::Eraser => (self.eraser_radius, 0u8),
            };
            stamp_path(&mut canvas, &stroke.points, radius, Luma([value]));
        }
        canvas
    }
}

/// Stamp circles along a polyline at sub-pixel spacing.
fn stamp_path(canvas: &mut GrayImage, points: &[(f32, f32)], radius: i32, value: Luma<u8>) {
    let stamp = |canvas: &mut GrayImage, x: f32, y: f32| {
        draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, value);
    };

    match points {
        [] => {}
        [(x, y)] => stamp(canvas, *x, *y),
        _ => {
            for pair in points.windows(2) {
                let (x0, y0) = pair[0];
                let (x1, y1) = pair[1];
                let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
                let steps = (length * 2.0).ceil().max(1.0) as usize;
                for i in 0..=steps {
                    let t = i as f32 / steps as f32;
                    stamp(canvas, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> SketchCanvas {
        SketchCanvas::new(&DrawingConfig::default())
    }

    #[test]
    fn test_pen_line_is_three_wide() {
        let sketch = Sketch::new(20, 20).pen(vec![(2.0, 10.0), (17.0, 10.0)]);
        let alpha = canvas().render(&sketch);
        assert_eq!(alpha.get_pixel(10, 9).0[0], 255);
        assert_eq!(alpha.get_pixel(10, 10).0[0], 255);
        assert_eq!(alpha.get_pixel(10, 11).0[0], 255);
        assert_eq!(alpha.get_pixel(10, 13).0[0], 0);
    }

    #[test]
    fn test_eraser_clears_in_order() {
        let sketch = Sketch::new(40, 40)
            .pen(vec![(5.0, 20.0), (35.0, 20.0)])
            .eraser(vec![(20.0, 20.0)]);
        let alpha = canvas().render(&sketch);
        assert_eq!(alpha.get_pixel(20, 20).0[0], 0);
        assert_eq!(alpha.get_pixel(36, 20).0[0], 255);
    }

    #[test]
    fn test_empty_sketch() {
        let alpha = canvas().render(&Sketch::new(8, 8));
        assert!(alpha.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_sketch_json() {
        let json = r#"{"width": 4, "height": 4, "strokes": [{"tool": "pen", "points": [[1.0, 1.0]]}]}"#;
        let sketch: Sketch = serde_json::from_str(json).unwrap();
        assert_eq!(sketch.strokes[0].tool, SketchTool::Pen);
    }
}
