//! Painter abstraction for host-provided drawing backends.

use crate::color::Color;
use crate::geometry::{Path, Point, Rect, Transform};

/// Stroke parameters.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Pen {
    pub color: Color,
    pub width: f32,
}

/// Fill parameters.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct Brush {
    pub color: Color,
}

/// Vertical font metrics at a given pixel size.
#[derive(PartialEq, Copy, Clone, Debug)]
pub struct FontMetrics {
    pub ascent: f32,
    pub descent: f32,
}

impl FontMetrics {
    /// Line height.
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Narrow drawing interface the renderer draws through.
///
/// Hosts back this with their raster library of choice; the renderer
/// itself stays host-free. `save`/`restore` must cover the translation,
/// clip, pen, brush, and opacity state. Text enters the interface only as
/// glyph outline paths and metrics, so backends own font selection and
/// shaping.
pub trait Painter {
    /// Push the current painter state.
    fn save(&mut self);

    /// Pop back to the most recently saved state.
    fn restore(&mut self);

    /// Translate all subsequent drawing.
    fn translate(&mut self, offset: Point<f32>);

    /// Restrict drawing to a rectangle in current coordinates.
    fn clip_rect(&mut self, rect: Rect);

    /// Set the stroke, or disable stroking with `None`.
    fn set_pen(&mut self, pen: Option<Pen>);

    /// Set the fill, or disable filling with `None`.
    fn set_brush(&mut self, brush: Option<Brush>);

    /// Set a global opacity multiplier in `[0, 1]`.
    fn set_opacity(&mut self, opacity: f32);

    /// Fill a rectangle with a solid color, ignoring pen and brush.
    fn fill_rect(&mut self, rect: Rect, color: Color);

    /// Draw a path with the current pen and brush, honoring the path's
    /// fill rule.
    fn draw_path(&mut self, path: &Path);

    /// Glyph outlines for a string, with the origin at the left end of
    /// the baseline.
    fn text_path(&self, text: &str, font_size: f32) -> Path;

    /// Vertical metrics of the backend font at a pixel size.
    fn font_metrics(&self, font_size: f32) -> FontMetrics;

    /// Horizontal advance of a string at a pixel size.
    fn text_advance(&self, text: &str, font_size: f32) -> f32;
}

/// Relative glyph metrics of the recording painter's synthetic font.
const GLYPH_ADVANCE: f32 = 0.6;
const GLYPH_ASCENT: f32 = 0.8;
const GLYPH_DESCENT: f32 = 0.2;

/// Recorded drawing operation, in absolute coordinates.
#[derive(Clone, Debug)]
pub enum DrawCall {
    FillRect { rect: Rect, color: Color },
    Path { path: Path, pen: Option<Pen>, brush: Option<Brush>, opacity: f32 },
}

/// Headless painter recording draw calls.
///
/// Used by the renderer tests and the baseline output tester. Glyphs are
/// modeled as fixed-advance boxes so layout stays deterministic across
/// hosts.
pub struct RecordingPainter {
    pub calls: Vec<DrawCall>,

    state: State,
    stack: Vec<State>,
}

#[derive(Clone)]
struct State {
    offset: Point<f32>,
    clip: Option<Rect>,
    pen: Option<Pen>,
    brush: Option<Brush>,
    opacity: f32,
}

impl Default for State {
    fn default() -> Self {
        Self { offset: Point::default(), clip: None, pen: None, brush: None, opacity: 1. }
    }
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self { calls: Vec::new(), state: State::default(), stack: Vec::new() }
    }

    /// Recorded path draws with a specific fill color.
    pub fn filled_paths(&self, color: Color) -> Vec<&Path> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Path { path, brush: Some(brush), .. } if brush.color == color => {
                    Some(path)
                },
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl Painter for RecordingPainter {
    fn save(&mut self) {
        self.stack.push(self.state.clone());
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, offset: Point<f32>) {
        self.state.offset += offset;
    }

    fn clip_rect(&mut self, rect: Rect) {
        self.state.clip = Some(rect.translate(self.state.offset));
    }

    fn set_pen(&mut self, pen: Option<Pen>) {
        self.state.pen = pen;
    }

    fn set_brush(&mut self, brush: Option<Brush>) {
        self.state.brush = brush;
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.state.opacity = opacity;
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.calls.push(DrawCall::FillRect { rect: rect.translate(self.state.offset), color });
    }

    fn draw_path(&mut self, path: &Path) {
        let offset = self.state.offset;
        self.calls.push(DrawCall::Path {
            path: path.transformed(&Transform::from_translate(offset.x, offset.y)),
            pen: self.state.pen,
            brush: self.state.brush,
            opacity: self.state.opacity,
        });
    }

    fn text_path(&self, text: &str, font_size: f32) -> Path {
        let advance = self.text_advance(text, font_size);
        if advance == 0. {
            return Path::default();
        }

        let metrics = self.font_metrics(font_size);
        let mut path = Path::default();
        path.move_to(Point::new(0., -metrics.ascent));
        path.line_to(Point::new(advance, -metrics.ascent));
        path.line_to(Point::new(advance, metrics.descent));
        path.line_to(Point::new(0., metrics.descent));
        path.close();
        path
    }

    fn font_metrics(&self, font_size: f32) -> FontMetrics {
        FontMetrics { ascent: GLYPH_ASCENT * font_size, descent: GLYPH_DESCENT * font_size }
    }

    fn text_advance(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * GLYPH_ADVANCE * font_size
    }
}
