//! Drawing capability used by the layout engine and chart views.
//!
//! Coordinates are page units with the origin at the top-left corner and y
//! growing downwards. Text is positioned by the top-left corner of its box.

use plotters::coord::Shift;
use plotters::prelude::{
    Color, DrawingArea, IntoDrawingArea, IntoFont, PathElement, RGBColor, Rectangle, SVGBackend, WHITE,
};

use crate::error::{ReportError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Rgb { r, g, b }
    }

    fn to_plotters(self) -> RGBColor {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        RGBColor(channel(self.r), channel(self.g), channel(self.b))
    }
}

pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Bounds { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Shrinks the rectangle by `pad` on every side.
    pub fn inset(&self, pad: f64) -> Bounds {
        Bounds::new(
            self.x + pad,
            self.y + pad,
            (self.width - pad * 2.0).max(0.0),
            (self.height - pad * 2.0).max(0.0),
        )
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Bounds {
        Bounds::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextExtents {
    pub width: f64,
    pub height: f64,
}

const GLYPH_WIDTH_FACTOR: f64 = 0.55;
const GLYPH_HEIGHT_FACTOR: f64 = 0.75;

/// Fixed-pitch estimate of a sans-serif text box.
pub fn estimate_text_extents(text: &str, font_size: f64) -> TextExtents {
    if text.is_empty() {
        return TextExtents::default();
    }
    TextExtents {
        width: text.chars().count() as f64 * font_size * GLYPH_WIDTH_FACTOR,
        height: font_size * GLYPH_HEIGHT_FACTOR,
    }
}

pub trait Canvas {
    fn draw_text(&mut self, text: &str, x: f64, y: f64, font_size: f64, color: Rgb) -> Result<()>;

    fn draw_rect(&mut self, bounds: Bounds, color: Rgb, filled: bool) -> Result<()>;

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb) -> Result<()>;

    fn measure_text(&self, text: &str, font_size: f64) -> TextExtents;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text {
        text: String,
        x: f64,
        y: f64,
        font_size: f64,
    },
    Rect {
        bounds: Bounds,
        color: Rgb,
        filled: bool,
    },
    Line {
        from: (f64, f64),
        to: (f64, f64),
    },
}

/// Canvas that keeps every command in order instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    pub commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn find_text(&self, needle: &str) -> Option<&DrawCommand> {
        self.commands
            .iter()
            .find(|c| matches!(c, DrawCommand::Text { text, .. } if text.contains(needle)))
    }
}

impl Canvas for RecordingCanvas {
    fn draw_text(&mut self, text: &str, x: f64, y: f64, font_size: f64, _color: Rgb) -> Result<()> {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            font_size,
        });
        Ok(())
    }

    fn draw_rect(&mut self, bounds: Bounds, color: Rgb, filled: bool) -> Result<()> {
        self.commands.push(DrawCommand::Rect { bounds, color, filled });
        Ok(())
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), _color: Rgb) -> Result<()> {
        self.commands.push(DrawCommand::Line { from, to });
        Ok(())
    }

    fn measure_text(&self, text: &str, font_size: f64) -> TextExtents {
        estimate_text_extents(text, font_size)
    }
}

fn draw_err(e: impl std::fmt::Display) -> ReportError {
    ReportError::Draw(e.to_string())
}

fn px(v: f64) -> i32 {
    v.round() as i32
}

/// SVG page rendered into an in-memory buffer.
pub struct SvgCanvas<'a> {
    area: DrawingArea<SVGBackend<'a>, Shift>,
}

impl<'a> SvgCanvas<'a> {
    pub fn new(buffer: &'a mut String, page: Bounds) -> Result<Self> {
        let size = (page.width.ceil() as u32, page.height.ceil() as u32);
        let area = SVGBackend::with_string(buffer, size).into_drawing_area();
        area.fill(&WHITE).map_err(draw_err)?;
        Ok(SvgCanvas { area })
    }

    /// Flushes pending drawing operations into the buffer.
    pub fn present(self) -> Result<()> {
        self.area.present().map_err(draw_err)
    }
}

impl Canvas for SvgCanvas<'_> {
    fn draw_text(&mut self, text: &str, x: f64, y: f64, font_size: f64, color: Rgb) -> Result<()> {
        let style = ("sans-serif", font_size).into_font().color(&color.to_plotters());
        self.area.draw_text(text, &style, (px(x), px(y))).map_err(draw_err)
    }

    fn draw_rect(&mut self, bounds: Bounds, color: Rgb, filled: bool) -> Result<()> {
        let rgb = color.to_plotters();
        let style = if filled { rgb.filled() } else { rgb.stroke_width(1) };
        let corners = [(px(bounds.x), px(bounds.y)), (px(bounds.right()), px(bounds.bottom()))];
        self.area.draw(&Rectangle::new(corners, style)).map_err(draw_err)
    }

    fn draw_line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb) -> Result<()> {
        let path = vec![(px(from.0), px(from.1)), (px(to.0), px(to.1))];
        self.area
            .draw(&PathElement::new(path, color.to_plotters().stroke_width(1)))
            .map_err(draw_err)
    }

    fn measure_text(&self, text: &str, font_size: f64) -> TextExtents {
        estimate_text_extents(text, font_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inset_pads_every_side() {
        let page = Bounds::new(0.0, 0.0, 611.0, 792.0);
        let pad = page.width * 0.05;
        let inner = page.inset(pad);
        assert!((inner.x - 30.55).abs() < 1e-9);
        assert!((inner.y - 30.55).abs() < 1e-9);
        assert!((inner.width - (611.0 - 61.1)).abs() < 1e-9);
        assert!((inner.height - (792.0 - 61.1)).abs() < 1e-9);
    }

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(!a.overlaps(&Bounds::new(0.0, 10.0, 10.0, 10.0)));
        assert!(a.overlaps(&Bounds::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn empty_text_measures_zero() {
        assert_eq!(estimate_text_extents("", 8.0), TextExtents::default());
        let e = estimate_text_extents("abcd", 10.0);
        assert!((e.width - 22.0).abs() < 1e-9);
        assert!((e.height - 7.5).abs() < 1e-9);
    }

    #[test]
    fn svg_canvas_writes_text() {
        let mut buffer = String::new();
        {
            let mut canvas = SvgCanvas::new(&mut buffer, Bounds::new(0.0, 0.0, 100.0, 50.0)).unwrap();
            canvas.draw_text("hello", 1.0, 2.0, 8.0, BLACK).unwrap();
            canvas.draw_rect(Bounds::new(10.0, 10.0, 20.0, 5.0), BLACK, true).unwrap();
            canvas.draw_line((0.0, 0.0), (5.0, 5.0), BLACK).unwrap();
            canvas.present().unwrap();
        }
        assert!(buffer.contains("<svg"));
        assert!(buffer.contains("hello"));
    }
}
