//! Single-pass, top-to-bottom layout of the report page.
//!
//! A [`RenderPass`] owns one [`LayoutCursor`]: the next free vertical offset
//! inside the padded content area. Every block is drawn at the cursor and
//! then pushes it down, so blocks never overlap.

use std::fmt::Display;

use tracing::debug;

use crate::canvas::{Bounds, Canvas, TextExtents, BLACK};
use crate::charts::{BarKey, ChartView, RankChart};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::format::{comma_number_string, format_timestamp, percentage, pretty_byte_total};
use crate::stats::RunningAggregates;
use crate::store::RankedStore;

const HEADER_BLOCK_PAD_LINES: f64 = 4.0;
const TOP_LIST_ROW_FACTOR: f64 = 1.5;

/// Offset from the top of the content area. Only ever moves down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutCursor(f64);

impl LayoutCursor {
    pub fn new() -> Self {
        LayoutCursor(0.0)
    }

    pub fn position(&self) -> f64 {
        self.0
    }

    pub fn advance(&mut self, dy: f64) {
        if dy > 0.0 {
            self.0 += dy;
        }
    }
}

/// Text shown at the top of the page.
#[derive(Debug, Clone)]
pub struct Header<'a> {
    pub title: &'a str,
    pub source: &'a str,
    pub generated: String,
    pub aggregates: &'a RunningAggregates,
}

impl Header<'_> {
    fn identity_lines(&self) -> [String; 3] {
        [
            self.title.to_string(),
            format!("Input: {}", self.source),
            format!("Generated: {}", self.generated),
        ]
    }

    fn stats_lines(&self) -> [String; 3] {
        let agg = self.aggregates;
        let range = match (agg.earliest, agg.latest) {
            (Some(start), Some(stop)) => {
                format!("Date range: {} -- {}", format_timestamp(start), format_timestamp(stop))
            }
            _ => "Date range: none".to_string(),
        };
        let packets = format!(
            "Packets analyzed: {} ({})",
            comma_number_string(agg.packet_count),
            pretty_byte_total(agg.byte_count)
        );
        let t = agg.transport_breakdown();
        let transports = format!(
            "Transports: IPv4 {:.2}% IPv6 {:.2}% ARP {:.2}% Other {:.2}%",
            t.ipv4, t.ipv6, t.arp, t.other
        );
        [range, packets, transports]
    }
}

/// `"<rank>) <key> - <bytes> (<pct>%)"` for one ranked entry, or `None` when
/// the rank is absent, empty, or the store total is zero.
pub fn rank_line<S>(store: &S, rank: usize) -> Option<String>
where
    S: RankedStore,
    S::Key: Display,
{
    let entry = store.at(rank).filter(|e| e.count > 0)?;
    let pct = percentage(entry.count, store.total())?;
    Some(format!(
        "{}) {} - {} ({}%)",
        rank + 1,
        entry.key,
        pretty_byte_total(entry.count),
        pct
    ))
}

pub struct RenderPass<'c, 'l> {
    canvas: &'c mut dyn Canvas,
    layout: &'l LayoutConfig,
    area: Bounds,
    cursor: LayoutCursor,
}

impl<'c, 'l> RenderPass<'c, 'l> {
    pub fn new(canvas: &'c mut dyn Canvas, layout: &'l LayoutConfig, area: Bounds) -> Self {
        RenderPass {
            canvas,
            layout,
            area,
            cursor: LayoutCursor::new(),
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor.position()
    }

    pub fn area(&self) -> Bounds {
        self.area
    }

    /// Region of the content area at the cursor, in page coordinates.
    fn region(&self, x: f64, width: f64, height: f64) -> Bounds {
        Bounds::new(self.area.x + x, self.area.y + self.cursor.position(), width, height)
    }

    fn render_text(&mut self, text: &str, font_size: f64, x_offset: f64) -> Result<TextExtents> {
        let extents = self.canvas.measure_text(text, font_size);
        let at = self.region(x_offset, extents.width, extents.height);
        self.canvas.draw_text(text, at.x, at.y, font_size, BLACK)?;
        Ok(extents)
    }

    fn render_text_line(&mut self, text: &str, font_size: f64, line_space: f64) -> Result<()> {
        let extents = self.render_text(text, font_size, 0.0)?;
        self.cursor.advance(extents.height + line_space);
        Ok(())
    }

    pub fn render_header(&mut self, header: &Header<'_>) -> Result<()> {
        let font_size = self.layout.header_font_size;
        let line_space = font_size * self.layout.line_space_factor;

        for line in header.identity_lines() {
            self.render_text_line(&line, font_size, line_space)?;
        }
        self.cursor.advance(line_space * HEADER_BLOCK_PAD_LINES);

        for line in header.stats_lines() {
            self.render_text_line(&line, font_size, line_space)?;
        }
        self.cursor.advance(line_space * HEADER_BLOCK_PAD_LINES);

        debug!(cursor = self.cursor(), "header rendered");
        Ok(())
    }

    /// Draws a full-width chart of `height` and moves the cursor by
    /// `height * pad_factor`.
    pub fn render_block(&mut self, view: &dyn ChartView, height: f64, pad_factor: f64) -> Result<Bounds> {
        let bounds = self.region(0.0, self.area.width, height);
        view.render(&mut *self.canvas, bounds)?;
        self.cursor.advance(height * pad_factor);
        debug!(title = view.title(), y = bounds.y, height, cursor = self.cursor(), "chart rendered");
        Ok(bounds)
    }

    /// Two charts side by side followed by their top-N text rows.
    pub fn render_ranked_pair<S>(&mut self, left: &RankChart<'_, S>, right: &RankChart<'_, S>, height: f64) -> Result<(Bounds, Bounds)>
    where
        S: RankedStore,
        S::Key: BarKey,
    {
        let width = self.area.width / self.layout.pair_width_divisor;
        let right_x = self.area.width - width;
        let left_bounds = self.region(0.0, width, height);
        let right_bounds = self.region(right_x, width, height);

        left.render(&mut *self.canvas, left_bounds)?;
        right.render(&mut *self.canvas, right_bounds)?;
        self.cursor.advance(left_bounds.height.max(right_bounds.height));

        let font_size = self.layout.top_list_font_size;
        for rank in 0..self.layout.top_n_text {
            let left_line = rank_line(left.store(), rank);
            let right_line = rank_line(right.store(), rank);
            if left_line.is_none() && right_line.is_none() {
                continue;
            }

            let mut row_height: f64 = 0.0;
            if let Some(text) = left_line {
                row_height = row_height.max(self.render_text(&text, font_size, 0.0)?.height);
            }
            if let Some(text) = right_line {
                row_height = row_height.max(self.render_text(&text, font_size, right_x)?.height);
            }
            self.cursor.advance(row_height * TOP_LIST_ROW_FACTOR);
        }

        let tallest = left_bounds.height.max(right_bounds.height);
        self.cursor.advance(tallest * (self.layout.histogram_pad_factor_y - 1.0));
        debug!(left = left.title(), right = right.title(), cursor = self.cursor(), "chart pair rendered");
        Ok((left_bounds, right_bounds))
    }
}
