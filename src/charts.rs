//! Chart views. Each view draws itself inside the bounds the layout engine
//! hands it and never outside them.

use std::fmt;
use std::net::IpAddr;

use chrono::{Local, TimeZone};

use crate::canvas::{Bounds, Canvas, Rgb, BLACK};
use crate::error::Result;
use crate::palette::PortPalette;
use crate::store::{NetMap, PacketFall, RankedStore, TimeHistogram};

const TITLE_FONT_SIZE: f64 = 8.0;
const TICK_FONT_SIZE: f64 = 6.0;
const TITLE_GAP: f64 = 3.0;
const AXIS_LEFT_PAD: f64 = 24.0;
const AXIS_BOTTOM_PAD: f64 = 10.0;
const AXIS_COLOR: Rgb = Rgb::new(0.2, 0.2, 0.2);

pub trait ChartView {
    fn title(&self) -> &str;

    fn render(&self, canvas: &mut dyn Canvas, bounds: Bounds) -> Result<()>;
}

/// Draws the title and both axes, returning the area left for the plot.
fn render_frame(canvas: &mut dyn Canvas, bounds: Bounds, title: &str) -> Result<Bounds> {
    let extents = canvas.measure_text(title, TITLE_FONT_SIZE);
    canvas.draw_text(title, bounds.x, bounds.y, TITLE_FONT_SIZE, BLACK)?;

    let top = bounds.y + extents.height + TITLE_GAP;
    let plot = Bounds::new(
        bounds.x + AXIS_LEFT_PAD,
        top,
        (bounds.width - AXIS_LEFT_PAD).max(0.0),
        (bounds.bottom() - top - AXIS_BOTTOM_PAD).max(0.0),
    );
    canvas.draw_line((plot.x, plot.y), (plot.x, plot.bottom()), AXIS_COLOR)?;
    canvas.draw_line((plot.x, plot.bottom()), (plot.right(), plot.bottom()), AXIS_COLOR)?;
    Ok(plot)
}

fn render_y_max(canvas: &mut dyn Canvas, plot: Bounds, max: u64) -> Result<()> {
    let label = max.to_string();
    let extents = canvas.measure_text(&label, TICK_FONT_SIZE);
    let x = (plot.x - extents.width - 2.0).max(plot.x - AXIS_LEFT_PAD);
    canvas.draw_text(&label, x, plot.y, TICK_FONT_SIZE, BLACK)
}

/// Key of a bar in a ranked chart.
pub trait BarKey: fmt::Display {
    fn port(&self) -> Option<u16> {
        None
    }
}

impl BarKey for IpAddr {}

impl BarKey for u16 {
    fn port(&self) -> Option<u16> {
        Some(*self)
    }
}

/// Vertical bars for the heaviest entries of a ranked store.
pub struct RankChart<'a, S> {
    title: String,
    store: &'a S,
    palette: &'a PortPalette,
    max_bars: usize,
}

impl<'a, S> RankChart<'a, S>
where
    S: RankedStore,
    S::Key: BarKey,
{
    pub fn new(title: impl Into<String>, store: &'a S, palette: &'a PortPalette, max_bars: usize) -> Self {
        RankChart {
            title: title.into(),
            store,
            palette,
            max_bars,
        }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    fn bar_color(&self, key: &S::Key) -> Rgb {
        key.port()
            .map_or(self.palette.default_color(), |port| self.palette.color(port))
    }
}

impl<S> ChartView for RankChart<'_, S>
where
    S: RankedStore,
    S::Key: BarKey,
{
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, canvas: &mut dyn Canvas, bounds: Bounds) -> Result<()> {
        let plot = render_frame(canvas, bounds, &self.title)?;
        let entries = self.store.top(self.max_bars);
        let Some(max) = entries.first().map(|e| e.count).filter(|&c| c > 0) else {
            return Ok(());
        };
        render_y_max(canvas, plot, max)?;

        let slot = plot.width / self.max_bars.max(1) as f64;
        let bar_width = slot * 0.8;
        for (rank, entry) in entries.iter().enumerate() {
            let height = plot.height * entry.count as f64 / max as f64;
            let x = plot.x + slot * rank as f64 + (slot - bar_width) / 2.0;
            let bar = Bounds::new(x, plot.bottom() - height, bar_width, height);
            canvas.draw_rect(bar, self.bar_color(&entry.key), true)?;

            let label = (rank + 1).to_string();
            let extents = canvas.measure_text(&label, TICK_FONT_SIZE);
            canvas.draw_text(
                &label,
                x + (bar_width - extents.width) / 2.0,
                plot.bottom() + 1.0,
                TICK_FONT_SIZE,
                BLACK,
            )?;
        }
        Ok(())
    }
}

/// Packets over time, each bar stacked by source-port color.
pub struct TimeHistogramChart<'a> {
    title: String,
    histogram: &'a TimeHistogram,
    palette: &'a PortPalette,
    bins: usize,
}

impl<'a> TimeHistogramChart<'a> {
    pub fn new(title: impl Into<String>, histogram: &'a TimeHistogram, palette: &'a PortPalette, bins: usize) -> Self {
        TimeHistogramChart {
            title: title.into(),
            histogram,
            palette,
            bins,
        }
    }
}

fn clock_label(secs: i64) -> String {
    Local
        .timestamp_opt(secs, 0)
        .earliest()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

impl ChartView for TimeHistogramChart<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, canvas: &mut dyn Canvas, bounds: Bounds) -> Result<()> {
        let plot = render_frame(canvas, bounds, &self.title)?;
        let bins = self.histogram.bins(self.bins);
        let Some(max) = bins.iter().map(|b| b.total).max().filter(|&m| m > 0) else {
            return Ok(());
        };
        render_y_max(canvas, plot, max)?;

        let slot = plot.width / bins.len() as f64;
        for (i, bin) in bins.iter().enumerate() {
            let x = plot.x + slot * i as f64;
            let mut base = plot.bottom();
            let mut remaining = bin.total;

            for (port, color) in self.palette.colored_ports() {
                let count = bin.ports.get(&port).copied().unwrap_or(0);
                if count == 0 {
                    continue;
                }
                let height = plot.height * count as f64 / max as f64;
                base -= height;
                canvas.draw_rect(Bounds::new(x, base, slot, height), color, true)?;
                remaining -= count;
            }
            if remaining > 0 {
                let height = plot.height * remaining as f64 / max as f64;
                base -= height;
                canvas.draw_rect(Bounds::new(x, base, slot, height), self.palette.default_color(), true)?;
            }
        }

        if let Some((first, last)) = self.histogram.span() {
            let start = clock_label(first);
            let stop = clock_label(last);
            let stop_width = canvas.measure_text(&stop, TICK_FONT_SIZE).width;
            canvas.draw_text(&start, plot.x, plot.bottom() + 1.0, TICK_FONT_SIZE, BLACK)?;
            canvas.draw_text(&stop, plot.right() - stop_width, plot.bottom() + 1.0, TICK_FONT_SIZE, BLACK)?;
        }
        Ok(())
    }
}

/// Source-by-destination matrix of the heaviest address pairs.
pub struct NetMapChart<'a> {
    title: String,
    map: &'a NetMap,
    cells: usize,
}

const NET_MAP_PAIRS_SCANNED: usize = 256;

impl<'a> NetMapChart<'a> {
    pub fn new(title: impl Into<String>, map: &'a NetMap, cells: usize) -> Self {
        NetMapChart {
            title: title.into(),
            map,
            cells: cells.max(1),
        }
    }

    fn axes(&self) -> (Vec<IpAddr>, Vec<IpAddr>) {
        let mut sources = Vec::new();
        let mut destinations = Vec::new();
        for entry in self.map.top(NET_MAP_PAIRS_SCANNED) {
            let (src, dst) = entry.key;
            if sources.len() < self.cells && !sources.contains(&src) {
                sources.push(src);
            }
            if destinations.len() < self.cells && !destinations.contains(&dst) {
                destinations.push(dst);
            }
        }
        (sources, destinations)
    }
}

impl ChartView for NetMapChart<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, canvas: &mut dyn Canvas, bounds: Bounds) -> Result<()> {
        let plot = render_frame(canvas, bounds, &self.title)?;
        let Some(max) = self.map.at(0).map(|e| e.count).filter(|&c| c > 0) else {
            return Ok(());
        };
        let (sources, destinations) = self.axes();
        let cell_w = plot.width / destinations.len().max(1) as f64;
        let cell_h = plot.height / sources.len().max(1) as f64;

        for (row, src) in sources.iter().enumerate() {
            for (col, dst) in destinations.iter().enumerate() {
                let Some(weight) = self.map.get(&(*src, *dst)) else {
                    continue;
                };
                let shade = 1.0 - 0.85 * (weight as f64 / max as f64);
                let cell = Bounds::new(plot.x + cell_w * col as f64, plot.y + cell_h * row as f64, cell_w, cell_h);
                canvas.draw_rect(cell, Rgb::new(shade, shade, shade), true)?;
            }
        }
        Ok(())
    }
}

/// Scatter of sampled TCP packets: time across, source port down.
pub struct PacketFallChart<'a> {
    title: String,
    fall: &'a PacketFall,
    palette: &'a PortPalette,
}

const FALL_DOT_SIZE: f64 = 1.0;

impl<'a> PacketFallChart<'a> {
    pub fn new(title: impl Into<String>, fall: &'a PacketFall, palette: &'a PortPalette) -> Self {
        PacketFallChart {
            title: title.into(),
            fall,
            palette,
        }
    }
}

impl ChartView for PacketFallChart<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, canvas: &mut dyn Canvas, bounds: Bounds) -> Result<()> {
        let plot = render_frame(canvas, bounds, &self.title)?;
        let points = self.fall.points();
        let (Some(first), Some(last)) = (
            points.iter().map(|p| p.timestamp).min(),
            points.iter().map(|p| p.timestamp).max(),
        ) else {
            return Ok(());
        };
        let start = first.as_secs_f64();
        let span = (last.as_secs_f64() - start).max(f64::EPSILON);
        let usable_w = (plot.width - FALL_DOT_SIZE).max(0.0);
        let usable_h = (plot.height - FALL_DOT_SIZE).max(0.0);

        for point in points {
            let fx = (point.timestamp.as_secs_f64() - start) / span;
            let fy = point.source_port as f64 / u16::MAX as f64;
            let dot = Bounds::new(plot.x + fx * usable_w, plot.y + fy * usable_h, FALL_DOT_SIZE, FALL_DOT_SIZE);
            canvas.draw_rect(dot, self.palette.color(point.source_port), true)?;
        }
        Ok(())
    }
}
