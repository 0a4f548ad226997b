use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::canvas::{Canvas, SvgCanvas};
use crate::charts::{NetMapChart, PacketFallChart, RankChart, TimeHistogramChart};
use crate::config::{LayoutConfig, ReportConfig};
use crate::error::{ReportError, Result};
use crate::format::{format_datetime, percentage};
use crate::layout::{Header, RenderPass};
use crate::models::domain::PacketRecord;
use crate::models::dto::{RankedEntryDTO, ReportSummary, TransportBreakdownDTO};
use crate::palette::PortPalette;
use crate::stats::StatsAggregator;
use crate::store::RankedStore;

pub const TITLE_VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

const NET_MAP_CELLS: usize = 8;

/// Heading for a ranked chart: "Top <label>" with data, "No <label>" without.
pub fn store_title<S: RankedStore>(label: &str, store: &S) -> String {
    if store.is_empty() {
        format!("No {}", label)
    } else {
        format!("Top {}", label)
    }
}

/// Report file being rendered. Bytes go to a temporary file next to the
/// target, which replaces the target only on commit; dropping the guard
/// uncommitted removes the temporary file and leaves any earlier report
/// in place.
struct OutputArtifact {
    path: PathBuf,
    temp: NamedTempFile,
}

impl OutputArtifact {
    fn create(path: PathBuf) -> Result<Self> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let temp = NamedTempFile::new_in(dir).map_err(|e| ReportError::io(&path, e))?;
        debug!(temp = %temp.path().display(), "report staging file created");
        Ok(OutputArtifact { path, temp })
    }

    fn commit(mut self, contents: &[u8]) -> Result<PathBuf> {
        self.temp
            .write_all(contents)
            .and_then(|_| self.temp.flush())
            .map_err(|e| ReportError::io(&self.path, e))?;
        self.temp
            .persist(&self.path)
            .map_err(|e| ReportError::io(&self.path, e.error))?;
        Ok(self.path)
    }
}

/// Aggregates packet records and renders them as a single report page.
#[derive(Debug, Clone)]
pub struct OnePageReport {
    config: ReportConfig,
    layout: LayoutConfig,
    stats: StatsAggregator,
}

impl OnePageReport {
    pub fn new(config: ReportConfig, layout: LayoutConfig, palette: PortPalette) -> Self {
        OnePageReport {
            config,
            layout,
            stats: StatsAggregator::new(palette),
        }
    }

    pub fn ingest_packet(&mut self, record: &PacketRecord) {
        self.stats.ingest_packet(record);
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// Writes the page to `<outdir>/<filename>` and returns the path.
    pub fn render(&self, outdir: &Path) -> Result<PathBuf> {
        let path = outdir.join(&self.config.filename);
        info!(
            path = %path.display(),
            packets = self.stats.aggregates.packet_count,
            "rendering report"
        );
        let artifact = OutputArtifact::create(path)?;

        let mut page = String::new();
        {
            let mut canvas = SvgCanvas::new(&mut page, self.layout.page())?;
            self.render_page(&mut canvas, Local::now())?;
            canvas.present()?;
        }

        let path = artifact.commit(page.as_bytes())?;
        info!(path = %path.display(), bytes = page.len(), "report written");
        Ok(path)
    }

    /// Runs one layout pass over `canvas` and returns the final cursor.
    pub fn render_page(&self, canvas: &mut dyn Canvas, generated: DateTime<Local>) -> Result<f64> {
        let layout = &self.layout;
        let stats = &self.stats;
        let palette = stats.palette();
        let pad = layout.histogram_pad_factor_y;

        let mut pass = RenderPass::new(canvas, layout, layout.content_bounds());

        pass.render_header(&Header {
            title: TITLE_VERSION,
            source: &self.config.source_identifier,
            generated: format_datetime(&generated),
            aggregates: &stats.aggregates,
        })?;

        let packets = TimeHistogramChart::new("TCP Packets Received", &stats.packet_histogram, palette, layout.time_bins);
        pass.render_block(&packets, layout.packet_histogram_height, pad)?;

        if self.config.debug_charts {
            let map = NetMapChart::new("Network Map", &stats.net_map, NET_MAP_CELLS);
            pass.render_block(&map, layout.packet_histogram_height, pad)?;
            let fall = PacketFallChart::new("Packet Fall", &stats.packet_fall, palette);
            pass.render_block(&fall, layout.packet_histogram_height, pad)?;
        }

        let src_addrs = RankChart::new(
            store_title("Source Addresses", &stats.src_addresses),
            &stats.src_addresses,
            palette,
            layout.top_n_bars,
        );
        let dst_addrs = RankChart::new(
            store_title("Destination Addresses", &stats.dst_addresses),
            &stats.dst_addresses,
            palette,
            layout.top_n_bars,
        );
        pass.render_ranked_pair(&src_addrs, &dst_addrs, layout.address_histogram_height)?;

        let src_ports = RankChart::new(
            store_title("Source Ports", &stats.src_ports),
            &stats.src_ports,
            palette,
            layout.top_n_bars,
        );
        let dst_ports = RankChart::new(
            store_title("Destination Ports", &stats.dst_ports),
            &stats.dst_ports,
            palette,
            layout.top_n_bars,
        );
        pass.render_ranked_pair(&src_ports, &dst_ports, layout.port_histogram_height)?;

        let end = pass.cursor();
        if end > pass.area().height {
            warn!(end, available = pass.area().height, "report content runs past the page");
        }
        Ok(end)
    }

    pub fn summary(&self) -> ReportSummary {
        let agg = &self.stats.aggregates;
        let t = agg.transport_breakdown();
        let n = self.layout.top_n_text;
        ReportSummary {
            source: self.config.source_identifier.clone(),
            packet_count: agg.packet_count,
            byte_count: agg.byte_count,
            earliest: agg.earliest,
            latest: agg.latest,
            transports: TransportBreakdownDTO {
                ipv4: t.ipv4,
                ipv6: t.ipv6,
                arp: t.arp,
                other: t.other,
            },
            top_source_addresses: ranked_dto(&self.stats.src_addresses, n),
            top_destination_addresses: ranked_dto(&self.stats.dst_addresses, n),
            top_source_ports: ranked_dto(&self.stats.src_ports, n),
            top_destination_ports: ranked_dto(&self.stats.dst_ports, n),
        }
    }

    pub fn write_summary_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| ReportError::io(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.summary())
            .map_err(|e| ReportError::io(path, e.into()))?;
        writer.flush().map_err(|e| ReportError::io(path, e))
    }
}

fn ranked_dto<S>(store: &S, n: usize) -> Vec<RankedEntryDTO>
where
    S: RankedStore,
    S::Key: Display,
{
    store
        .top(n)
        .into_iter()
        .enumerate()
        .filter(|(_, e)| e.count > 0)
        .map(|(i, e)| RankedEntryDTO {
            rank: i + 1,
            key: e.key.to_string(),
            count: e.count,
            percentage: percentage(e.count, store.total()).unwrap_or(0),
        })
        .collect()
}
