use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Parser;
use crossbeam_channel::Receiver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use netviz::capture;
use netviz::config::{LayoutConfig, PortAlias, ReportConfig, DEFAULT_FILENAME};
use netviz::palette::PortPalette;
use netviz::{OnePageReport, PacketRecord};

#[derive(Parser, Debug)]
#[command(author, version, about = "Render a one-page traffic report from a pcap capture")]
struct Args {
    /// Input .pcap file (Ethernet link type)
    #[arg(short, long)]
    input: PathBuf,

    /// Directory the report is written into
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Report file name
    #[arg(short, long, default_value = DEFAULT_FILENAME)]
    filename: String,

    /// Text describing the input, shown in the header (defaults to the input path)
    #[arg(short, long)]
    source: Option<String>,

    /// JSON file overriding page layout constants
    #[arg(long)]
    layout: Option<PathBuf>,

    /// Port alias applied before aggregation, e.g. 8080=80 (repeatable)
    #[arg(long = "alias")]
    aliases: Vec<PortAlias>,

    /// Also write the report summary as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Include the network map and packet fall charts (same as setting DEBUG)
    #[arg(long, default_value_t = false)]
    debug_charts: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let layout = match &args.layout {
        Some(path) => LayoutConfig::from_json_file(path)?,
        None => LayoutConfig::default(),
    };
    let palette = args
        .aliases
        .iter()
        .fold(PortPalette::default(), |palette, alias| palette.with_alias(alias.from, alias.to));
    let mut config = ReportConfig::new(
        args.source
            .clone()
            .unwrap_or_else(|| args.input.display().to_string()),
    )
    .with_env();
    config.filename = args.filename.clone();
    config.debug_charts |= args.debug_charts;

    let mut report = OnePageReport::new(config, layout, palette);

    let (rx, capture_thread) = capture::spawn_capture(args.input.clone());
    process_events(rx, &mut report);
    let stats = capture_thread
        .join()
        .map_err(|_| anyhow!("capture thread panicked"))?
        .with_context(|| format!("reading {}", args.input.display()))?;
    info!(
        frames = stats.frames,
        skipped = stats.skipped,
        packets = report.stats().aggregates.packet_count,
        "ingestion finished"
    );

    let path = report
        .render(&args.output_dir)
        .with_context(|| format!("rendering into {}", args.output_dir.display()))?;
    println!("Report written to {}", path.display());

    if let Some(summary_path) = &args.summary_json {
        report
            .write_summary_json(summary_path)
            .with_context(|| format!("writing summary to {}", summary_path.display()))?;
        println!("Summary written to {}", summary_path.display());
    }
    Ok(())
}

fn process_events(rx: Receiver<PacketRecord>, report: &mut OnePageReport) {
    for record in rx {
        report.ingest_packet(&record);
    }
}
