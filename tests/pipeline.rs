use std::fs;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use etherparse::PacketBuilder;
use netviz::canvas::RecordingCanvas;
use netviz::capture;
use netviz::config::{LayoutConfig, ReportConfig};
use netviz::models::domain::{ETHERTYPE_ARP, ETHERTYPE_IPV4};
use netviz::palette::PortPalette;
use netviz::store::RankedStore;
use netviz::{OnePageReport, ReportError, Timestamp};

fn tcp_frame(src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload_len: usize) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1; 6], [2; 6]).ipv4(src, dst, 64).tcp(sport, dport, 1, 1024);
    let payload = vec![0u8; payload_len];
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, &payload).unwrap();
    frame
}

fn arp_frame() -> Vec<u8> {
    let mut frame = vec![0xff; 12];
    frame.extend_from_slice(&ETHERTYPE_ARP.to_be_bytes());
    frame.extend_from_slice(&[0u8; 28]);
    frame
}

fn write_pcap(path: &Path, frames: &[(u32, u32, Vec<u8>)]) {
    let mut out = Vec::new();
    out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    for (secs, micros, data) in frames {
        out.extend_from_slice(&secs.to_le_bytes());
        out.extend_from_slice(&micros.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(data);
    }
    fs::File::create(path).unwrap().write_all(&out).unwrap();
}

fn sample_frames() -> Vec<(u32, u32, Vec<u8>)> {
    vec![
        (1_700_000_000, 10, tcp_frame([10, 0, 0, 1], [10, 0, 0, 9], 80, 50000, 1000)),
        (1_700_000_001, 5, tcp_frame([10, 0, 0, 2], [10, 0, 0, 9], 443, 50001, 400)),
        (1_700_000_001, 900, tcp_frame([10, 0, 0, 1], [10, 0, 0, 9], 80, 50000, 1000)),
        (1_700_000_002, 0, arp_frame()),
    ]
}

fn ingest(path: &Path, config: ReportConfig) -> OnePageReport {
    let mut report = OnePageReport::new(config, LayoutConfig::default(), PortPalette::default());
    let (rx, handle) = capture::spawn_capture(path.to_path_buf());
    for record in rx {
        report.ingest_packet(&record);
    }
    let stats = handle.join().unwrap().unwrap();
    assert_eq!(stats.frames, 4);
    assert_eq!(stats.records, 4);
    report
}

#[test]
fn capture_to_aggregates() {
    let dir = tempfile::tempdir().unwrap();
    let pcap = dir.path().join("sample.pcap");
    let frames = sample_frames();
    write_pcap(&pcap, &frames);

    let report = ingest(&pcap, ReportConfig::new("sample.pcap"));
    let stats = report.stats();
    let agg = &stats.aggregates;

    assert_eq!(agg.packet_count, 4);
    assert_eq!(agg.byte_count, frames.iter().map(|f| f.2.len() as u64).sum::<u64>());
    assert_eq!(agg.earliest, Some(Timestamp::new(1_700_000_000, 10)));
    assert_eq!(agg.latest, Some(Timestamp::new(1_700_000_001, 900)));
    assert_eq!(agg.transport_count(ETHERTYPE_IPV4), 3);
    assert_eq!(agg.transport_count(ETHERTYPE_ARP), 1);

    let top_src = stats.src_addresses.at(0).unwrap();
    assert_eq!(top_src.key, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
    assert_eq!(top_src.count, 2 * 1040);
    assert_eq!(stats.dst_addresses.size(), 1);
    assert_eq!(stats.src_ports.at(0).map(|e| e.key), Some(80));
    assert_eq!(stats.src_ports.total(), 2 * 1040 + 440);
    assert_eq!(stats.packet_histogram.total(), 3);
}

#[test]
fn capture_to_rendered_page() {
    let dir = tempfile::tempdir().unwrap();
    let pcap = dir.path().join("sample.pcap");
    write_pcap(&pcap, &sample_frames());
    let report = ingest(&pcap, ReportConfig::new("sample.pcap"));

    let mut canvas = RecordingCanvas::new();
    report.render_page(&mut canvas, chrono::Local::now()).unwrap();
    assert!(canvas.find_text("Input: sample.pcap").is_some());
    assert!(canvas.find_text("1) 10.0.0.1 - 2.08 KB (82%)").is_some());
    assert!(canvas.find_text("1) 80 - 2.08 KB (82%)").is_some());
    assert!(canvas.find_text("2) 443 - 440.00 B (17%)").is_some());
    assert!(canvas.find_text("Transports: IPv4 75.00% IPv6 0.00% ARP 25.00% Other 0.00%").is_some());

    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let page = report.render(&out).unwrap();
    let svg = fs::read_to_string(page).unwrap();
    assert!(svg.contains("Top Source Addresses"));
    assert!(svg.contains("2) 443 - 440.00 B (17%)"));
}

#[test]
fn missing_capture_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let (rx, handle) = capture::spawn_capture(dir.path().join("absent.pcap"));
    assert_eq!(rx.iter().count(), 0);
    let err = handle.join().unwrap().unwrap_err();
    assert!(matches!(err, ReportError::Io { .. }));
}

#[test]
fn summary_json_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let pcap = dir.path().join("sample.pcap");
    write_pcap(&pcap, &sample_frames());
    let report = ingest(&pcap, ReportConfig::new("sample.pcap"));

    let json_path = dir.path().join("summary.json");
    report.write_summary_json(&json_path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
    assert_eq!(value["packet_count"], 4);
    assert_eq!(value["top_source_ports"][0]["key"], "80");
    assert_eq!(value["top_source_ports"][0]["percentage"], 82);
}
