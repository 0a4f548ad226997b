// src/capture.rs
use std::fs::File;
use std::io::BufReader;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use etherparse::{Ethernet2HeaderSlice, LaxNetSlice, LaxSlicedPacket, TransportSlice};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, Linktype, PcapBlockOwned, PcapError};
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::models::domain::{IpInfo, PacketRecord, TcpPorts, Timestamp};

const READ_BUFFER_SIZE: usize = 65536;
const IPV6_HEADER_LEN: u32 = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    pub records: u64,
    pub skipped: u64,
}

/// Turns one Ethernet frame into a packet record. Layers that fail to parse
/// are left out; only a frame too short for an Ethernet header is dropped.
///
/// Frames cut short by the capture snaplen keep their IP and TCP headers,
/// and `datagram_len` still comes from the IP header, not from `caplen`.
pub fn parse_frame(timestamp: Timestamp, caplen: u32, data: &[u8]) -> Option<PacketRecord> {
    let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
    let mut record = PacketRecord::non_ip(timestamp, caplen, eth.ether_type().0);

    let sliced = match LaxSlicedPacket::from_ethernet(data) {
        Ok(sliced) => sliced,
        Err(e) => {
            debug!(error = ?e, "frame kept at link layer");
            return Some(record);
        }
    };
    if let Some((e, layer)) = &sliced.stop_err {
        debug!(error = ?e, ?layer, "frame only partially decoded");
    }

    let (source, destination, datagram_len) = match &sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => {
            let header = ipv4.header();
            (
                IpAddr::V4(header.source_addr()),
                IpAddr::V4(header.destination_addr()),
                header.total_len() as u32,
            )
        }
        Some(LaxNetSlice::Ipv6(ipv6)) => {
            let header = ipv6.header();
            (
                IpAddr::V6(header.source_addr()),
                IpAddr::V6(header.destination_addr()),
                header.payload_length() as u32 + IPV6_HEADER_LEN,
            )
        }
        _ => return Some(record),
    };

    let tcp = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => Some(TcpPorts {
            source: tcp.source_port(),
            destination: tcp.destination_port(),
        }),
        _ => None,
    };

    record.ip = Some(IpInfo {
        source,
        destination,
        datagram_len,
        tcp,
    });
    Some(record)
}

fn capture_err<E: std::fmt::Debug>(path: &Path, e: E) -> ReportError {
    ReportError::Capture(format!("{}: {:?}", path.display(), e))
}

/// Reads a legacy pcap file and sends every parsed frame down `sender`.
pub fn read_capture(path: &Path, sender: &Sender<PacketRecord>) -> Result<CaptureStats> {
    let file = File::open(path).map_err(|e| ReportError::io(path, e))?;
    let mut reader = LegacyPcapReader::new(READ_BUFFER_SIZE, BufReader::new(file)).map_err(|e| capture_err(path, e))?;
    let mut stats = CaptureStats::default();
    let mut nanosecond = false;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let record = match block {
                    PcapBlockOwned::LegacyHeader(ref header) => {
                        if header.network != Linktype::ETHERNET {
                            return Err(capture_err(path, format!("unsupported link type {:?}", header.network)));
                        }
                        nanosecond = header.is_nanosecond_precision();
                        debug!(nanosecond, snaplen = header.snaplen, "pcap header");
                        None
                    }
                    PcapBlockOwned::Legacy(ref frame) => {
                        stats.frames += 1;
                        // field holds nanoseconds in nanosecond-magic files
                        let micros = if nanosecond { frame.ts_usec / 1000 } else { frame.ts_usec };
                        let ts = Timestamp::new(frame.ts_sec as i64, micros);
                        let parsed = parse_frame(ts, frame.caplen, frame.data);
                        if parsed.is_none() {
                            stats.skipped += 1;
                        }
                        parsed
                    }
                    PcapBlockOwned::NG(_) => {
                        stats.skipped += 1;
                        None
                    }
                };
                drop(block);
                reader.consume(offset);

                if let Some(record) = record {
                    if sender.send(record).is_err() {
                        debug!("record consumer went away, stopping capture");
                        break;
                    }
                    stats.records += 1;
                }
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete) => {
                reader.refill().map_err(|e| capture_err(path, e))?;
            }
            Err(e) => return Err(capture_err(path, e)),
        }
    }

    if stats.skipped > 0 {
        warn!(skipped = stats.skipped, path = %path.display(), "frames skipped");
    }
    info!(frames = stats.frames, records = stats.records, "capture read");
    Ok(stats)
}

/// Reads `path` on its own thread; records arrive on the returned channel in
/// file order and the channel closes when the file is exhausted.
pub fn spawn_capture(path: PathBuf) -> (Receiver<PacketRecord>, JoinHandle<Result<CaptureStats>>) {
    let (tx, rx) = unbounded();
    let handle = thread::spawn(move || read_capture(&path, &tx));
    (rx, handle)
}
