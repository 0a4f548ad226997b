use std::collections::BTreeMap;

use tracing::trace;

use crate::models::domain::{PacketRecord, Timestamp, ETHERTYPE_ARP, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
use crate::palette::PortPalette;
use crate::store::{AddressHistogram, FallPoint, NetMap, PacketFall, PortHistogram, RankedStore, TimeHistogram};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningAggregates {
    pub packet_count: u64,
    pub byte_count: u64,
    pub earliest: Option<Timestamp>,
    pub latest: Option<Timestamp>,
    pub transport_counts: BTreeMap<u16, u64>,
}

/// Share of each link-layer transport, in percent of all ingested frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportBreakdown {
    pub ipv4: f64,
    pub ipv6: f64,
    pub arp: f64,
    pub other: f64,
}

impl RunningAggregates {
    pub fn transport_total(&self) -> u64 {
        self.transport_counts.values().sum()
    }

    pub fn transport_count(&self, ether_type: u16) -> u64 {
        self.transport_counts.get(&ether_type).copied().unwrap_or(0)
    }

    /// All zeros when nothing was ingested.
    pub fn transport_breakdown(&self) -> TransportBreakdown {
        let total = self.transport_total();
        if total == 0 {
            return TransportBreakdown::default();
        }
        let share = |n: u64| n as f64 / total as f64 * 100.0;
        let ipv4 = share(self.transport_count(ETHERTYPE_IPV4));
        let ipv6 = share(self.transport_count(ETHERTYPE_IPV6));
        let arp = share(self.transport_count(ETHERTYPE_ARP));
        TransportBreakdown {
            ipv4,
            ipv6,
            arp,
            other: 100.0 - (ipv4 + ipv6 + arp),
        }
    }
}

/// Consumes packet records one at a time and feeds every aggregate store.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    pub aggregates: RunningAggregates,
    pub src_addresses: AddressHistogram,
    pub dst_addresses: AddressHistogram,
    pub src_ports: PortHistogram,
    pub dst_ports: PortHistogram,
    pub packet_histogram: TimeHistogram,
    pub packet_fall: PacketFall,
    pub net_map: NetMap,
    palette: PortPalette,
}

impl StatsAggregator {
    pub fn new(palette: PortPalette) -> Self {
        StatsAggregator {
            palette,
            ..Default::default()
        }
    }

    /// Best-effort: records that are not IP, or IP but not TCP, stop short
    /// silently once the remaining stores no longer apply.
    pub fn ingest_packet(&mut self, record: &PacketRecord) {
        self.update_time_range(record.timestamp);

        let agg = &mut self.aggregates;
        agg.packet_count += 1;
        agg.byte_count = agg.byte_count.saturating_add(record.caplen as u64);
        *agg.transport_counts.entry(record.ether_type).or_insert(0) += 1;

        let Some(ip) = record.ip else {
            trace!(ether_type = record.ether_type, "non-IP record");
            return;
        };

        let weight = ip.datagram_len as u64;
        self.src_addresses.add(ip.source, weight);
        self.dst_addresses.add(ip.destination, weight);
        self.net_map.add((ip.source, ip.destination), weight);

        let Some(tcp) = ip.tcp else {
            return;
        };

        let source = self.palette.alias(tcp.source);
        let destination = self.palette.alias(tcp.destination);
        self.packet_histogram.insert(record.timestamp, source);
        self.packet_fall.push(FallPoint {
            timestamp: record.timestamp,
            source_port: source,
            destination_port: destination,
        });
        self.src_ports.add(source, weight);
        self.dst_ports.add(destination, weight);
    }

    // earliest/latest are a true min/max over (secs, micros) ordering
    fn update_time_range(&mut self, ts: Timestamp) {
        let agg = &mut self.aggregates;
        agg.earliest = Some(agg.earliest.map_or(ts, |e| e.min(ts)));
        agg.latest = Some(agg.latest.map_or(ts, |l| l.max(ts)));
    }

    pub fn palette(&self) -> &PortPalette {
        &self.palette
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use super::*;

    fn v4(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn tcp4(secs: i64, micros: u32, sport: u16, dport: u16, len: u32) -> PacketRecord {
        PacketRecord::ip(Timestamp::new(secs, micros), len + 14, v4(1), v4(2), len).with_tcp(sport, dport)
    }

    #[test]
    fn counts_every_record() {
        let mut stats = StatsAggregator::default();
        let records = vec![
            tcp4(10, 0, 80, 5000, 100),
            PacketRecord::non_ip(Timestamp::new(11, 0), 60, ETHERTYPE_ARP),
            PacketRecord::ip(Timestamp::new(12, 0), 200, v4(3), v4(4), 186),
        ];
        for r in &records {
            stats.ingest_packet(r);
        }
        assert_eq!(stats.aggregates.packet_count, 3);
        assert_eq!(stats.aggregates.byte_count, 114 + 60 + 200);
        assert_eq!(stats.aggregates.transport_count(ETHERTYPE_IPV4), 2);
        assert_eq!(stats.aggregates.transport_count(ETHERTYPE_ARP), 1);
        assert!(stats.aggregates.earliest <= stats.aggregates.latest);
    }

    #[test]
    fn non_ip_records_leave_stores_untouched() {
        let mut stats = StatsAggregator::default();
        stats.ingest_packet(&PacketRecord::non_ip(Timestamp::new(1, 0), 42, ETHERTYPE_ARP));
        stats.ingest_packet(&PacketRecord::non_ip(Timestamp::new(2, 0), 64, 0x88cc));

        assert_eq!(stats.aggregates.packet_count, 2);
        assert_eq!(stats.aggregates.byte_count, 106);
        assert!(stats.src_addresses.is_empty());
        assert!(stats.dst_addresses.is_empty());
        assert!(stats.src_ports.is_empty());
        assert!(stats.dst_ports.is_empty());
        assert_eq!(stats.packet_histogram.total(), 0);
    }

    #[test]
    fn ip_without_tcp_feeds_only_address_stores() {
        let mut stats = StatsAggregator::default();
        let src = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let dst = IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1));
        stats.ingest_packet(&PacketRecord::ip(Timestamp::new(5, 0), 120, src, dst, 106));

        assert_eq!(stats.src_addresses.get(&src), Some(106));
        assert_eq!(stats.dst_addresses.get(&dst), Some(106));
        assert_eq!(stats.aggregates.transport_count(ETHERTYPE_IPV6), 1);
        assert!(stats.src_ports.is_empty());
        assert!(stats.dst_ports.is_empty());
        assert_eq!(stats.packet_histogram.total(), 0);
    }

    #[test]
    fn tcp_feeds_port_and_time_stores() {
        let mut stats = StatsAggregator::default();
        stats.ingest_packet(&tcp4(10, 0, 443, 51000, 1500));
        stats.ingest_packet(&tcp4(10, 1, 443, 51000, 500));

        assert_eq!(stats.src_ports.get(&443), Some(2000));
        assert_eq!(stats.dst_ports.get(&51000), Some(2000));
        assert_eq!(stats.src_addresses.total(), 2000);
        assert_eq!(stats.packet_histogram.total(), 2);
        assert_eq!(stats.packet_fall.points().len(), 2);
    }

    #[test]
    fn port_aliases_apply_before_aggregation() {
        let mut stats = StatsAggregator::new(PortPalette::default().with_alias(8080, 80));
        stats.ingest_packet(&tcp4(1, 0, 8080, 40000, 10));
        stats.ingest_packet(&tcp4(1, 0, 80, 40000, 10));
        assert_eq!(stats.src_ports.get(&80), Some(20));
        assert_eq!(stats.src_ports.get(&8080), None);
    }

    #[test]
    fn latest_ignores_same_second_with_smaller_micros() {
        let mut stats = StatsAggregator::default();
        stats.ingest_packet(&tcp4(100, 500, 80, 1, 10));
        stats.ingest_packet(&tcp4(100, 200, 80, 1, 10));
        assert_eq!(stats.aggregates.latest, Some(Timestamp::new(100, 500)));
        assert_eq!(stats.aggregates.earliest, Some(Timestamp::new(100, 200)));
    }

    #[test]
    fn latest_advances_on_later_second_with_smaller_micros() {
        // a seconds-and-micros-both-greater comparison would miss both of these
        let mut stats = StatsAggregator::default();
        stats.ingest_packet(&tcp4(100, 500, 80, 1, 10));
        stats.ingest_packet(&tcp4(101, 100, 80, 1, 10));
        assert_eq!(stats.aggregates.latest, Some(Timestamp::new(101, 100)));
        stats.ingest_packet(&tcp4(101, 900, 80, 1, 10));
        assert_eq!(stats.aggregates.latest, Some(Timestamp::new(101, 900)));
        assert_eq!(stats.aggregates.earliest, Some(Timestamp::new(100, 500)));
    }

    #[test]
    fn transport_breakdown_sums_to_hundred() {
        let mut stats = StatsAggregator::default();
        stats.ingest_packet(&tcp4(1, 0, 80, 1, 10));
        stats.ingest_packet(&PacketRecord::non_ip(Timestamp::new(1, 0), 42, ETHERTYPE_ARP));
        stats.ingest_packet(&PacketRecord::non_ip(Timestamp::new(1, 0), 42, 0x88cc));
        stats.ingest_packet(&PacketRecord::non_ip(Timestamp::new(1, 0), 42, 0x88cc));

        let b = stats.aggregates.transport_breakdown();
        assert!((b.ipv4 - 25.0).abs() < 1e-9);
        assert!((b.arp - 25.0).abs() < 1e-9);
        assert!((b.ipv6).abs() < 1e-9);
        assert!((b.other - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_breakdown_is_all_zero() {
        let b = RunningAggregates::default().transport_breakdown();
        assert_eq!(b, TransportBreakdown::default());
    }
}
