pub mod domain {
    use std::net::IpAddr;

    use serde::Serialize;

    pub const ETHERTYPE_IPV4: u16 = 0x0800;
    pub const ETHERTYPE_ARP: u16 = 0x0806;
    pub const ETHERTYPE_IPV6: u16 = 0x86DD;

    /// Capture timestamp. Ordering is chronological: seconds first, then microseconds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
    pub struct Timestamp {
        pub secs: i64,
        pub micros: u32,
    }

    impl Timestamp {
        pub fn new(secs: i64, micros: u32) -> Self {
            Timestamp { secs, micros }
        }

        pub fn as_secs_f64(&self) -> f64 {
            self.secs as f64 + self.micros as f64 / 1_000_000.0
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TcpPorts {
        pub source: u16,
        pub destination: u16,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpInfo {
        pub source: IpAddr,
        pub destination: IpAddr,
        /// Length of the IP datagram, header included.
        pub datagram_len: u32,
        pub tcp: Option<TcpPorts>,
    }

    impl IpInfo {
        pub fn version(&self) -> u8 {
            match self.source {
                IpAddr::V4(_) => 4,
                IpAddr::V6(_) => 6,
            }
        }
    }

    /// One already-parsed frame as handed over by the capture layer.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PacketRecord {
        pub timestamp: Timestamp,
        pub caplen: u32,
        pub ether_type: u16,
        pub ip: Option<IpInfo>,
    }

    impl PacketRecord {
        pub fn non_ip(timestamp: Timestamp, caplen: u32, ether_type: u16) -> Self {
            PacketRecord {
                timestamp,
                caplen,
                ether_type,
                ip: None,
            }
        }

        pub fn ip(timestamp: Timestamp, caplen: u32, source: IpAddr, destination: IpAddr, datagram_len: u32) -> Self {
            let ether_type = match source {
                IpAddr::V4(_) => ETHERTYPE_IPV4,
                IpAddr::V6(_) => ETHERTYPE_IPV6,
            };
            PacketRecord {
                timestamp,
                caplen,
                ether_type,
                ip: Some(IpInfo {
                    source,
                    destination,
                    datagram_len,
                    tcp: None,
                }),
            }
        }

        pub fn with_tcp(mut self, source: u16, destination: u16) -> Self {
            if let Some(ip) = self.ip.as_mut() {
                ip.tcp = Some(TcpPorts {
                    source,
                    destination,
                });
            }
            self
        }
    }
}

pub mod dto {
    use serde::Serialize;

    use super::domain::Timestamp;

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct RankedEntryDTO {
        pub rank: usize,
        pub key: String,
        pub count: u64,
        pub percentage: u8,
    }

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct TransportBreakdownDTO {
        pub ipv4: f64,
        pub ipv6: f64,
        pub arp: f64,
        pub other: f64,
    }

    #[derive(Debug, Serialize, Clone, PartialEq)]
    pub struct ReportSummary {
        pub source: String,
        pub packet_count: u64,
        pub byte_count: u64,
        pub earliest: Option<Timestamp>,
        pub latest: Option<Timestamp>,
        pub transports: TransportBreakdownDTO,
        pub top_source_addresses: Vec<RankedEntryDTO>,
        pub top_destination_addresses: Vec<RankedEntryDTO>,
        pub top_source_ports: Vec<RankedEntryDTO>,
        pub top_destination_ports: Vec<RankedEntryDTO>,
    }
}
