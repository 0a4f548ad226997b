//! Ranked aggregate stores fed during ingestion and read by the renderer.
//!
//! Every store answers the same ranked-lookup contract ([`RankedStore`]) so
//! the layout code never depends on how a store keeps its entries.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::net::IpAddr;

use crate::models::domain::Timestamp;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry<K> {
    pub key: K,
    pub count: u64,
}

/// Keyed weight accumulator with ranked retrieval.
///
/// Rank 0 is the heaviest entry. Entries of equal weight keep the order in
/// which their keys were first seen.
pub trait RankedStore {
    type Key;

    fn add(&mut self, key: Self::Key, weight: u64);

    /// Number of distinct keys holding a nonzero weight.
    fn size(&self) -> usize;

    fn at(&self, rank: usize) -> Option<&RankedEntry<Self::Key>>;

    /// Sum of every weight ever added, not only the displayed ranks.
    fn total(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn top(&self, n: usize) -> Vec<&RankedEntry<Self::Key>> {
        (0..n.min(self.size())).filter_map(|rank| self.at(rank)).collect()
    }
}

#[derive(Debug, Clone)]
struct Slot<K> {
    entry: RankedEntry<K>,
    first_seen: u64,
}

impl<K> Slot<K> {
    fn outranks(&self, other: &Slot<K>) -> bool {
        self.entry.count > other.entry.count
            || (self.entry.count == other.entry.count && self.first_seen < other.first_seen)
    }
}

/// Vector kept sorted by (weight desc, first seen asc), with a key index.
///
/// Weights only grow, so an update only ever moves an entry toward rank 0.
#[derive(Debug, Clone)]
pub struct Histogram<K> {
    slots: Vec<Slot<K>>,
    index: HashMap<K, usize>,
    total: u64,
    next_seen: u64,
}

pub type AddressHistogram = Histogram<IpAddr>;
pub type PortHistogram = Histogram<u16>;
pub type NetMap = Histogram<(IpAddr, IpAddr)>;

impl<K: Eq + Hash + Clone> Histogram<K> {
    pub fn new() -> Self {
        Histogram {
            slots: Vec::new(),
            index: HashMap::new(),
            total: 0,
            next_seen: 0,
        }
    }

    pub fn get(&self, key: &K) -> Option<u64> {
        self.index.get(key).map(|&i| self.slots[i].entry.count)
    }

    fn promote(&mut self, mut idx: usize) {
        while idx > 0 && self.slots[idx].outranks(&self.slots[idx - 1]) {
            self.slots.swap(idx, idx - 1);
            if let Some(i) = self.index.get_mut(&self.slots[idx].entry.key) {
                *i = idx;
            }
            if let Some(i) = self.index.get_mut(&self.slots[idx - 1].entry.key) {
                *i = idx - 1;
            }
            idx -= 1;
        }
    }
}

impl<K: Eq + Hash + Clone> Default for Histogram<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> RankedStore for Histogram<K> {
    type Key = K;

    fn add(&mut self, key: K, weight: u64) {
        self.total = self.total.saturating_add(weight);
        match self.index.get(&key) {
            Some(&idx) => {
                let slot = &mut self.slots[idx];
                slot.entry.count = slot.entry.count.saturating_add(weight);
                self.promote(idx);
            }
            None if weight == 0 => {}
            None => {
                let idx = self.slots.len();
                self.slots.push(Slot {
                    entry: RankedEntry {
                        key: key.clone(),
                        count: weight,
                    },
                    first_seen: self.next_seen,
                });
                self.next_seen += 1;
                self.index.insert(key, idx);
                self.promote(idx);
            }
        }
    }

    fn size(&self) -> usize {
        self.slots.len()
    }

    fn at(&self, rank: usize) -> Option<&RankedEntry<K>> {
        self.slots.get(rank).map(|slot| &slot.entry)
    }

    fn total(&self) -> u64 {
        self.total
    }
}

/// Per-second TCP packet counts, split by source port.
#[derive(Debug, Clone, Default)]
pub struct TimeHistogram {
    seconds: BTreeMap<i64, BTreeMap<u16, u64>>,
    ranked: Histogram<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBin {
    pub start: i64,
    pub width: u64,
    pub total: u64,
    pub ports: BTreeMap<u16, u64>,
}

impl TimeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ts: Timestamp, port: u16) {
        *self.seconds.entry(ts.secs).or_default().entry(port).or_insert(0) += 1;
        self.ranked.add(ts.secs, 1);
    }

    /// First and last populated second.
    pub fn span(&self) -> Option<(i64, i64)> {
        let first = *self.seconds.keys().next()?;
        let last = *self.seconds.keys().next_back()?;
        Some((first, last))
    }

    /// Regroups the per-second counts into at most `max_bins` equal-width bins.
    pub fn bins(&self, max_bins: usize) -> Vec<TimeBin> {
        let Some((first, last)) = self.span() else {
            return Vec::new();
        };
        let span = (last - first + 1) as u64;
        let width = span.div_ceil(max_bins.max(1) as u64).max(1);
        let count = span.div_ceil(width) as usize;

        let mut bins: Vec<TimeBin> = (0..count)
            .map(|i| TimeBin {
                start: first + (i as u64 * width) as i64,
                width,
                total: 0,
                ports: BTreeMap::new(),
            })
            .collect();

        for (sec, ports) in &self.seconds {
            let i = ((sec - first) as u64 / width) as usize;
            if let Some(bin) = bins.get_mut(i) {
                for (port, count) in ports {
                    *bin.ports.entry(*port).or_insert(0) += count;
                    bin.total += count;
                }
            }
        }
        bins
    }
}

impl RankedStore for TimeHistogram {
    type Key = i64;

    /// Weight added without a port is filed under port 0, which the
    /// palette draws in the default color.
    fn add(&mut self, key: i64, weight: u64) {
        if weight > 0 {
            *self.seconds.entry(key).or_default().entry(0).or_insert(0) += weight;
        }
        self.ranked.add(key, weight);
    }

    fn size(&self) -> usize {
        self.ranked.size()
    }

    fn at(&self, rank: usize) -> Option<&RankedEntry<i64>> {
        self.ranked.at(rank)
    }

    fn total(&self) -> u64 {
        self.ranked.total()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallPoint {
    pub timestamp: Timestamp,
    pub source_port: u16,
    pub destination_port: u16,
}

/// Bounded sample of TCP packets for the packet-fall diagnostic chart.
#[derive(Debug, Clone)]
pub struct PacketFall {
    points: Vec<FallPoint>,
    capacity: usize,
    dropped: u64,
}

pub const PACKET_FALL_CAPACITY: usize = 10_000;

impl PacketFall {
    pub fn with_capacity(capacity: usize) -> Self {
        PacketFall {
            points: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, point: FallPoint) {
        if self.points.len() < self.capacity {
            self.points.push(point);
        } else {
            self.dropped += 1;
        }
    }

    pub fn points(&self) -> &[FallPoint] {
        &self.points
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for PacketFall {
    fn default() -> Self {
        Self::with_capacity(PACKET_FALL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_descending_weight() {
        let mut h = PortHistogram::new();
        h.add(22, 30);
        h.add(8080, 10);
        h.add(80, 50);

        assert_eq!(h.size(), 3);
        assert_eq!(h.total(), 90);
        assert_eq!(h.at(0).map(|e| e.key), Some(80));
        assert_eq!(h.at(1).map(|e| e.key), Some(22));
        assert_eq!(h.at(2).map(|e| e.key), Some(8080));
        assert!(h.at(3).is_none());
    }

    #[test]
    fn equal_weights_keep_first_seen_order() {
        let mut h = PortHistogram::new();
        h.add(443, 5);
        h.add(80, 5);
        h.add(22, 5);
        let keys: Vec<u16> = h.top(3).iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![443, 80, 22]);

        // 22 catches up with a heavier, later-seen key but cannot pass an earlier one
        let mut h = PortHistogram::new();
        h.add(22, 1);
        h.add(80, 5);
        h.add(22, 4);
        assert_eq!(h.at(0).map(|e| e.key), Some(22));
        assert_eq!(h.at(1).map(|e| e.key), Some(80));
    }

    #[test]
    fn updates_promote_entries() {
        let mut h = PortHistogram::new();
        h.add(1, 10);
        h.add(2, 9);
        h.add(3, 8);
        h.add(3, 5);
        assert_eq!(h.at(0).map(|e| (e.key, e.count)), Some((3, 13)));
        assert_eq!(h.get(&1), Some(10));
        assert_eq!(h.get(&3), Some(13));
        h.add(2, 20);
        assert_eq!(h.at(0).map(|e| e.key), Some(2));
        assert_eq!(h.at(1).map(|e| e.key), Some(3));
        assert_eq!(h.at(2).map(|e| e.key), Some(1));
    }

    #[test]
    fn zero_weight_keys_are_not_counted() {
        let mut h = PortHistogram::new();
        h.add(53, 0);
        assert!(h.is_empty());
        assert_eq!(h.total(), 0);
        assert!(h.at(0).is_none());
    }

    #[test]
    fn time_histogram_bins_cover_span() {
        let mut th = TimeHistogram::new();
        th.insert(Timestamp::new(100, 0), 80);
        th.insert(Timestamp::new(100, 5), 443);
        th.insert(Timestamp::new(104, 0), 80);
        th.insert(Timestamp::new(109, 0), 22);

        assert_eq!(th.span(), Some((100, 109)));
        assert_eq!(th.total(), 4);
        assert_eq!(th.at(0).map(|e| (e.key, e.count)), Some((100, 2)));

        let bins = th.bins(5);
        assert_eq!(bins.len(), 5);
        assert!(bins.iter().all(|b| b.width == 2));
        assert_eq!(bins[0].total, 2);
        assert_eq!(bins[0].ports.get(&443), Some(&1));
        assert_eq!(bins[2].total, 1);
        assert_eq!(bins[4].total, 1);
        assert_eq!(bins.iter().map(|b| b.total).sum::<u64>(), 4);
    }

    #[test]
    fn portless_weight_lands_on_port_zero() {
        let mut th = TimeHistogram::new();
        th.add(100, 3);
        th.insert(Timestamp::new(100, 0), 80);
        th.add(101, 0);

        assert_eq!(th.total(), 4);
        assert_eq!(th.span(), Some((100, 100)));
        let bins = th.bins(60);
        assert_eq!(bins[0].ports.get(&0), Some(&3));
        assert_eq!(bins[0].ports.get(&80), Some(&1));
        assert_eq!(
            crate::palette::PortPalette::default().color(0),
            crate::palette::DEFAULT_COLOR
        );
    }

    #[test]
    fn empty_time_histogram_has_no_bins() {
        assert!(TimeHistogram::new().bins(60).is_empty());
    }

    #[test]
    fn packet_fall_is_bounded() {
        let mut fall = PacketFall::with_capacity(2);
        for i in 0..5 {
            fall.push(FallPoint {
                timestamp: Timestamp::new(i, 0),
                source_port: 80,
                destination_port: 5000,
            });
        }
        assert_eq!(fall.points().len(), 2);
        assert_eq!(fall.dropped(), 3);
    }
}
