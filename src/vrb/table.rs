//! Virtual reassembly buffer table.
//!
//! A forwarding node does not reassemble fragmented datagrams. Instead it
//! remembers, per incoming (source address, datagram tag) pair, where the
//! first fragment was sent and under which tag, and relabels every later
//! fragment of the same datagram the same way.
//!
//! The table is a small fixed array scanned linearly:
//! - A slot is free or holds exactly one [`VrbEntry`]
//! - At most one entry exists per [`ForwardingKey`]
//! - The outgoing half of an entry never changes once created
//! - Entries idle longer than the configured timeout are collected by [`VrbTable::gc`]

use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::address::{InterfaceId, LinkAddress};
use super::interval::{self, IntervalRef, MergeOutcome};
use super::tag::TagCounter;
use crate::stats::VrbStats;

/// Configuration for the virtual reassembly buffer.
///
/// Note: This is `Copy` for efficient passing to constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrbConfig {
    /// Number of slots in the table.
    pub capacity: usize,
    /// How long an entry may live before the collector frees it.
    pub entry_timeout: Duration,
    /// How often the collector sweeps the table.
    pub gc_interval: Duration,
}

impl Default for VrbConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            entry_timeout: Duration::from_secs(3),
            gc_interval: Duration::from_secs(1),
        }
    }
}

impl VrbConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), VrbError> {
        if self.capacity == 0 {
            return Err(VrbError::InvalidConfig("capacity must be greater than 0"));
        }
        if self.entry_timeout.is_zero() {
            return Err(VrbError::InvalidConfig(
                "entry_timeout must be greater than 0",
            ));
        }
        if self.gc_interval.is_zero() {
            return Err(VrbError::InvalidConfig(
                "gc_interval must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Error type for VRB operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VrbError {
    /// No free slot and no entry for the key; the fragment must be dropped.
    TableFull,
    /// Link-layer address with an unsupported length.
    InvalidAddress(usize),
    /// Invalid configuration parameter.
    InvalidConfig(&'static str),
}

impl std::fmt::Display for VrbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TableFull => write!(f, "virtual reassembly buffer full"),
            Self::InvalidAddress(len) => write!(f, "invalid link-layer address length {}", len),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for VrbError {}

/// Identifies one hop-local fragmentation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardingKey {
    /// Link-layer source of the incoming fragments.
    pub source: LinkAddress,
    /// Datagram tag carried in the incoming fragment headers.
    pub tag: u16,
}

impl ForwardingKey {
    pub fn new(source: LinkAddress, tag: u16) -> Self {
        Self { source, tag }
    }
}

impl std::fmt::Display for ForwardingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.source, self.tag)
    }
}

/// What the forwarding path knows about an incoming fragmented datagram.
#[derive(Debug, Clone)]
pub struct FragmentBase {
    /// Source address and tag of the incoming fragments.
    pub key: ForwardingKey,
    /// Destination of the incoming datagram, if the caller knows it.
    pub destination: Option<LinkAddress>,
    /// Total size of the original datagram.
    pub datagram_size: u16,
    /// When the first fragment of this datagram arrived.
    pub arrival: Instant,
    /// Byte ranges already forwarded. Owned by the fragmentation buffer.
    pub intervals: Option<IntervalRef>,
}

impl FragmentBase {
    /// Create a base for a datagram arriving now.
    pub fn new(source: LinkAddress, tag: u16, datagram_size: u16) -> Self {
        Self {
            key: ForwardingKey::new(source, tag),
            destination: None,
            datagram_size,
            arrival: Instant::now(),
            intervals: None,
        }
    }

    pub fn with_destination(mut self, destination: LinkAddress) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_intervals(mut self, intervals: Option<IntervalRef>) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn arrived_at(mut self, arrival: Instant) -> Self {
        self.arrival = arrival;
        self
    }
}

/// A live forwarding entry.
#[derive(Debug, Clone)]
pub struct VrbEntry {
    /// Incoming side, copied from the first [`FragmentBase`] seen.
    pub base: FragmentBase,
    /// Interface the fragments are forwarded on.
    pub out_interface: InterfaceId,
    /// Next hop link-layer address.
    pub out_destination: LinkAddress,
    /// Tag written into forwarded fragment headers.
    pub out_tag: u16,
    slot: usize,
}

impl VrbEntry {
    /// Index of the table slot holding this entry.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Whether this entry has been idle longer than `timeout` at `now`.
    pub fn is_expired_at(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.base.arrival) > timeout
    }

    /// Walk the forwarded byte ranges.
    pub fn intervals(&self) -> interval::IntervalIter {
        interval::iter(self.base.intervals.as_ref())
    }
}

/// Bounded table of forwarding entries.
///
/// # Example
///
/// ```
/// use sixlowpan_vrb::vrb::{FragmentBase, InterfaceId, LinkAddress, VrbConfig, VrbTable};
///
/// let mut table = VrbTable::new(VrbConfig::default()).unwrap();
///
/// let src = LinkAddress::short([0x00, 0x01]);
/// let next_hop = LinkAddress::short([0x00, 0x02]);
/// let base = FragmentBase::new(src, 7, 1280);
///
/// let out_tag = table.add(&base, InterfaceId(1), next_hop).unwrap().out_tag;
///
/// // Later fragments of the same datagram reuse the entry
/// assert_eq!(table.get(&src, 7).unwrap().out_tag, out_tag);
///
/// // Replies travelling backwards map onto the same entry
/// assert!(table.reverse(InterfaceId(1), &next_hop, out_tag).is_some());
/// ```
pub struct VrbTable {
    config: VrbConfig,
    slots: Vec<Option<VrbEntry>>,
    tags: Arc<TagCounter>,
    stats: Arc<VrbStats>,
}

impl VrbTable {
    /// Create a table drawing outgoing tags from the process-wide counter.
    pub fn new(config: VrbConfig) -> Result<Self, VrbError> {
        Self::with_tag_counter(config, TagCounter::global())
    }

    /// Create a table drawing outgoing tags from `tags`.
    pub fn with_tag_counter(config: VrbConfig, tags: Arc<TagCounter>) -> Result<Self, VrbError> {
        config.validate()?;
        Ok(Self {
            config,
            slots: vec![None; config.capacity],
            tags,
            stats: Arc::new(VrbStats::new()),
        })
    }

    /// Counters updated by table operations.
    pub fn stats(&self) -> &Arc<VrbStats> {
        &self.stats
    }

    /// Get the table configuration.
    pub fn config(&self) -> &VrbConfig {
        &self.config
    }

    /// Create the entry for `base`, or return the existing one.
    ///
    /// A new entry takes the first free slot and gets a fresh outgoing tag.
    /// The whole table is checked for the key first, so a slot freed ahead
    /// of an existing entry never produces a second entry for it.
    /// If an entry for `base.key` already exists its outgoing half is kept
    /// as is (`out_interface` and `out_destination` are ignored) and only the
    /// interval chain of `base` is merged into it.
    ///
    /// # Errors
    ///
    /// Returns [`VrbError::TableFull`] if there is neither a free slot nor
    /// an entry for the key.
    pub fn add(
        &mut self,
        base: &FragmentBase,
        out_interface: InterfaceId,
        out_destination: LinkAddress,
    ) -> Result<&VrbEntry, VrbError> {
        // an existing entry for the key wins over any earlier free slot
        let mut first_free = None;
        let mut existing = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            match slot {
                Some(entry) if entry.base.key == base.key => {
                    existing = Some(idx);
                    break;
                }
                Some(_) => {}
                None => {
                    first_free.get_or_insert(idx);
                }
            }
        }
        let Some(idx) = existing.or(first_free) else {
            self.stats.record_full();
            warn!("vrb: table full, cannot forward {}", base.key);
            return Err(VrbError::TableFull);
        };

        if let Some(entry) = self.slots[idx].as_mut() {
            if let Some(incoming) = base.intervals.as_ref() {
                let outcome = interval::merge(&mut entry.base.intervals, incoming);
                debug!("vrb: merged intervals into {}: {:?}", entry.base.key, outcome);
                if outcome != MergeOutcome::Unchanged {
                    self.stats.record_merged();
                }
            }
        } else {
            let entry = VrbEntry {
                base: base.clone(),
                out_interface,
                out_destination,
                out_tag: self.tags.next_tag(),
                slot: idx,
            };
            debug!(
                "vrb: creating entry ({}, {} bytes) => ({} via {}, {})",
                entry.base.key,
                entry.base.datagram_size,
                entry.out_destination,
                entry.out_interface,
                entry.out_tag
            );
            self.slots[idx] = Some(entry);
            self.stats.record_created();
            self.stats.set_entries(self.len());
        }

        self.slots[idx].as_ref().ok_or(VrbError::TableFull)
    }

    /// Look up the entry for an incoming (source, tag) pair.
    pub fn get(&self, source: &LinkAddress, tag: u16) -> Option<&VrbEntry> {
        self.get_key(&ForwardingKey::new(*source, tag))
    }

    /// Look up the entry for `key`.
    pub fn get_key(&self, key: &ForwardingKey) -> Option<&VrbEntry> {
        let found = self.iter().find(|entry| entry.base.key == *key);
        match found {
            Some(entry) => {
                debug!(
                    "vrb: got entry for {} => ({}, {})",
                    key, entry.out_destination, entry.out_tag
                );
                self.stats.record_lookup(true);
            }
            None => {
                debug!("vrb: no entry for {}", key);
                self.stats.record_lookup(false);
            }
        }
        found
    }

    /// Find the entry that relabelled a datagram to `tag` towards `address`
    /// on `interface`.
    ///
    /// Used to send fragments travelling the opposite way back along the
    /// original path.
    pub fn reverse(
        &self,
        interface: InterfaceId,
        address: &LinkAddress,
        tag: u16,
    ) -> Option<&VrbEntry> {
        let found = self.iter().find(|entry| {
            entry.out_tag == tag
                && entry.out_interface == interface
                && entry.out_destination == *address
        });
        match found {
            Some(entry) => {
                debug!(
                    "vrb: reverse ({}, {}, {}) => {}",
                    interface, address, tag, entry.base.key
                );
                self.stats.record_lookup(true);
            }
            None => {
                debug!("vrb: no reverse entry for ({}, {}, {})", interface, address, tag);
                self.stats.record_lookup(false);
            }
        }
        found
    }

    /// Remove the entry for `key`.
    pub fn remove(&mut self, key: &ForwardingKey) -> Option<VrbEntry> {
        let idx = self.iter().find(|entry| entry.base.key == *key)?.slot;
        self.remove_slot(idx)
    }

    /// Free slot `idx`, returning the entry it held.
    pub fn remove_slot(&mut self, idx: usize) -> Option<VrbEntry> {
        let removed = self.slots.get_mut(idx)?.take();
        if let Some(entry) = &removed {
            debug!("vrb: removed entry {}", entry.base.key);
            self.stats.record_removed();
            self.stats.set_entries(self.len());
        }
        removed
    }

    /// Free every entry that has been idle longer than the timeout.
    ///
    /// Returns the number of entries freed.
    pub fn gc(&mut self) -> usize {
        self.gc_at(Instant::now())
    }

    /// Like [`gc`](Self::gc), evaluated at `now`.
    pub fn gc_at(&mut self, now: Instant) -> usize {
        let timeout = self.config.entry_timeout;
        let mut evicted = 0;
        for slot in self.slots.iter_mut() {
            let expired = slot
                .as_ref()
                .is_some_and(|entry| entry.is_expired_at(now, timeout));
            if !expired {
                continue;
            }
            if let Some(entry) = slot.take() {
                debug!(
                    "vrb: entry ({}, {} bytes) timed out",
                    entry.base.key, entry.base.datagram_size
                );
                evicted += 1;
            }
        }
        if evicted > 0 {
            self.stats.record_evicted(evicted);
        }
        self.stats.set_entries(self.len());
        evicted
    }

    /// Free all slots.
    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.stats.set_entries(0);
    }

    /// Entry in slot `idx`, if the slot is in use.
    pub fn slot(&self, idx: usize) -> Option<&VrbEntry> {
        self.slots.get(idx)?.as_ref()
    }

    /// Whether slot `idx` is free.
    pub fn is_free(&self, idx: usize) -> bool {
        self.slot(idx).is_none()
    }

    /// Iterate over live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &VrbEntry> {
        self.slots.iter().flatten()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Check if the table has no live entries.
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vrb::Interval;
    use std::collections::HashSet;

    const IF1: InterfaceId = InterfaceId(1);
    const IF2: InterfaceId = InterfaceId(2);

    fn addr(id: u8) -> LinkAddress {
        LinkAddress::short([0x00, id])
    }

    fn table(capacity: usize) -> VrbTable {
        let config = VrbConfig {
            capacity,
            ..Default::default()
        };
        VrbTable::with_tag_counter(config, Arc::new(TagCounter::starting_at(0))).unwrap()
    }

    #[test]
    fn test_invalid_config_zero_capacity() {
        let config = VrbConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            VrbTable::new(config),
            Err(VrbError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalid_config_zero_timeout() {
        let config = VrbConfig {
            entry_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = VrbConfig::default();
        assert_eq!(config.capacity, 16);
        assert_eq!(config.entry_timeout, Duration::from_secs(3));
        assert_eq!(config.gc_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_new_table_is_free() {
        let table = table(4);
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 4);
        assert!((0..4).all(|i| table.is_free(i)));
    }

    #[test]
    fn test_add_creates_entry() {
        let mut table = table(4);
        let base = FragmentBase::new(addr(1), 42, 1280).with_destination(addr(9));
        let entry = table.add(&base, IF1, addr(2)).unwrap();

        assert_eq!(entry.base.key, ForwardingKey::new(addr(1), 42));
        assert_eq!(entry.base.destination, Some(addr(9)));
        assert_eq!(entry.base.datagram_size, 1280);
        assert_eq!(entry.out_interface, IF1);
        assert_eq!(entry.out_destination, addr(2));
        assert_eq!(entry.out_tag, 1);
        assert_eq!(entry.slot(), 0);
        assert!(!table.is_free(0));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_outgoing_side_is_sticky() {
        let mut table = table(2);
        let base = FragmentBase::new(addr(1), 5, 200);
        let first = table.add(&base, IF1, addr(0xa)).unwrap().clone();
        let second = table.add(&base, IF2, addr(0xb)).unwrap();

        assert_eq!(second.slot(), first.slot());
        assert_eq!(second.out_destination, addr(0xa));
        assert_eq!(second.out_interface, IF1);
        assert_eq!(second.out_tag, first.out_tag);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_full_table_rejects_new_key() {
        let mut table = table(1);
        table
            .add(&FragmentBase::new(addr(1), 1, 100), IF1, addr(2))
            .unwrap();
        let result = table.add(&FragmentBase::new(addr(3), 1, 100), IF1, addr(2));
        assert_eq!(result.unwrap_err(), VrbError::TableFull);
        assert_eq!(table.stats().snapshot().full, 1);
    }

    #[test]
    fn test_full_table_still_accepts_known_key() {
        let mut table = table(1);
        let base = FragmentBase::new(addr(1), 1, 100);
        table.add(&base, IF1, addr(2)).unwrap();
        assert!(table.add(&base, IF1, addr(2)).is_ok());
    }

    #[test]
    fn test_keys_differ_by_tag_and_source() {
        let mut table = table(4);
        table
            .add(&FragmentBase::new(addr(1), 1, 100), IF1, addr(9))
            .unwrap();
        table
            .add(&FragmentBase::new(addr(1), 2, 100), IF1, addr(9))
            .unwrap();
        table
            .add(
                &FragmentBase::new(LinkAddress::new(&[0, 1, 0, 0]).unwrap(), 1, 100),
                IF1,
                addr(9),
            )
            .unwrap();
        assert_eq!(table.len(), 3);
        let tags: Vec<u16> = table.iter().map(|e| e.out_tag).collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn test_key_uniqueness_over_many_adds() {
        let mut table = table(8);
        for round in 0..3 {
            for id in 0..6u8 {
                let base = FragmentBase::new(addr(id), u16::from(id) * 3, 100);
                table.add(&base, IF1, addr(100 + round)).unwrap();
            }
        }
        assert_eq!(table.len(), 6);
        let keys: HashSet<ForwardingKey> = table.iter().map(|e| e.base.key).collect();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn test_existing_entry_wins_over_earlier_free_slot() {
        let mut table = table(2);
        let t0 = Instant::now();
        let a = FragmentBase::new(addr(1), 1, 100).arrived_at(t0);
        let b = FragmentBase::new(addr(2), 1, 100).arrived_at(t0 + Duration::from_secs(2));
        table.add(&a, IF1, addr(9)).unwrap();
        let first = table.add(&b, IF1, addr(9)).unwrap().clone();
        assert_eq!(first.slot(), 1);

        assert_eq!(table.gc_at(t0 + Duration::from_secs(4)), 1);
        assert!(table.is_free(0));

        let again = table.add(&b, IF2, addr(8)).unwrap();
        assert_eq!(again.slot(), 1);
        assert_eq!(again.out_tag, first.out_tag);
        assert_eq!(again.out_interface, IF1);
        assert_eq!(again.out_destination, addr(9));

        assert_eq!(table.iter().filter(|e| e.base.key == b.key).count(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.is_free(0));
    }

    #[test]
    fn test_existing_entry_wins_after_remove() {
        let mut table = table(3);
        let a = FragmentBase::new(addr(1), 1, 100);
        let b = FragmentBase::new(addr(2), 7, 100);
        table.add(&a, IF1, addr(9)).unwrap();
        let tag = table.add(&b, IF1, addr(9)).unwrap().out_tag;
        table.remove(&a.key).unwrap();

        let entry = table.add(&b, InterfaceId(3), addr(5)).unwrap();
        assert_eq!((entry.slot(), entry.out_tag), (1, tag));
        assert_eq!(table.iter().filter(|e| e.base.key == b.key).count(), 1);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let mut table = table(2);
        let a = FragmentBase::new(addr(1), 1, 100);
        let b = FragmentBase::new(addr(2), 1, 100);
        table.add(&a, IF1, addr(9)).unwrap();
        table.add(&b, IF1, addr(9)).unwrap();

        let removed = table.remove(&a.key).unwrap();
        assert_eq!(removed.slot(), 0);
        assert!(table.is_free(0));

        let c = FragmentBase::new(addr(3), 1, 100);
        assert_eq!(table.add(&c, IF1, addr(9)).unwrap().slot(), 0);
    }

    #[test]
    fn test_get_before_and_after_add() {
        let mut table = table(4);
        assert!(table.get(&addr(1), 9).is_none());
        table
            .add(&FragmentBase::new(addr(1), 9, 100), IF1, addr(2))
            .unwrap();
        let entry = table.get(&addr(1), 9).unwrap();
        assert_eq!(entry.out_destination, addr(2));
        assert!(table.get(&addr(1), 10).is_none());

        let snap = table.stats().snapshot();
        assert_eq!(snap.lookup_hits, 1);
        assert_eq!(snap.lookup_misses, 2);
    }

    #[test]
    fn test_reverse_finds_entry() {
        let mut table = table(4);
        for id in 1..4u8 {
            table
                .add(&FragmentBase::new(addr(id), 77, 100), IF1, addr(0x20 + id))
                .unwrap();
        }
        let created = table
            .add(&FragmentBase::new(addr(5), 77, 100), IF2, addr(0x30))
            .unwrap()
            .clone();

        let found = table.reverse(IF2, &addr(0x30), created.out_tag).unwrap();
        assert_eq!(found.base.key, created.base.key);

        assert!(table.reverse(IF1, &addr(0x30), created.out_tag).is_none());
        assert!(table
            .reverse(IF2, &addr(0x30), created.out_tag.wrapping_add(1))
            .is_none());
        assert!(table
            .reverse(IF2, &LinkAddress::new(&[0x00]).unwrap(), created.out_tag)
            .is_none());
    }

    #[test]
    fn test_gc_respects_timeout() {
        let mut table = table(2);
        let t0 = Instant::now();
        let base = FragmentBase::new(addr(1), 1, 100).arrived_at(t0);
        table.add(&base, IF1, addr(2)).unwrap();

        assert_eq!(table.gc_at(t0 + Duration::from_millis(2999)), 0);
        assert!(table.get(&addr(1), 1).is_some());

        assert_eq!(table.gc_at(t0 + Duration::from_millis(3000)), 0);
        assert!(table.get(&addr(1), 1).is_some());

        assert_eq!(table.gc_at(t0 + Duration::from_millis(3001)), 1);
        assert!(table.get(&addr(1), 1).is_none());
        assert!(table.is_free(0));
        assert_eq!(table.stats().snapshot().evicted, 1);
    }

    #[test]
    fn test_gc_only_frees_expired() {
        let mut table = table(3);
        let t0 = Instant::now();
        table
            .add(&FragmentBase::new(addr(1), 1, 100).arrived_at(t0), IF1, addr(9))
            .unwrap();
        table
            .add(
                &FragmentBase::new(addr(2), 1, 100).arrived_at(t0 + Duration::from_secs(2)),
                IF1,
                addr(9),
            )
            .unwrap();

        assert_eq!(table.gc_at(t0 + Duration::from_secs(4)), 1);
        assert!(table.get(&addr(1), 1).is_none());
        assert!(table.get(&addr(2), 1).is_some());
    }

    #[test]
    fn test_gc_does_not_touch_intervals() {
        let mut table = table(1);
        let t0 = Instant::now();
        let chain = Interval::chain(&[(0, 63)]).unwrap();
        let base = FragmentBase::new(addr(1), 1, 100)
            .arrived_at(t0)
            .with_intervals(Some(chain.clone()));
        table.add(&base, IF1, addr(9)).unwrap();
        assert_eq!(Arc::strong_count(&chain), 3);

        table.gc_at(t0 + Duration::from_secs(10));
        // the fragmentation buffer's handles remain valid
        assert_eq!(Arc::strong_count(&chain), 2);
        assert_eq!(chain.start, 0);
    }

    #[test]
    fn test_merge_appends_intervals() {
        let mut table = table(2);
        let first = Interval::chain(&[(0, 63)]);
        let second = Interval::chain(&[(64, 127)]);
        let base = FragmentBase::new(addr(1), 1, 200).with_intervals(first);
        table.add(&base, IF1, addr(9)).unwrap();

        let again = base.clone().with_intervals(second.clone());
        let entry = table.add(&again, IF2, addr(8)).unwrap();
        let ranges: Vec<(u16, u16)> = entry.intervals().map(|i| (i.start, i.end)).collect();
        assert_eq!(ranges, vec![(0, 63), (64, 127)]);

        // merging the same chain twice keeps the list finite
        let entry = table.add(&again, IF2, addr(8)).unwrap();
        assert_eq!(entry.intervals().count(), 2);
        assert_eq!(table.stats().snapshot().merged, 1);
    }

    #[test]
    fn test_merge_adopts_when_entry_has_none() {
        let mut table = table(2);
        let base = FragmentBase::new(addr(1), 1, 200);
        table.add(&base, IF1, addr(9)).unwrap();
        let chain = Interval::chain(&[(0, 63), (64, 127)]);
        let entry = table
            .add(&base.clone().with_intervals(chain), IF1, addr(9))
            .unwrap();
        assert_eq!(entry.intervals().count(), 2);
    }

    #[test]
    fn test_interval_chain_stays_acyclic() {
        let mut table = table(1);
        let nodes: Vec<IntervalRef> = (0..4u16)
            .map(|i| Interval::new(i * 10, i * 10 + 9))
            .collect();
        let base = FragmentBase::new(addr(1), 1, 200);
        for _ in 0..2 {
            for node in &nodes {
                table
                    .add(&base.clone().with_intervals(Some(node.clone())), IF1, addr(9))
                    .unwrap();
            }
        }
        let entry = table.get(&addr(1), 1).unwrap();
        assert_eq!(entry.intervals().take(100).count(), 4);
    }

    #[test]
    fn test_tags_wrap_around() {
        let config = VrbConfig {
            capacity: 3,
            ..Default::default()
        };
        let tags = Arc::new(TagCounter::starting_at(u16::MAX - 1));
        let mut table = VrbTable::with_tag_counter(config, tags).unwrap();
        let out: Vec<u16> = (1..=3u8)
            .map(|id| {
                table
                    .add(&FragmentBase::new(addr(id), 0, 10), IF1, addr(9))
                    .unwrap()
                    .out_tag
            })
            .collect();
        assert_eq!(out, vec![u16::MAX, 0, 1]);
    }

    #[test]
    fn test_reset_frees_everything() {
        let mut table = table(3);
        for id in 0..3 {
            table
                .add(&FragmentBase::new(addr(id), 1, 10), IF1, addr(9))
                .unwrap();
        }
        table.reset();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_remove_slot_out_of_range() {
        let mut table = table(1);
        assert!(table.remove_slot(5).is_none());
        assert!(table.slot(5).is_none());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", VrbError::TableFull),
            "virtual reassembly buffer full"
        );
        assert_eq!(
            format!("{}", VrbError::InvalidConfig("test message")),
            "invalid config: test message"
        );
    }
}
