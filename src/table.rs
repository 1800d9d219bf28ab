//! Fixed-capacity statistics table
//!
//! Open-addressing map from [`BlockId`] to [`BlockStats`]. The table is
//! allocated once when a session opens and never grows, so resolving a call
//! site on the hot path never allocates. Slot 0 is reserved for the root of
//! the call stack and is never handed out.

use crate::block_id::{BlockId, CallSite};
use crate::error::ProfilerError;

/// Default number of slots in a session's table
pub const DEFAULT_CAPACITY: usize = 4096;

/// Accumulated statistics for one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStats {
    /// Key that claimed this slot; `BlockId::ROOT` while unclaimed
    pub id: BlockId,
    pub label: &'static str,
    pub function: &'static str,
    pub file: &'static str,
    pub line: u32,
    /// Own cycles net of nested regions
    ///
    /// Kept with wrapping arithmetic: children debit their parent as they
    /// close, so an open parent can sit below zero until it closes itself.
    pub exclusive_cycles: u64,
    /// Cycles including nested regions
    pub inclusive_cycles: u64,
    pub hit_count: u64,
    /// Bytes reported by bandwidth regions
    pub processed_bytes: u64,
}

impl BlockStats {
    const EMPTY: BlockStats = BlockStats {
        id: BlockId::ROOT,
        label: "",
        function: "",
        file: "",
        line: 0,
        exclusive_cycles: 0,
        inclusive_cycles: 0,
        hit_count: 0,
        processed_bytes: 0,
    };

    pub fn is_claimed(&self) -> bool {
        !self.id.is_root()
    }
}

/// Result of resolving a key to a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    /// True when this call claimed the slot; descriptors still need filling in
    pub fresh: bool,
}

/// No free slot remained after a full probe cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull {
    pub capacity: usize,
}

/// Fixed-size open-addressing table of block statistics
#[derive(Debug)]
pub struct StatsTable {
    slots: Box<[BlockStats]>,
    claimed: usize,
}

impl StatsTable {
    /// Allocate a zeroed table with `capacity` slots
    pub fn with_capacity(capacity: usize) -> Result<Self, ProfilerError> {
        if capacity < 2 {
            return Err(ProfilerError::InvalidCapacity(capacity));
        }
        Ok(StatsTable {
            slots: vec![BlockStats::EMPTY; capacity].into_boxed_slice(),
            claimed: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots claimed so far
    pub fn claimed(&self) -> usize {
        self.claimed
    }

    fn first_probe(&self, id: BlockId) -> usize {
        let index = id.get() as usize % self.slots.len();
        if index == 0 {
            1
        } else {
            index
        }
    }

    fn next_probe(&self, index: usize) -> usize {
        let next = (index + 1) % self.slots.len();
        if next == 0 {
            1
        } else {
            next
        }
    }

    /// Find the slot for `id`, claiming a free one if the key is new
    ///
    /// Linear probing from `id % capacity`, wrapping past the reserved slot 0.
    /// Gives up with [`TableFull`] after `capacity` probes.
    pub fn resolve(&mut self, id: BlockId) -> Result<Slot, TableFull> {
        debug_assert!(!id.is_root(), "root key cannot be resolved");

        let mut index = self.first_probe(id);
        for _ in 0..self.slots.len() {
            let slot = &mut self.slots[index];
            if !slot.is_claimed() {
                slot.id = id;
                self.claimed += 1;
                return Ok(Slot { index, fresh: true });
            }
            if slot.id == id {
                return Ok(Slot {
                    index,
                    fresh: false,
                });
            }
            index = self.next_probe(index);
        }

        Err(TableFull {
            capacity: self.slots.len(),
        })
    }

    /// Fill the descriptive fields of a freshly claimed slot
    pub fn describe(&mut self, index: usize, site: &CallSite) {
        let slot = &mut self.slots[index];
        debug_assert_eq!(slot.id, site.id);
        slot.label = site.label;
        slot.function = site.function;
        slot.file = site.file;
        slot.line = site.line;
    }

    /// Resolve a call site and fill its descriptors on first sight
    pub fn resolve_site(&mut self, site: &CallSite) -> Result<usize, TableFull> {
        let slot = self.resolve(site.id)?;
        if slot.fresh {
            self.describe(slot.index, site);
        }
        Ok(slot.index)
    }

    /// Position of `stats` within this table, if it belongs to it
    pub fn index_of(&self, stats: &BlockStats) -> Option<usize> {
        let range = self.slots.as_ptr_range();
        let ptr = stats as *const BlockStats;
        if !range.contains(&ptr) {
            return None;
        }
        let offset = ptr as usize - range.start as usize;
        Some(offset / std::mem::size_of::<BlockStats>())
    }

    pub fn get(&self, index: usize) -> Option<&BlockStats> {
        self.slots.get(index)
    }

    /// Look up the slot holding `id` without claiming anything
    pub fn find(&self, id: BlockId) -> Option<&BlockStats> {
        if id.is_root() {
            return None;
        }
        let mut index = self.first_probe(id);
        for _ in 0..self.slots.len() {
            let slot = &self.slots[index];
            if !slot.is_claimed() {
                return None;
            }
            if slot.id == id {
                return Some(slot);
            }
            index = self.next_probe(index);
        }
        None
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> &mut BlockStats {
        &mut self.slots[index]
    }

    /// Slots that completed at least one region, in table order
    pub fn iter_recorded(&self) -> impl Iterator<Item = &BlockStats> {
        self.slots.iter().filter(|s| s.is_claimed() && s.hit_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(id: u32, label: &'static str) -> CallSite {
        CallSite::with_id(BlockId::from_raw(id), label, "f", "src/t.rs", id)
    }

    #[test]
    fn test_capacity_too_small() {
        assert!(matches!(
            StatsTable::with_capacity(1),
            Err(ProfilerError::InvalidCapacity(1))
        ));
        assert!(StatsTable::with_capacity(2).is_ok());
    }

    #[test]
    fn test_resolve_claims_then_reuses() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        let id = BlockId::from_raw(5);

        let first = table.resolve(id).unwrap();
        assert_eq!(first, Slot { index: 5, fresh: true });

        let again = table.resolve(id).unwrap();
        assert_eq!(again, Slot { index: 5, fresh: false });
        assert_eq!(table.claimed(), 1);
    }

    #[test]
    fn test_resolve_skips_reserved_slot() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        // 32 % 16 == 0, redirected to slot 1
        let slot = table.resolve(BlockId::from_raw(32)).unwrap();
        assert_eq!(slot.index, 1);
    }

    #[test]
    fn test_collision_probes_linearly() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        let a = BlockId::from_raw(3);
        let b = BlockId::from_raw(19); // 19 % 16 == 3

        assert_eq!(table.resolve(a).unwrap().index, 3);
        assert_eq!(table.resolve(b).unwrap().index, 4);
        assert_eq!(table.get(3).unwrap().id, a);
        assert_eq!(table.get(4).unwrap().id, b);

        // Both stay where they landed
        assert_eq!(table.resolve(a).unwrap().index, 3);
        assert_eq!(table.resolve(b).unwrap().index, 4);
    }

    #[test]
    fn test_probe_wraps_past_slot_zero() {
        let mut table = StatsTable::with_capacity(4).unwrap();
        assert_eq!(table.resolve(BlockId::from_raw(3)).unwrap().index, 3);
        // 7 % 4 == 3 is taken, next is 0 (reserved) so it lands on 1
        assert_eq!(table.resolve(BlockId::from_raw(7)).unwrap().index, 1);
    }

    #[test]
    fn test_table_full() {
        let mut table = StatsTable::with_capacity(4).unwrap();
        for raw in [1, 2, 3] {
            table.resolve(BlockId::from_raw(raw)).unwrap();
        }
        assert_eq!(
            table.resolve(BlockId::from_raw(9)),
            Err(TableFull { capacity: 4 })
        );
        // Existing keys still resolve
        assert_eq!(table.resolve(BlockId::from_raw(2)).unwrap().index, 2);
        assert_eq!(table.claimed(), 3);
    }

    #[test]
    fn test_slot_zero_never_claimed() {
        let mut table = StatsTable::with_capacity(8).unwrap();
        for raw in 1..=7 {
            table.resolve(BlockId::from_raw(raw * 8)).unwrap();
        }
        assert!(!table.get(0).unwrap().is_claimed());
    }

    #[test]
    fn test_resolve_site_fills_descriptors_once() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        let first = site(6, "first");
        let index = table.resolve_site(&first).unwrap();
        assert_eq!(table.get(index).unwrap().label, "first");

        let imposter = CallSite::with_id(first.id, "second", "g", "src/x.rs", 99);
        table.resolve_site(&imposter).unwrap();
        assert_eq!(table.get(index).unwrap().label, "first");
        assert_eq!(table.get(index).unwrap().line, 6);
    }

    #[test]
    fn test_index_of() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        let index = table.resolve_site(&site(11, "x")).unwrap();
        let stats = table.get(index).unwrap();
        assert_eq!(table.index_of(stats), Some(11));

        let foreign = BlockStats::EMPTY;
        assert_eq!(table.index_of(&foreign), None);
    }

    #[test]
    fn test_find_does_not_claim() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        assert!(table.find(BlockId::from_raw(4)).is_none());
        assert_eq!(table.claimed(), 0);

        table.resolve(BlockId::from_raw(4)).unwrap();
        table.resolve(BlockId::from_raw(20)).unwrap();
        assert_eq!(table.find(BlockId::from_raw(20)).unwrap().id.get(), 20);
        assert!(table.find(BlockId::ROOT).is_none());
    }

    #[test]
    fn test_iter_recorded_skips_unfinished() {
        let mut table = StatsTable::with_capacity(16).unwrap();
        let a = table.resolve_site(&site(2, "a")).unwrap();
        table.resolve_site(&site(3, "b")).unwrap();
        table.slot_mut(a).hit_count = 1;

        let labels: Vec<_> = table.iter_recorded().map(|s| s.label).collect();
        assert_eq!(labels, vec!["a"]);
    }
}
