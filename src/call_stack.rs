//! Call-stack tracking and inclusive/exclusive cycle attribution
//!
//! The active chain of regions is never materialized as a stack: each
//! [`OpenBlock`] remembers the slot that was on top when it began, and the
//! tracker only keeps the current top. Exclusive time falls out of debiting
//! the parent whenever a child closes:
//!
//! ```text
//! R begins                  top = R
//!   A begins, runs 10       top = A
//!   A ends                  A.excl += 10, R.excl -= 10
//!   B begins, runs 20
//!   B ends                  B.excl += 20, R.excl -= 20
//! R ends after 31           R.excl += 31  ->  R.excl == 1, R.incl == 31
//! ```
//!
//! A recursive call into the same slot debits and credits the same counter,
//! so exclusive time nets out, and inclusive time is rebuilt from the value
//! saved at entry instead of being summed per level.

use crate::table::StatsTable;

/// Slot index meaning "no enclosing region"
pub const ROOT_INDEX: usize = 0;

/// One region instance between its begin and end events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenBlock {
    pub(crate) index: usize,
    pub(crate) parent: usize,
    pub(crate) entry_inclusive: u64,
    pub(crate) start: u64,
    pub(crate) bytes: u64,
    pub(crate) generation: u64,
}

/// Innermost active region and nesting depth
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallStack {
    current: usize,
    depth: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot index of the innermost open region, or [`ROOT_INDEX`]
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of regions currently open
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Make `index` the innermost region, started at `now`
    pub fn push(
        &mut self,
        table: &StatsTable,
        index: usize,
        now: u64,
        bytes: u64,
        generation: u64,
    ) -> OpenBlock {
        let entry_inclusive = table.get(index).map_or(0, |s| s.inclusive_cycles);
        let open = OpenBlock {
            index,
            parent: self.current,
            entry_inclusive,
            start: now,
            bytes,
            generation,
        };
        self.current = index;
        self.depth += 1;
        open
    }

    /// Close `open` at `now` and attribute its elapsed cycles
    ///
    /// Regions are expected to close in strict LIFO order. An out-of-order
    /// close is logged and still accounted against the parent it recorded,
    /// since this runs inside guard drops and must not panic.
    pub fn pop(&mut self, table: &mut StatsTable, open: OpenBlock, now: u64) {
        if self.current != open.index {
            tracing::warn!(
                top = self.current,
                closing = open.index,
                "profile regions closed out of order"
            );
        }

        let elapsed = now.saturating_sub(open.start);
        self.current = open.parent;
        self.depth = self.depth.saturating_sub(1);

        if open.parent != ROOT_INDEX {
            let parent = table.slot_mut(open.parent);
            parent.exclusive_cycles = parent.exclusive_cycles.wrapping_sub(elapsed);
        }

        let slot = table.slot_mut(open.index);
        slot.exclusive_cycles = slot.exclusive_cycles.wrapping_add(elapsed);
        slot.inclusive_cycles = open.entry_inclusive + elapsed;
        slot.hit_count += 1;
        slot.processed_bytes += open.bytes;
    }
}
