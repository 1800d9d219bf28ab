//! Per-session profiling engine
//!
//! A [`Profiler`] owns the statistics table and call-stack tracker for one
//! measurement session. It can be driven directly through an explicit handle
//! (`begin`/`end`), or installed as the thread's active session by
//! [`crate::session::Session`] so that the `profile_*` macros reach it.
//!
//! The `*_at` variants take timestamps from the caller instead of reading the
//! cycle counter, which makes the accounting deterministic under test.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::block_id::CallSite;
use crate::call_stack::{CallStack, OpenBlock};
use crate::error::Result;
use crate::table::StatsTable;
use crate::timer::read_cpu_timer;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Statistics table, call stack and timestamps of one session
#[derive(Debug)]
pub struct Profiler {
    table: StatsTable,
    stack: CallStack,
    start: u64,
    end: Option<u64>,
    generation: u64,
    full_reported: bool,
    dropped_regions: u64,
}

impl Profiler {
    /// Create a profiler whose session starts now
    pub fn new(capacity: usize) -> Result<Self> {
        let mut profiler = Self::with_start(capacity, 0)?;
        profiler.start = read_cpu_timer();
        Ok(profiler)
    }

    /// Create a profiler whose session started at `start`
    pub fn with_start(capacity: usize, start: u64) -> Result<Self> {
        Ok(Profiler {
            table: StatsTable::with_capacity(capacity)?,
            stack: CallStack::new(),
            start,
            end: None,
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            full_reported: false,
            dropped_regions: 0,
        })
    }

    fn resolve(&mut self, site: &CallSite) -> Option<usize> {
        match self.table.resolve_site(site) {
            Ok(index) => Some(index),
            Err(full) => {
                self.dropped_regions += 1;
                if !self.full_reported {
                    self.full_reported = true;
                    eprintln!(
                        "cycleprof: statistics table is full ({} slots); '{}' at {}:{} and later new blocks are not measured",
                        full.capacity, site.label, site.file, site.line
                    );
                    eprintln!("cycleprof: raise SessionConfig::capacity to measure more call sites");
                    tracing::warn!(
                        capacity = full.capacity,
                        label = site.label,
                        "profiler table full"
                    );
                }
                None
            }
        }
    }

    /// Begin a region, reading the cycle counter as the last step
    ///
    /// Returns `None` if the table has no room for a new call site; the region
    /// then goes unmeasured.
    #[inline]
    pub fn begin(&mut self, site: &CallSite, bytes: u64) -> Option<OpenBlock> {
        let index = self.resolve(site)?;
        let generation = self.generation;
        Some(
            self.stack
                .push(&self.table, index, read_cpu_timer(), bytes, generation),
        )
    }

    /// Begin a region at an explicit timestamp
    pub fn begin_at(&mut self, site: &CallSite, bytes: u64, now: u64) -> Option<OpenBlock> {
        let index = self.resolve(site)?;
        Some(
            self.stack
                .push(&self.table, index, now, bytes, self.generation),
        )
    }

    /// End a region, reading the cycle counter first
    #[inline]
    pub fn end(&mut self, open: OpenBlock) {
        let now = read_cpu_timer();
        self.end_at(open, now);
    }

    /// End a region at an explicit timestamp
    ///
    /// Blocks begun by a different profiler are ignored.
    pub fn end_at(&mut self, open: OpenBlock, now: u64) {
        if open.generation != self.generation {
            tracing::debug!(
                expected = self.generation,
                got = open.generation,
                "ignoring region from another session"
            );
            return;
        }
        self.stack.pop(&mut self.table, open, now);
    }

    /// Record the session end timestamp
    pub fn finish(&mut self) -> u64 {
        self.finish_at(read_cpu_timer())
    }

    pub fn finish_at(&mut self, now: u64) -> u64 {
        self.end = Some(now);
        self.total_cycles()
    }

    /// Cycles from session start to its end, or to now while still open
    pub fn total_cycles(&self) -> u64 {
        let end = self.end.unwrap_or_else(read_cpu_timer);
        end.saturating_sub(self.start)
    }

    pub fn table(&self) -> &StatsTable {
        &self.table
    }

    /// Regions begun but not yet ended
    pub fn open_regions(&self) -> usize {
        self.stack.depth()
    }

    /// Regions skipped because the table was full
    pub fn dropped_regions(&self) -> u64 {
        self.dropped_regions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_id::BlockId;
    use crate::error::ProfilerError;

    fn site(raw: u32, label: &'static str) -> CallSite {
        CallSite::with_id(BlockId::from_raw(raw), label, "test_fn", "src/test.rs", raw)
    }

    #[test]
    fn test_profiler_new_rejects_tiny_table() {
        assert!(matches!(
            Profiler::new(0),
            Err(ProfilerError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn test_generations_are_unique() {
        let a = Profiler::new(8).unwrap();
        let b = Profiler::new(8).unwrap();
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn test_begin_end_at() {
        let mut profiler = Profiler::with_start(16, 0).unwrap();
        let s = site(3, "work");

        let open = profiler.begin_at(&s, 0, 10).unwrap();
        assert_eq!(profiler.open_regions(), 1);
        profiler.end_at(open, 25);
        assert_eq!(profiler.open_regions(), 0);
        assert_eq!(profiler.finish_at(40), 40);

        let stats = profiler.table().find(s.id).unwrap();
        assert_eq!(stats.label, "work");
        assert_eq!(stats.inclusive_cycles, 15);
        assert_eq!(stats.hit_count, 1);
    }

    #[test]
    fn test_begin_end_real_timer() {
        let mut profiler = Profiler::new(16).unwrap();
        let s = site(5, "real");
        let open = profiler.begin(&s, 0).unwrap();
        profiler.end(open);
        profiler.finish();

        let stats = profiler.table().find(s.id).unwrap();
        assert_eq!(stats.hit_count, 1);
        assert!(stats.inclusive_cycles <= profiler.total_cycles());
    }

    #[test]
    fn test_full_table_is_fail_soft() {
        let mut profiler = Profiler::with_start(3, 0).unwrap();
        // Slots 1 and 2 are the only usable ones
        let a = profiler.begin_at(&site(1, "a"), 0, 0).unwrap();
        profiler.end_at(a, 1);
        let b = profiler.begin_at(&site(2, "b"), 0, 1).unwrap();
        profiler.end_at(b, 2);

        assert!(!profiler.full_reported);
        assert!(profiler.begin_at(&site(4, "c"), 0, 2).is_none());
        assert!(profiler.full_reported);
        assert!(profiler.begin_at(&site(5, "d"), 0, 2).is_none());
        assert!(profiler.begin_at(&site(4, "c"), 0, 2).is_none());
        assert_eq!(profiler.dropped_regions(), 3);
        assert_eq!(profiler.open_regions(), 0);

        // Known call sites keep working
        let a = profiler.begin_at(&site(1, "a"), 0, 3).unwrap();
        profiler.end_at(a, 5);
        assert_eq!(profiler.table().find(BlockId::from_raw(1)).unwrap().hit_count, 2);
        assert!(profiler.table().find(BlockId::from_raw(4)).is_none());
    }

    #[test]
    fn test_foreign_block_ignored() {
        let mut first = Profiler::with_start(16, 0).unwrap();
        let mut second = Profiler::with_start(16, 0).unwrap();

        let open = first.begin_at(&site(3, "x"), 0, 0).unwrap();
        second.end_at(open, 100);

        assert!(second.table().find(BlockId::from_raw(3)).is_none());
        assert_eq!(first.open_regions(), 1);
    }

    #[test]
    fn test_total_cycles_before_finish() {
        let profiler = Profiler::with_start(8, 0).unwrap();
        assert!(!profiler.is_finished());
        assert!(profiler.total_cycles() > 0);
    }
}
