//! Per-thread control block statistics.
//!
//! Every thread keeps its own counters of control blocks allocated, control
//! blocks freed and deleters run. An event is counted on the thread that
//! performed it, so a block created on one thread and released on another
//! shows up as allocated on the first and freed on the second.
//!
//! The counters are compiled in with the `block-stats` feature (on by
//! default). Without it the recording hooks are empty.
//!
//! # Example
//!
//! ```rust
//! use tether::SharedHandle;
//! use tether::stats::{block_stats, reset_block_stats};
//!
//! reset_block_stats();
//! let handle = SharedHandle::new(String::from("config"));
//! assert_eq!(block_stats().live(), 1);
//!
//! drop(handle);
//! let stats = block_stats();
//! assert_eq!(stats.freed, 1);
//! assert_eq!(stats.deleters_run, 1);
//! assert_eq!(stats.live(), 0);
//! ```

/// Snapshot of the calling thread's control block counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Control blocks allocated on this thread.
    pub allocated: usize,
    /// Control blocks freed on this thread.
    pub freed: usize,
    /// Deleters run on this thread.
    pub deleters_run: usize,
}

impl BlockStats {
    #[cfg_attr(not(feature = "block-stats"), allow(dead_code))]
    const ZERO: BlockStats = BlockStats {
        allocated: 0,
        freed: 0,
        deleters_run: 0,
    };

    /// Blocks allocated but not yet freed, as seen from this thread.
    #[must_use]
    pub fn live(&self) -> usize {
        self.allocated.saturating_sub(self.freed)
    }

    /// Counter growth between an `earlier` snapshot and this one.
    #[must_use]
    pub fn since(&self, earlier: &BlockStats) -> BlockStats {
        BlockStats {
            allocated: self.allocated.saturating_sub(earlier.allocated),
            freed: self.freed.saturating_sub(earlier.freed),
            deleters_run: self.deleters_run.saturating_sub(earlier.deleters_run),
        }
    }
}

#[cfg(feature = "block-stats")]
mod counters {
    use super::BlockStats;
    use std::cell::Cell;

    thread_local! {
        static STATS: Cell<BlockStats> = const { Cell::new(BlockStats::ZERO) };
    }

    pub(super) fn update(f: impl FnOnce(&mut BlockStats)) {
        STATS.with(|cell| {
            let mut stats = cell.get();
            f(&mut stats);
            cell.set(stats);
        });
    }

    pub(super) fn get() -> BlockStats {
        STATS.with(Cell::get)
    }

    pub(super) fn reset() {
        STATS.with(|cell| cell.set(BlockStats::ZERO));
    }
}

/// Returns the calling thread's counters.
#[cfg(feature = "block-stats")]
#[must_use]
pub fn block_stats() -> BlockStats {
    counters::get()
}

/// Zeroes the calling thread's counters.
#[cfg(feature = "block-stats")]
pub fn reset_block_stats() {
    counters::reset();
}

#[cfg(feature = "block-stats")]
#[inline]
pub(crate) fn record_allocated() {
    counters::update(|s| s.allocated += 1);
}

#[cfg(feature = "block-stats")]
#[inline]
pub(crate) fn record_freed() {
    counters::update(|s| s.freed += 1);
}

#[cfg(feature = "block-stats")]
#[inline]
pub(crate) fn record_deleter_run() {
    counters::update(|s| s.deleters_run += 1);
}

#[cfg(not(feature = "block-stats"))]
#[inline(always)]
pub(crate) fn record_allocated() {}

#[cfg(not(feature = "block-stats"))]
#[inline(always)]
pub(crate) fn record_freed() {}

#[cfg(not(feature = "block-stats"))]
#[inline(always)]
pub(crate) fn record_deleter_run() {}
