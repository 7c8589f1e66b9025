//! Buffer pool statistics.

use std::fmt;
use tidepool_common::page::PageNum;
use tidepool_common::ReplacementStrategy;

/// Snapshot of a buffer pool's state.
///
/// Captured atomically under the pool lock, so the vectors and counters
/// describe one consistent moment. All vectors have one entry per frame,
/// in frame order.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Number of frames in the pool.
    pub capacity: usize,
    /// Configured replacement strategy.
    pub strategy: ReplacementStrategy,
    /// Resident page of each frame, `None` for empty frames.
    pub frame_contents: Vec<Option<PageNum>>,
    /// Dirty flag of each frame.
    pub dirty_flags: Vec<bool>,
    /// Pin count of each frame.
    pub fix_counts: Vec<u32>,
    /// Pages read from disk since the pool was created.
    pub pages_read: u64,
    /// Pages written to disk since the pool was created.
    pub pages_written: u64,
}

impl PoolStats {
    /// Returns the number of frames holding a page.
    pub fn resident_count(&self) -> usize {
        self.frame_contents.iter().flatten().count()
    }

    /// Returns the number of dirty frames.
    pub fn dirty_count(&self) -> usize {
        self.dirty_flags.iter().filter(|&&d| d).count()
    }

    /// Returns the number of frames with a nonzero pin count.
    pub fn pinned_count(&self) -> usize {
        self.fix_counts.iter().filter(|&&c| c > 0).count()
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pool: {}/{} frames resident, {} dirty, {} pinned, {} reads, {} writes",
            self.strategy,
            self.resident_count(),
            self.capacity,
            self.dirty_count(),
            self.pinned_count(),
            self.pages_read,
            self.pages_written
        )
    }
}
