//! In-memory page caching for Tidepool.
//!
//! This crate provides a fixed-capacity buffer pool over a paged file:
//! - pin/unpin protocol with per-frame pin counts
//! - pluggable replacement policies (FIFO, LRU, LFU, CLOCK)
//! - dirty page tracking with write-back on eviction
//! - read/write counters and per-frame statistics

mod frame;
mod pool;
mod replacer;
mod stats;

pub use frame::{BufferFrame, FrameId};
pub use pool::{BufferPool, BufferPoolConfig, PageHandle};
pub use replacer::{build_replacer, ClockReplacer, FifoReplacer, LfuReplacer, LruReplacer, Replacer};
pub use stats::PoolStats;
