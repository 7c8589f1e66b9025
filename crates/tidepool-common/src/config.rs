//! Configuration structures for tidepool.

use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Page replacement strategy for the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementStrategy {
    /// Evict the page loaded longest ago, ignoring hits.
    Fifo,
    /// Evict the least recently touched page.
    #[default]
    Lru,
    /// Second-chance sweep over per-frame reference bits.
    Clock,
    /// Evict the page with the fewest hits since it was loaded.
    Lfu,
    /// Backward-k-distance replacement. Not implemented; selecting it fails.
    LruK,
}

impl std::fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ReplacementStrategy::Fifo => "FIFO",
            ReplacementStrategy::Lru => "LRU",
            ReplacementStrategy::Clock => "CLOCK",
            ReplacementStrategy::Lfu => "LFU",
            ReplacementStrategy::LruK => "LRU-K",
        };
        write!(f, "{name}")
    }
}

/// Cache configuration for a tidepool instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backing page file.
    pub page_file: PathBuf,
    /// Buffer pool capacity in number of frames.
    pub capacity: usize,
    /// Page replacement strategy.
    pub strategy: ReplacementStrategy,
    /// Strategy-specific parameter (k for LRU-K).
    pub strategy_param: Option<u32>,
    /// Enable fsync on flush for durability.
    pub fsync_enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_file: PathBuf::from("./tidepool.db"),
            capacity: 128, // 512 KB with 4 KB pages
            strategy: ReplacementStrategy::default(),
            strategy_param: None,
            fsync_enabled: true,
        }
    }
}

impl CacheConfig {
    /// Returns the total in-memory cache size in bytes.
    pub fn cache_size_bytes(&self) -> usize {
        self.capacity * PAGE_SIZE
    }
}
