//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::replacer::{build_replacer, Replacer};
use crate::stats::PoolStats;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::path::Path;
use sysinfo::System;
use tidepool_common::page::{PageNum, PAGE_SIZE};
use tidepool_common::{CacheConfig, ReplacementStrategy, Result, TidepoolError};
use tidepool_storage::{PagedFile, PagedFileOptions};

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub capacity: usize,
    /// Replacement policy used to choose eviction victims.
    pub strategy: ReplacementStrategy,
    /// Policy parameter. Only LRU-K consumes it, and LRU-K is rejected
    /// at construction, so it is carried for forward compatibility.
    pub strategy_param: Option<u32>,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            strategy: ReplacementStrategy::default(),
            strategy_param: None,
        }
    }
}

impl BufferPoolConfig {
    /// Builds a configuration sized to 25% of available system RAM.
    ///
    /// Queries the system for available memory and allocates a quarter of
    /// it to page frames. Minimum 1,000 frames to ensure useful caching
    /// even on low-memory systems. For a system with 16GB available, this
    /// yields roughly one million 4KB frames.
    pub fn auto_sized(strategy: ReplacementStrategy) -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4; // 25% of available RAM
        let capacity = (target_bytes / PAGE_SIZE).max(1_000);

        Self {
            capacity,
            strategy,
            strategy_param: None,
        }
    }
}

/// Mutable pool state, serialized by one mutex.
///
/// Every protocol operation locks this for its full duration, so no call
/// observes another's partial effects.
struct PoolState {
    /// Replacement policy metadata.
    replacer: Box<dyn Replacer>,
    /// Pages read from disk into frames.
    pages_read: u64,
    /// Pages written back to disk.
    pages_written: u64,
    /// Set by a successful `shutdown`; protocol calls fail afterwards.
    closed: bool,
}

/// Buffer pool manager.
///
/// Caches pages of a single backing file in a fixed set of frames:
/// - page residency and pin counting via the pin/unpin protocol
/// - dirty tracking with write-back on eviction
/// - pluggable replacement policy for choosing eviction victims
/// - read/write counters for observing disk traffic
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Backing page file. All disk access goes through it.
    file: PagedFile,
    /// Array of buffer frames, fixed at construction.
    frames: Vec<BufferFrame>,
    /// Protocol state behind the pool lock.
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Creates a buffer pool over an open page file.
    ///
    /// All frames start empty. Fails with `PoolInit` when the capacity is
    /// zero and with `StrategyNotImplemented` when the configured policy
    /// has no implementation.
    pub fn new(file: PagedFile, config: BufferPoolConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(TidepoolError::PoolInit(
                "capacity must be at least 1 frame".to_string(),
            ));
        }

        let replacer = build_replacer(config.strategy, config.capacity)?;
        let frames: Vec<_> = (0..config.capacity)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        info!(
            "buffer pool opened: {} frames, {} replacement, file {}",
            config.capacity,
            config.strategy,
            file.path().display()
        );

        Ok(Self {
            config,
            file,
            frames,
            state: Mutex::new(PoolState {
                replacer,
                pages_read: 0,
                pages_written: 0,
                closed: false,
            }),
        })
    }

    /// Opens the page file at `path` and builds a pool over it.
    ///
    /// The file must already exist; this never creates it.
    pub fn open(path: impl AsRef<Path>, config: BufferPoolConfig) -> Result<Self> {
        let file = PagedFile::open(path)?;
        Self::new(file, config)
    }

    /// Builds a pool from a cache configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let options = PagedFileOptions {
            fsync_enabled: config.fsync_enabled,
        };
        let file = PagedFile::open_with(&config.page_file, options)?;
        Self::new(
            file,
            BufferPoolConfig {
                capacity: config.capacity,
                strategy: config.strategy,
                strategy_param: config.strategy_param,
            },
        )
    }

    /// Returns the number of frames in the pool.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Returns the configured replacement strategy.
    #[inline]
    pub fn strategy(&self) -> ReplacementStrategy {
        self.config.strategy
    }

    /// Pins a page, reading it from disk if it is not already resident.
    ///
    /// A resident page is returned directly with its pin count raised. On
    /// a miss the page is loaded into the lowest-index empty frame, or
    /// into a victim frame chosen by the replacement policy once the pool
    /// is full. A dirty victim is written back before its frame is
    /// reused. Pinning a page past the current end of the file grows the
    /// file with zero-filled pages.
    ///
    /// Fails with `PoolExhausted` when every frame is pinned.
    pub fn pin(&self, page_num: PageNum) -> Result<PageHandle<'_>> {
        let mut state = self.state.lock();
        self.check_open(&state)?;

        if let Some(frame) = self.frame_of(page_num) {
            frame.pin();
            state.replacer.on_access(frame.frame_id());
            return Ok(PageHandle { page_num, frame });
        }

        let frame = match self.frames.iter().find(|f| f.is_empty()) {
            Some(frame) => frame,
            None => {
                let evictable = |fid: FrameId| self.frames[fid.index()].pin_count() == 0;
                let victim = state
                    .replacer
                    .select_victim(&evictable)
                    .ok_or(TidepoolError::PoolExhausted)?;

                let frame = &self.frames[victim.index()];
                if let Some(old) = frame.page() {
                    if frame.is_dirty() {
                        self.write_back(frame, old, &mut state)?;
                    }
                    debug!("evicted page {old} from {victim}");
                }
                frame.reset();
                frame
            }
        };

        self.file.ensure_capacity(page_num.0.saturating_add(1))?;
        {
            let mut data = frame.write_data();
            self.file.read_block(page_num, &mut data)?;
        }
        state.pages_read += 1;

        frame.install(page_num);
        state.replacer.on_load(frame.frame_id());

        Ok(PageHandle { page_num, frame })
    }

    /// Unpins a page, making its frame eligible for eviction once the pin
    /// count reaches zero.
    ///
    /// Fails with `PageNotResident` when the page is not cached and with
    /// `PageNotPinned` when its pin count is already zero.
    pub fn unpin(&self, page_num: PageNum) -> Result<()> {
        let state = self.state.lock();
        self.check_open(&state)?;

        let frame = self
            .frame_of(page_num)
            .ok_or(TidepoolError::PageNotResident { page: page_num })?;
        if !frame.is_pinned() {
            return Err(TidepoolError::PageNotPinned { page: page_num });
        }
        frame.unpin();
        Ok(())
    }

    /// Marks a resident page dirty so it is written back before its frame
    /// is reused.
    pub fn mark_dirty(&self, page_num: PageNum) -> Result<()> {
        let state = self.state.lock();
        self.check_open(&state)?;

        let frame = self
            .frame_of(page_num)
            .ok_or(TidepoolError::PageNotResident { page: page_num })?;
        frame.set_dirty(true);
        Ok(())
    }

    /// Writes a resident page to disk if it is dirty.
    ///
    /// Clears the dirty flag on success; a clean page costs no disk
    /// write. Works regardless of the page's pin count.
    pub fn force_page(&self, page_num: PageNum) -> Result<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;

        let frame = self
            .frame_of(page_num)
            .ok_or(TidepoolError::PageNotResident { page: page_num })?;
        if frame.is_dirty() {
            self.write_back(frame, page_num, &mut state)?;
            debug!("forced page {page_num} to disk");
        }
        Ok(())
    }

    /// Writes back every dirty page whose pin count is zero.
    ///
    /// Pinned dirty pages are left untouched. Stops at the first write
    /// failure; pages flushed before the failure stay clean.
    pub fn force_flush(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;

        let flushed = self.flush_unpinned(&mut state)?;
        debug!("flushed {flushed} dirty pages");
        Ok(())
    }

    /// Flushes all unpinned dirty pages and closes the pool.
    ///
    /// Fails with `PinnedPagesRemain` when any page is still pinned; the
    /// flush still happened and the pool remains usable. After a
    /// successful shutdown every protocol call fails with `PoolClosed`.
    pub fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        self.check_open(&state)?;

        self.flush_unpinned(&mut state)?;

        let pinned = self.frames.iter().filter(|f| f.is_pinned()).count();
        if pinned > 0 {
            return Err(TidepoolError::PinnedPagesRemain { count: pinned });
        }

        for frame in &self.frames {
            frame.reset();
        }
        state.closed = true;
        info!(
            "buffer pool closed: {} pages read, {} pages written",
            state.pages_read, state.pages_written
        );
        Ok(())
    }

    /// Returns the resident page of every frame, in frame order.
    pub fn frame_contents(&self) -> Vec<Option<PageNum>> {
        let _state = self.state.lock();
        self.frames.iter().map(|f| f.page()).collect()
    }

    /// Returns the dirty flag of every frame, in frame order.
    pub fn dirty_flags(&self) -> Vec<bool> {
        let _state = self.state.lock();
        self.frames.iter().map(|f| f.is_dirty()).collect()
    }

    /// Returns the pin count of every frame, in frame order.
    pub fn fix_counts(&self) -> Vec<u32> {
        let _state = self.state.lock();
        self.frames.iter().map(|f| f.pin_count()).collect()
    }

    /// Returns the number of pages read from disk since construction.
    pub fn read_io(&self) -> u64 {
        self.state.lock().pages_read
    }

    /// Returns the number of pages written to disk since construction.
    pub fn write_io(&self) -> u64 {
        self.state.lock().pages_written
    }

    /// Returns a consistent snapshot of the pool's state.
    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            capacity: self.config.capacity,
            strategy: self.config.strategy,
            frame_contents: self.frames.iter().map(|f| f.page()).collect(),
            dirty_flags: self.frames.iter().map(|f| f.is_dirty()).collect(),
            fix_counts: self.frames.iter().map(|f| f.pin_count()).collect(),
            pages_read: state.pages_read,
            pages_written: state.pages_written,
        }
    }

    fn check_open(&self, state: &PoolState) -> Result<()> {
        if state.closed {
            return Err(TidepoolError::PoolClosed);
        }
        Ok(())
    }

    /// Finds the frame holding `page_num`. Callers hold the state lock.
    fn frame_of(&self, page_num: PageNum) -> Option<&BufferFrame> {
        self.frames.iter().find(|f| f.page() == Some(page_num))
    }

    /// Writes a frame's data to its page on disk and clears the dirty
    /// flag. Callers hold the state lock.
    fn write_back(&self, frame: &BufferFrame, page: PageNum, state: &mut PoolState) -> Result<()> {
        let data = frame.read_data();
        self.file.write_block(page, &data)?;
        drop(data);

        frame.set_dirty(false);
        state.pages_written += 1;
        Ok(())
    }

    /// Writes back every unpinned dirty frame. Returns the number of
    /// pages written. Callers hold the state lock.
    fn flush_unpinned(&self, state: &mut PoolState) -> Result<usize> {
        let mut flushed = 0;
        for frame in &self.frames {
            if frame.is_dirty() && !frame.is_pinned() {
                if let Some(page) = frame.page() {
                    self.write_back(frame, page, state)?;
                    flushed += 1;
                }
            }
        }
        Ok(flushed)
    }
}

impl Drop for BufferPool {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        if let Err(e) = self.flush_unpinned(&mut state) {
            warn!("flush on drop failed: {e}");
        }
    }
}

/// Borrowed view of a pinned page's frame.
///
/// Valid between the `pin` that produced it and the matching `unpin`;
/// reading through a handle after unpinning may observe a different page
/// once the frame is reused. Mutations through `data_mut` reach disk only
/// if the page is marked dirty before eviction or forced explicitly.
pub struct PageHandle<'a> {
    page_num: PageNum,
    frame: &'a BufferFrame,
}

impl PageHandle<'_> {
    /// Returns the page number.
    pub fn page_num(&self) -> PageNum {
        self.page_num
    }

    /// Returns read access to the page data.
    pub fn data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }

    /// Returns write access to the page data.
    pub fn data_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.write_data()
    }
}
