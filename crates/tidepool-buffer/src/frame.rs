//! Buffer frames: the fixed slots of the page cache.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tidepool_common::page::{PageNum, PAGE_SIZE};

/// Index of a frame in the buffer pool's frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Returns the frame table index.
    #[inline]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {}", self.0)
    }
}

/// Residency, lease count, and dirty state of one frame.
///
/// Kept together under one lock because the pool moves pages in and out of
/// a frame by updating all three at once.
#[derive(Debug, Default, Clone, Copy)]
struct FrameMeta {
    /// Resident page, `None` while the frame is empty.
    page: Option<PageNum>,
    /// Live leases handed out for the resident page.
    pin_count: u32,
    /// Whether the buffer diverges from the on-disk page.
    dirty: bool,
}

/// One slot of the page cache.
///
/// A frame owns a `PAGE_SIZE` buffer for the pool's whole lifetime. The
/// buffer sits behind its own reader/writer lock so handle access and
/// write-back never race; the bookkeeping lives behind a separate mutex so
/// it can be inspected without touching page data.
///
/// Replacement-policy metadata (recency stamps, reference counts, reference
/// bits) is not stored here; each policy keeps its own, indexed by FrameId.
pub struct BufferFrame {
    id: FrameId,
    meta: Mutex<FrameMeta>,
    data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl BufferFrame {
    /// Creates an empty frame with a zeroed buffer.
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            meta: Mutex::new(FrameMeta::default()),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.id
    }

    /// Returns the resident page, `None` while the frame is empty.
    pub fn page(&self) -> Option<PageNum> {
        self.meta.lock().page
    }

    /// Returns true while no page is resident.
    pub fn is_empty(&self) -> bool {
        self.meta.lock().page.is_none()
    }

    /// Installs a freshly loaded page: resident, one lease, clean.
    pub fn install(&self, page: PageNum) {
        let mut meta = self.meta.lock();
        meta.page = Some(page);
        meta.pin_count = 1;
        meta.dirty = false;
    }

    /// Adds a lease and returns the new pin count.
    pub fn pin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count += 1;
        meta.pin_count
    }

    /// Drops a lease and returns the new pin count. Saturates at zero.
    pub fn unpin(&self) -> u32 {
        let mut meta = self.meta.lock();
        meta.pin_count = meta.pin_count.saturating_sub(1);
        meta.pin_count
    }

    pub fn pin_count(&self) -> u32 {
        self.meta.lock().pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.meta.lock().pin_count > 0
    }

    pub fn is_dirty(&self) -> bool {
        self.meta.lock().dirty
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.meta.lock().dirty = dirty;
    }

    /// Returns the frame to the empty state and zeroes its buffer, so an
    /// empty frame never exposes bytes of a previously resident page.
    pub fn reset(&self) {
        *self.meta.lock() = FrameMeta::default();
        self.data.write().fill(0);
    }

    /// Read access to the page buffer.
    #[inline]
    pub fn read_data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Write access to the page buffer.
    #[inline]
    pub fn write_data(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }
}
