//! Page replacement policies for the buffer pool.

use crate::frame::FrameId;
use tidepool_common::{ReplacementStrategy, Result, TidepoolError};

/// Trait for page replacement algorithms.
///
/// The pool drives a policy through three hooks: `on_load` when a page is
/// read into a frame, `on_access` on every cache hit, and `select_victim`
/// when a full pool needs room. Policies see frames only as indices; pin
/// state arrives through the `evictable` predicate, and write-back of dirty
/// victims stays in the pool.
pub trait Replacer: Send {
    /// Records that a page was loaded into the given frame.
    fn on_load(&mut self, frame_id: FrameId);

    /// Records a cache hit on the given frame.
    fn on_access(&mut self, frame_id: FrameId);

    /// Selects a victim frame among those the predicate admits.
    ///
    /// Returns None if no frame is evictable.
    fn select_victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId>;
}

/// Builds the replacement policy for a pool of `num_frames` frames.
///
/// Fails with `StrategyNotImplemented` for LRU-K; nothing is silently
/// substituted.
pub fn build_replacer(
    strategy: ReplacementStrategy,
    num_frames: usize,
) -> Result<Box<dyn Replacer>> {
    let replacer: Box<dyn Replacer> = match strategy {
        ReplacementStrategy::Fifo => Box::new(FifoReplacer::new(num_frames)),
        ReplacementStrategy::Lru => Box::new(LruReplacer::new(num_frames)),
        ReplacementStrategy::Clock => Box::new(ClockReplacer::new(num_frames)),
        ReplacementStrategy::Lfu => Box::new(LfuReplacer::new(num_frames)),
        ReplacementStrategy::LruK => {
            return Err(TidepoolError::StrategyNotImplemented(strategy));
        }
    };
    Ok(replacer)
}

/// First-in-first-out replacement.
///
/// A circular cursor tracks load order: loading a page moves the cursor just
/// past the filled slot, so a victim scan starting at the cursor meets the
/// oldest-loaded frames first. Hits never move the cursor; FIFO ignores
/// recency of access, only recency of load.
pub struct FifoReplacer {
    /// Total number of frames.
    num_frames: usize,
    /// Oldest unexamined slot; victim scans start here.
    cursor: usize,
}

impl FifoReplacer {
    /// Creates a new FIFO replacer for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            cursor: 0,
        }
    }
}

impl Replacer for FifoReplacer {
    fn on_load(&mut self, frame_id: FrameId) {
        if frame_id.index() < self.num_frames {
            self.cursor = (frame_id.index() + 1) % self.num_frames;
        }
    }

    fn on_access(&mut self, _frame_id: FrameId) {}

    fn select_victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        for i in 0..self.num_frames {
            let frame_id = FrameId(((self.cursor + i) % self.num_frames) as u32);
            if evictable(frame_id) {
                return Some(frame_id);
            }
        }
        None
    }
}

/// Least-recently-used replacement.
///
/// Every load and every hit stamps the frame with the next value of a
/// monotonically increasing counter; the victim is the evictable frame with
/// the smallest stamp. The strict minimum scan breaks ties toward the lowest
/// frame index.
pub struct LruReplacer {
    /// Monotonic access counter.
    counter: u64,
    /// Stamp of the most recent touch, per frame.
    last_access: Vec<u64>,
}

impl LruReplacer {
    /// Creates a new LRU replacer for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            counter: 0,
            last_access: vec![0; num_frames],
        }
    }

    fn touch(&mut self, frame_id: FrameId) {
        if frame_id.index() < self.last_access.len() {
            self.counter += 1;
            self.last_access[frame_id.index()] = self.counter;
        }
    }
}

impl Replacer for LruReplacer {
    fn on_load(&mut self, frame_id: FrameId) {
        self.touch(frame_id);
    }

    fn on_access(&mut self, frame_id: FrameId) {
        self.touch(frame_id);
    }

    fn select_victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut victim: Option<FrameId> = None;
        let mut min_stamp = u64::MAX;

        for i in 0..self.last_access.len() {
            let frame_id = FrameId(i as u32);
            if evictable(frame_id) && self.last_access[i] < min_stamp {
                min_stamp = self.last_access[i];
                victim = Some(frame_id);
            }
        }
        victim
    }
}

/// Least-frequently-used replacement.
///
/// Each frame carries a hit counter that starts at 0 on load and grows on
/// every hit. The victim is the evictable frame with the fewest hits,
/// scanned from a rotating pointer that moves just past each chosen victim
/// so that ties spread across the table over time instead of hammering the
/// lowest index.
pub struct LfuReplacer {
    /// Total number of frames.
    num_frames: usize,
    /// Hits since load, per frame.
    ref_count: Vec<u64>,
    /// Scan start; advanced past the previous victim.
    pointer: usize,
}

impl LfuReplacer {
    /// Creates a new LFU replacer for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            ref_count: vec![0; num_frames],
            pointer: 0,
        }
    }
}

impl Replacer for LfuReplacer {
    fn on_load(&mut self, frame_id: FrameId) {
        if frame_id.index() < self.num_frames {
            self.ref_count[frame_id.index()] = 0;
        }
    }

    fn on_access(&mut self, frame_id: FrameId) {
        if frame_id.index() < self.num_frames {
            self.ref_count[frame_id.index()] += 1;
        }
    }

    fn select_victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let mut victim: Option<usize> = None;
        let mut min_count = u64::MAX;

        for i in 0..self.num_frames {
            let idx = (self.pointer + i) % self.num_frames;
            let frame_id = FrameId(idx as u32);
            if evictable(frame_id) && self.ref_count[idx] < min_count {
                min_count = self.ref_count[idx];
                victim = Some(idx);
            }
        }

        victim.map(|idx| {
            self.pointer = (idx + 1) % self.num_frames;
            FrameId(idx as u32)
        })
    }
}

/// Second-chance (CLOCK) replacement.
///
/// Each frame carries a reference bit, set on load and on every hit. A
/// circular hand sweeps the table, skipping pinned frames with their bits
/// untouched and clearing set bits as it passes. The first evictable frame
/// found with a clear bit becomes the victim, and the hand stops just past
/// it. With at least one evictable frame every bit falls within one
/// rotation, so two rotations always locate a victim.
pub struct ClockReplacer {
    /// Total number of frames.
    num_frames: usize,
    /// Reference bits, per frame.
    ref_bits: Vec<bool>,
    /// Current hand position.
    hand: usize,
}

impl ClockReplacer {
    /// Creates a new CLOCK replacer for `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        Self {
            num_frames,
            ref_bits: vec![false; num_frames],
            hand: 0,
        }
    }

    fn set_bit(&mut self, frame_id: FrameId) {
        if frame_id.index() < self.num_frames {
            self.ref_bits[frame_id.index()] = true;
        }
    }
}

impl Replacer for ClockReplacer {
    fn on_load(&mut self, frame_id: FrameId) {
        self.set_bit(frame_id);
    }

    fn on_access(&mut self, frame_id: FrameId) {
        self.set_bit(frame_id);
    }

    fn select_victim(&mut self, evictable: &dyn Fn(FrameId) -> bool) -> Option<FrameId> {
        let num_frames = self.num_frames;
        if !(0..num_frames).any(|i| evictable(FrameId(i as u32))) {
            return None;
        }

        for _ in 0..(2 * num_frames) {
            let idx = self.hand;
            let frame_id = FrameId(idx as u32);
            self.hand = (idx + 1) % num_frames;

            if !evictable(frame_id) {
                continue;
            }
            if self.ref_bits[idx] {
                // Second chance: clear the bit and keep sweeping
                self.ref_bits[idx] = false;
            } else {
                return Some(frame_id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(_: FrameId) -> bool {
        true
    }

    fn none(_: FrameId) -> bool {
        false
    }

    #[test]
    fn test_build_replacer_supported_strategies() {
        for strategy in [
            ReplacementStrategy::Fifo,
            ReplacementStrategy::Lru,
            ReplacementStrategy::Clock,
            ReplacementStrategy::Lfu,
        ] {
            assert!(build_replacer(strategy, 4).is_ok());
        }
    }

    #[test]
    fn test_build_replacer_lru_k_rejected() {
        let result = build_replacer(ReplacementStrategy::LruK, 4);
        assert!(matches!(
            result,
            Err(TidepoolError::StrategyNotImplemented(
                ReplacementStrategy::LruK
            ))
        ));
    }

    #[test]
    fn test_fifo_evicts_oldest_load() {
        let mut fifo = FifoReplacer::new(3);

        fifo.on_load(FrameId(0));
        fifo.on_load(FrameId(1));
        fifo.on_load(FrameId(2));

        // Cursor wrapped back to the oldest slot
        assert_eq!(fifo.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_fifo_skips_pinned() {
        let mut fifo = FifoReplacer::new(3);

        fifo.on_load(FrameId(0));
        fifo.on_load(FrameId(1));
        fifo.on_load(FrameId(2));

        let victim = fifo.select_victim(&|f| f != FrameId(0));
        assert_eq!(victim, Some(FrameId(1)));
    }

    #[test]
    fn test_fifo_access_does_not_reorder() {
        let mut fifo = FifoReplacer::new(3);

        fifo.on_load(FrameId(0));
        fifo.on_load(FrameId(1));
        fifo.on_load(FrameId(2));

        // Hits on the oldest frame must not save it
        fifo.on_access(FrameId(0));
        fifo.on_access(FrameId(0));

        assert_eq!(fifo.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_fifo_failed_selection_preserves_cursor() {
        let mut fifo = FifoReplacer::new(2);

        fifo.on_load(FrameId(0));
        fifo.on_load(FrameId(1));

        assert_eq!(fifo.select_victim(&none), None);
        // Cursor unchanged, the next selection still returns the oldest
        assert_eq!(fifo.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_fifo_cursor_follows_eviction_loads() {
        let mut fifo = FifoReplacer::new(3);

        fifo.on_load(FrameId(0));
        fifo.on_load(FrameId(1));
        fifo.on_load(FrameId(2));

        // Evict frame 0, reload it, and the next victim is frame 1
        assert_eq!(fifo.select_victim(&all), Some(FrameId(0)));
        fifo.on_load(FrameId(0));
        assert_eq!(fifo.select_victim(&all), Some(FrameId(1)));
    }

    #[test]
    fn test_fifo_no_evictable_frames() {
        let mut fifo = FifoReplacer::new(3);
        assert_eq!(fifo.select_victim(&none), None);
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let mut lru = LruReplacer::new(3);

        lru.on_load(FrameId(0));
        lru.on_load(FrameId(1));
        lru.on_load(FrameId(2));

        assert_eq!(lru.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_lru_access_refreshes() {
        let mut lru = LruReplacer::new(3);

        lru.on_load(FrameId(0));
        lru.on_load(FrameId(1));
        lru.on_load(FrameId(2));

        // Touch frame 0; frame 1 becomes the least recent
        lru.on_access(FrameId(0));

        assert_eq!(lru.select_victim(&all), Some(FrameId(1)));
    }

    #[test]
    fn test_lru_skips_pinned() {
        let mut lru = LruReplacer::new(3);

        lru.on_load(FrameId(0));
        lru.on_load(FrameId(1));
        lru.on_load(FrameId(2));

        let victim = lru.select_victim(&|f| f != FrameId(0));
        assert_eq!(victim, Some(FrameId(1)));
    }

    #[test]
    fn test_lru_tie_breaks_to_lowest_index() {
        let mut lru = LruReplacer::new(3);

        // Only frame 2 was ever touched; frames 0 and 1 tie at stamp 0
        lru.on_load(FrameId(2));

        assert_eq!(lru.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_lru_no_evictable_frames() {
        let mut lru = LruReplacer::new(2);
        lru.on_load(FrameId(0));
        lru.on_load(FrameId(1));
        assert_eq!(lru.select_victim(&none), None);
    }

    #[test]
    fn test_lfu_evicts_fewest_hits() {
        let mut lfu = LfuReplacer::new(3);

        lfu.on_load(FrameId(0));
        lfu.on_load(FrameId(1));
        lfu.on_load(FrameId(2));

        lfu.on_access(FrameId(0));
        lfu.on_access(FrameId(0));
        lfu.on_access(FrameId(1));

        // Frame 2 has zero hits
        assert_eq!(lfu.select_victim(&all), Some(FrameId(2)));
    }

    #[test]
    fn test_lfu_load_does_not_count_as_hit() {
        let mut lfu = LfuReplacer::new(2);

        lfu.on_load(FrameId(0));
        lfu.on_access(FrameId(0));
        lfu.on_load(FrameId(1));

        // Frame 1 was only loaded, never hit
        assert_eq!(lfu.select_victim(&all), Some(FrameId(1)));
    }

    #[test]
    fn test_lfu_reload_resets_count() {
        let mut lfu = LfuReplacer::new(2);

        lfu.on_load(FrameId(0));
        lfu.on_access(FrameId(0));
        lfu.on_access(FrameId(0));
        lfu.on_load(FrameId(1));
        lfu.on_access(FrameId(1));

        // A new page loaded into frame 0 starts back at zero hits
        lfu.on_load(FrameId(0));

        assert_eq!(lfu.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_lfu_pointer_spreads_ties() {
        let mut lfu = LfuReplacer::new(3);

        lfu.on_load(FrameId(0));
        lfu.on_load(FrameId(1));
        lfu.on_load(FrameId(2));

        // All counts equal; repeated selections rotate instead of repeating
        let first = lfu.select_victim(&all);
        assert_eq!(first, Some(FrameId(0)));
        let second = lfu.select_victim(&all);
        assert_eq!(second, Some(FrameId(1)));
        let third = lfu.select_victim(&all);
        assert_eq!(third, Some(FrameId(2)));
    }

    #[test]
    fn test_lfu_skips_pinned() {
        let mut lfu = LfuReplacer::new(3);

        lfu.on_load(FrameId(0));
        lfu.on_load(FrameId(1));
        lfu.on_load(FrameId(2));
        lfu.on_access(FrameId(1));

        let victim = lfu.select_victim(&|f| f != FrameId(0));
        assert_eq!(victim, Some(FrameId(2)));
    }

    #[test]
    fn test_lfu_no_evictable_frames() {
        let mut lfu = LfuReplacer::new(2);
        assert_eq!(lfu.select_victim(&none), None);
    }

    #[test]
    fn test_clock_evicts_clear_bit() {
        let mut clock = ClockReplacer::new(3);

        clock.on_load(FrameId(0));
        clock.on_load(FrameId(1));
        // Frame 2 never loaded, bit stays clear

        assert_eq!(clock.select_victim(&all), Some(FrameId(2)));
    }

    #[test]
    fn test_clock_second_chance() {
        let mut clock = ClockReplacer::new(2);

        clock.on_load(FrameId(0));
        clock.on_load(FrameId(1));
        clock.on_access(FrameId(0));

        // Sweep clears both bits on the first rotation and takes frame 0 on
        // the wrap
        assert_eq!(clock.select_victim(&all), Some(FrameId(0)));
    }

    #[test]
    fn test_clock_hand_continues_after_eviction() {
        let mut clock = ClockReplacer::new(3);

        clock.on_load(FrameId(0));
        clock.on_load(FrameId(1));
        clock.on_load(FrameId(2));

        // First sweep clears 0,1,2 and wraps to take frame 0
        assert_eq!(clock.select_victim(&all), Some(FrameId(0)));
        // Hand sits past frame 0, so frame 1 goes next
        assert_eq!(clock.select_victim(&all), Some(FrameId(1)));
    }

    #[test]
    fn test_clock_skips_pinned_without_clearing() {
        let mut clock = ClockReplacer::new(2);

        clock.on_load(FrameId(0));

        // Frame 0 pinned: the sweep passes it without touching its bit
        assert_eq!(clock.select_victim(&|f| f != FrameId(0)), Some(FrameId(1)));

        // Frame 0 kept its bit, so it still gets a second chance and the
        // sweep takes frame 1 again
        assert_eq!(clock.select_victim(&all), Some(FrameId(1)));
    }

    #[test]
    fn test_clock_all_bits_set_still_terminates() {
        let mut clock = ClockReplacer::new(4);

        for i in 0..4 {
            clock.on_load(FrameId(i));
        }

        assert!(clock.select_victim(&all).is_some());
    }

    #[test]
    fn test_clock_no_evictable_frames() {
        let mut clock = ClockReplacer::new(3);
        clock.on_load(FrameId(0));
        assert_eq!(clock.select_victim(&none), None);
    }

    #[test]
    fn test_clock_single_frame_pool() {
        let mut clock = ClockReplacer::new(1);

        clock.on_load(FrameId(0));
        // One rotation clears the bit, the next takes the frame
        assert_eq!(clock.select_victim(&all), Some(FrameId(0)));
    }
}
