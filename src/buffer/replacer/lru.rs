//! LRU (Least Recently Used) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
///
/// Frames are kept in access order (front = least recent). Every access
/// moves the frame to the back. Pinned frames stay in the queue but are
/// skipped by [`LruReplacer::evict`].
pub struct LruReplacer {
    order: VecDeque<FrameId>,
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was just used, making it the most recent.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.order.iter().position(|&f| f == frame_id) {
            self.order.remove(pos);
        }
        self.order.push_back(frame_id);
    }

    /// Mark a frame as evictable (pin count dropped to 0) or not.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Take the least recently used evictable frame out of the replacer.
    ///
    /// Returns `None` if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let pos = self.order.iter().position(|f| self.evictable.contains(f))?;
        let frame_id = self.order.remove(pos)?;
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(ids: &[usize]) -> Vec<FrameId> {
        ids.iter().copied().map(FrameId::new).collect()
    }

    #[test]
    fn test_lru_basic() {
        let mut replacer = LruReplacer::new();

        for f in frames(&[0, 1, 2]) {
            replacer.record_access(f);
            replacer.set_evictable(f, true);
        }
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_reaccess_moves_to_back() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.record_access(FrameId::new(2));
        replacer.record_access(FrameId::new(0));

        for f in frames(&[0, 1, 2]) {
            replacer.set_evictable(f, true);
        }

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_skips_pinned() {
        let mut replacer = LruReplacer::new();

        for f in frames(&[0, 1, 2]) {
            replacer.record_access(f);
        }
        replacer.set_evictable(FrameId::new(1), true);

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);

        // Pinned frames keep their place in the order.
        replacer.set_evictable(FrameId::new(2), true);
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_record_access_is_idempotent_for_membership() {
        let mut replacer = LruReplacer::new();

        replacer.record_access(FrameId::new(3));
        replacer.record_access(FrameId::new(3));
        replacer.set_evictable(FrameId::new(3), true);

        assert_eq!(replacer.evict(), Some(FrameId::new(3)));
        assert_eq!(replacer.evict(), None);
    }
}
