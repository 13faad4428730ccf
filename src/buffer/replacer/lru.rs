//! LRU (Least Recently Used) replacement policy.

use crate::common::FrameId;

use super::Replacer;

const NIL: usize = usize::MAX;

/// Strict LRU over the set of unpinned frames.
///
/// Recency is the moment a frame's pin count last dropped to zero. The list
/// is intrusive: `prev`/`next` are indexed by frame id, so every operation
/// is O(1) with no allocation after construction.
///
/// ```text
/// head (LRU, next victim) <-> ... <-> tail (MRU, most recently unpinned)
/// ```
pub struct LruReplacer {
    prev: Vec<usize>,
    next: Vec<usize>,
    linked: Vec<bool>,
    head: usize,
    tail: usize,
    len: usize,
}

impl LruReplacer {
    /// Create a replacer able to track frames `0..num_frames`.
    pub fn new(num_frames: usize) -> Self {
        Self {
            prev: vec![NIL; num_frames],
            next: vec![NIL; num_frames],
            linked: vec![false; num_frames],
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    fn push_back(&mut self, idx: usize) {
        self.prev[idx] = self.tail;
        self.next[idx] = NIL;
        if self.tail == NIL {
            self.head = idx;
        } else {
            self.next[self.tail] = idx;
        }
        self.tail = idx;
        self.linked[idx] = true;
        self.len += 1;
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.prev[idx], self.next[idx]);
        if prev == NIL {
            self.head = next;
        } else {
            self.next[prev] = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.prev[next] = prev;
        }
        self.prev[idx] = NIL;
        self.next[idx] = NIL;
        self.linked[idx] = false;
        self.len -= 1;
    }
}

impl Replacer for LruReplacer {
    /// Already-tracked frames keep their position.
    fn record_unpinned(&mut self, frame_id: FrameId) {
        let idx = frame_id.index();
        assert!(idx < self.linked.len(), "{} out of range", frame_id);
        if !self.linked[idx] {
            self.push_back(idx);
        }
    }

    fn record_pinned(&mut self, frame_id: FrameId) {
        let idx = frame_id.index();
        if idx < self.linked.len() && self.linked[idx] {
            self.unlink(idx);
        }
    }

    fn victim(&mut self) -> Option<FrameId> {
        if self.head == NIL {
            return None;
        }
        let idx = self.head;
        self.unlink(idx);
        Some(FrameId::new(idx))
    }

    fn size(&self) -> usize {
        self.len
    }
}
