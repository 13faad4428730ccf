//! Eviction policies (replacers).
//!
//! A replacer tracks which frames are currently unpinned and picks the
//! next victim among them. Implementations:
//! - [`LruReplacer`] - least recently unpinned frame first

mod lru;

pub use lru::LruReplacer;

use crate::common::FrameId;

/// Victim selection over the set of evictable frames.
///
/// The buffer pool calls into its replacer with the pool mutex held, so
/// implementations need no internal locking.
pub trait Replacer {
    /// `frame_id`'s pin count dropped to zero; it is now a victim candidate.
    fn record_unpinned(&mut self, frame_id: FrameId);

    /// `frame_id` was pinned again; withdraw it from candidacy.
    /// No-op if it is not tracked.
    fn record_pinned(&mut self, frame_id: FrameId);

    /// Remove and return the next frame to evict.
    fn victim(&mut self) -> Option<FrameId>;

    /// Number of evictable frames.
    fn size(&self) -> usize;
}
