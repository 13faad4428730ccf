//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] pairs a page buffer with the bookkeeping the pool keeps for
//! whichever page currently occupies it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// # Thread Safety
/// - `page`: `RwLock`, the page latch. Callers take it after pinning and
///   release it before unpinning; the pool itself only latches frames that
///   nobody has pinned.
/// - `resident`, `pins`: atomics so diagnostics can read them without the
///   pool mutex. They only change while the pool mutex is held.
/// - `dirty`: also cleared by flushes, which hold the page latch instead of
///   the pool mutex.
pub struct Frame {
    page: RwLock<Page>,
    /// `PageId::INVALID` when the frame is empty.
    resident: AtomicU32,
    pins: AtomicU32,
    dirty: AtomicBool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            resident: AtomicU32::new(PageId::INVALID.0),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
        }
    }

    /// Shared page latch.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Exclusive page latch.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// The page occupying this frame.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        let raw = PageId::new(self.resident.load(Ordering::Acquire));
        raw.is_valid().then_some(raw)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id().is_none()
    }

    /// Hand the frame to `page_id` with a single pin and a clean page.
    pub fn install(&self, page_id: PageId) {
        debug_assert!(!self.is_pinned(), "installing into a pinned frame");
        self.resident.store(page_id.0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.pins.store(1, Ordering::Release);
    }

    /// Forget the resident page. The buffer contents are left as they are.
    pub fn detach(&self) {
        self.resident.store(PageId::INVALID.0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
    }

    /// Detach and zero the buffer. Takes the page latch.
    pub fn clear(&self) {
        debug_assert!(!self.is_pinned(), "clearing a pinned frame");
        self.page_mut().reset();
        self.detach();
        self.pins.store(0, Ordering::Release);
    }

    /// Add a pin. Returns true if this was the first one, meaning the
    /// frame just stopped being evictable.
    #[inline]
    pub fn pin(&self) -> bool {
        self.pins.fetch_add(1, Ordering::AcqRel) == 0
    }

    /// Drop a pin. Returns true if it was the last one.
    ///
    /// # Panics
    /// Panics if the frame is not pinned.
    #[inline]
    pub fn unpin(&self) -> bool {
        let before = self.pins.fetch_sub(1, Ordering::AcqRel);
        assert!(before > 0, "pin count underflow");
        before == 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
