//! Pinned page handles and latch guards.
//!
//! - [`PinnedPage`] - owns exactly one pin on a resident page
//! - [`PageReadGuard`] - shared page latch, borrowed from a handle
//! - [`PageWriteGuard`] - exclusive page latch, marks the handle dirty
//!
//! A guard borrows its handle, so a latch can never outlive the pin that
//! keeps the frame from being evicted.

use std::ops::{Deref, DerefMut};

use log::{error, warn};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::Page;

use super::buffer_pool_manager::BufferPoolManager;
use super::frame::Frame;

/// A pinned page. Dropping it unpins the page, reporting whether any write
/// guard was taken.
///
/// # Example
/// ```ignore
/// let mut page = bpm.fetch_page(page_id)?;
/// page.write().as_mut_slice()[16] = 0xFF;
/// // page drops here: unpinned as dirty
/// ```
pub struct PinnedPage<'a> {
    bpm: &'a BufferPoolManager,
    frame: &'a Frame,
    frame_id: FrameId,
    page_id: PageId,
    dirty: bool,
}

impl<'a> PinnedPage<'a> {
    /// Wrap a pin the pool has already taken on `frame_id`.
    pub(crate) fn new(bpm: &'a BufferPoolManager, frame_id: FrameId, page_id: PageId) -> Self {
        Self {
            bpm,
            frame: bpm.frame(frame_id),
            frame_id,
            page_id,
            dirty: false,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Whether the page will be unpinned as dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Report the page as modified when it is unpinned.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Take the page latch in shared mode.
    pub fn read(&self) -> PageReadGuard<'_> {
        PageReadGuard {
            page_id: self.page_id,
            lock: self.frame.page(),
        }
    }

    /// Take the page latch in exclusive mode. The page becomes dirty.
    pub fn write(&mut self) -> PageWriteGuard<'_> {
        self.dirty = true;
        PageWriteGuard {
            page_id: self.page_id,
            lock: self.frame.page_mut(),
        }
    }

    /// Give up the handle without unpinning.
    ///
    /// The caller becomes responsible for a matching
    /// [`BufferPoolManager::unpin_page`].
    pub fn into_page_id(self) -> PageId {
        let page_id = self.page_id;
        std::mem::forget(self);
        page_id
    }
}

impl Drop for PinnedPage<'_> {
    fn drop(&mut self) {
        match self.bpm.unpin_page(self.page_id, self.dirty) {
            Ok(true) => {}
            Ok(false) => warn!("{} was not pinned when its handle dropped", self.page_id),
            Err(e) => error!("unpin of {} failed: {}", self.page_id, e),
        }
    }
}

/// Shared access to a pinned page's bytes.
pub struct PageReadGuard<'a> {
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl PageReadGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Exclusive access to a pinned page's bytes.
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl PageWriteGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
