//! The page-oriented surface shared by single and sharded pools.

use crate::common::{PageId, Result};

use super::page_guard::PinnedPage;

/// What an index needs from a page cache.
///
/// Implemented by [`BufferPoolManager`](super::BufferPoolManager) and
/// [`ParallelBufferPoolManager`](super::ParallelBufferPoolManager); indexes
/// hold an `Arc<dyn BufferPool>` and never care which one they got.
pub trait BufferPool: Send + Sync {
    /// Pin `page_id`, reading it from disk if it is not resident.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if every frame is pinned
    /// - `Error::PageNotFound` if the page was never written
    fn fetch_page(&self, page_id: PageId) -> Result<PinnedPage<'_>>;

    /// Allocate a fresh page id and pin a zeroed frame for it.
    ///
    /// # Errors
    /// `Error::NoFreeFrames` if every frame is pinned.
    fn new_page(&self) -> Result<PinnedPage<'_>>;

    /// Release one pin. Returns false if the page is not resident or not
    /// pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool>;

    /// Write a resident page to disk regardless of its dirty flag.
    /// Returns false if the page is not resident.
    fn flush_page(&self, page_id: PageId) -> Result<bool>;

    /// Write every resident page to disk and sync the file.
    fn flush_all_pages(&self) -> Result<()>;

    /// Drop a page from the pool. Returns false if it is still pinned.
    fn delete_page(&self, page_id: PageId) -> Result<bool>;

    /// Total number of frames.
    fn pool_size(&self) -> usize;
}
