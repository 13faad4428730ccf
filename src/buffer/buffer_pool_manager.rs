//! Buffer Pool Manager - the core page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting
//! - Dirty page write-back on unpin and eviction
//! - LRU eviction behind the [`Replacer`] trait

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::buffer::replacer::{LruReplacer, Replacer};
use crate::buffer::{BufferPool, Frame, PinnedPage, PoolStats};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Bookkeeping guarded by the pool mutex.
struct PoolState {
    /// Resident pages.
    page_table: HashMap<PageId, FrameId>,
    /// Frames holding no page, preferred over eviction.
    free_list: VecDeque<FrameId>,
    /// Unpinned resident frames, in eviction order.
    replacer: Box<dyn Replacer + Send>,
    /// Next id `allocate_page` hands out.
    next_page_id: u32,
    /// Pages being read in by a `fetch_page` that released the mutex.
    loading: HashSet<PageId>,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────── Mutex<PoolState> ─────────────┐  │
/// │  │ page_table   free_list   replacer   next_page_id      │  │
/// │  └───────────────────────────────────────────────────────┘  │
/// │  ┌───────────────────────────────────┐  ┌──────────────┐    │
/// │  │        frames: Vec<Frame>         │  │ disk_manager │    │
/// │  │  [Frame0] [Frame1] [Frame2] ...   │  │ Arc<Mutex>   │    │
/// │  └───────────────────────────────────┘  └──────────────┘    │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - All bookkeeping (page table, free list, replacer, pin counts) is
///   serialized by one mutex. Page *content* is not: callers latch pages
///   through [`PinnedPage::read`] / [`PinnedPage::write`].
/// - Lock order is pool mutex, then page latch, then disk mutex. The pool
///   only latches frames that nobody has pinned, so it never waits on a
///   caller's latch while holding its mutex.
/// - The only disk I/O under the mutex is write-back of a dirty page on
///   eviction or final unpin. Fetch reads and the write-through of new
///   pages happen on frames nothing else can reach yet.
/// - `disk_manager` may be shared with sibling instances of a
///   [`ParallelBufferPoolManager`](super::ParallelBufferPoolManager).
///
/// # Usage
/// ```ignore
/// let dm = DiskManager::create("test.db")?;
/// let bpm = BufferPoolManager::new(10, dm);
///
/// let mut page = bpm.new_page()?;
/// page.write().as_mut_slice()[16] = 0xAB;
/// let page_id = page.page_id();
/// drop(page); // unpinned as dirty
///
/// let page = bpm.fetch_page(page_id)?;
/// assert_eq!(page.read().as_slice()[16], 0xAB);
/// ```
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    state: Mutex<PoolState>,

    /// Signalled whenever a page leaves `PoolState::loading`.
    load_finished: Condvar,

    disk_manager: Arc<Mutex<DiskManager>>,

    stats: PoolStats,

    config: BufferPoolConfig,
}

impl BufferPoolManager {
    /// Create a standalone pool with `pool_size` frames and LRU eviction.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        Self::build(
            BufferPoolConfig::new(pool_size),
            Arc::new(Mutex::new(disk_manager)),
            Box::new(LruReplacer::new(pool_size)),
        )
    }

    /// Create a pool from `config` over a possibly shared disk manager.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `config` does not validate.
    pub fn with_config(config: BufferPoolConfig, disk_manager: Arc<Mutex<DiskManager>>) -> Result<Self> {
        let replacer = Box::new(LruReplacer::new(config.pool_size));
        Self::with_replacer(config, disk_manager, replacer)
    }

    /// Like [`with_config`](Self::with_config) with a caller-chosen policy.
    pub fn with_replacer(
        config: BufferPoolConfig,
        disk_manager: Arc<Mutex<DiskManager>>,
        replacer: Box<dyn Replacer + Send>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, disk_manager, replacer))
    }

    fn build(
        config: BufferPoolConfig,
        disk_manager: Arc<Mutex<DiskManager>>,
        replacer: Box<dyn Replacer + Send>,
    ) -> Self {
        let frames = (0..config.pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..config.pool_size).map(FrameId::new).collect();
        let next_page_id = Self::first_unused_page_id(&config, disk_manager.lock().page_count());

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer,
                next_page_id,
                loading: HashSet::new(),
            }),
            load_finished: Condvar::new(),
            disk_manager,
            stats: PoolStats::new(),
            config,
        }
    }

    /// First id on this instance's stride that lies past the end of the
    /// file, so reopening a database never reuses a persisted page.
    fn first_unused_page_id(config: &BufferPoolConfig, page_count: u32) -> u32 {
        let first = config.first_page_id();
        if page_count <= first {
            first
        } else {
            first + (page_count - first).div_ceil(config.num_instances) * config.num_instances
        }
    }

    #[inline]
    pub(crate) fn frame(&self, frame_id: FrameId) -> &Frame {
        &self.frames[frame_id.index()]
    }

    // ========================================================================
    // Public API: Fetch and create pages
    // ========================================================================

    /// Pin `page_id`, reading it from disk if it is not resident.
    ///
    /// The read happens outside the pool mutex, under the frame's write
    /// latch. Concurrent fetches of the same page wait for it to land
    /// instead of loading a second copy.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    pub fn fetch_page(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        let mut state = self.state.lock();
        while state.loading.contains(&page_id) {
            self.load_finished.wait(&mut state);
        }

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.pin_frame(&mut state, frame_id);
            PoolStats::bump(&self.stats.cache_hits);
            return Ok(PinnedPage::new(self, frame_id, page_id));
        }

        PoolStats::bump(&self.stats.cache_misses);
        let frame_id = self.acquire_frame(&mut state)?;
        state.loading.insert(page_id);
        drop(state);

        // The frame is off the free list, out of the replacer and not yet
        // mapped, so nothing else can reach it until it is installed.
        let frame = self.frame(frame_id);
        let loaded = {
            let mut page = frame.page_mut();
            self.disk_manager.lock().read_page(page_id, &mut page)
        };

        let mut state = self.state.lock();
        state.loading.remove(&page_id);
        self.load_finished.notify_all();

        if let Err(e) = loaded {
            frame.clear();
            state.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);

        Ok(PinnedPage::new(self, frame_id, page_id))
    }

    /// Allocate a fresh page id and pin a zeroed frame for it.
    ///
    /// The zeroed page is written through immediately, so the id is
    /// fetchable even if it is evicted before its first dirty unpin. The
    /// write happens outside the pool mutex; nobody knows the id yet.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from the initial write
    pub fn new_page(&self) -> Result<PinnedPage<'_>> {
        let (frame_id, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;
            (frame_id, self.allocate_page(&mut state))
        };
        let frame = self.frame(frame_id);

        let written = {
            let mut page = frame.page_mut();
            page.reset();
            self.disk_manager.lock().write_page(page_id, &page)
        };

        let mut state = self.state.lock();
        if let Err(e) = written {
            state.free_list.push_back(frame_id);
            return Err(e);
        }
        PoolStats::bump(&self.stats.pages_written);

        frame.install(page_id);
        state.page_table.insert(page_id, frame_id);

        Ok(PinnedPage::new(self, frame_id, page_id))
    }

    // ========================================================================
    // Public API: Unpin, flush, delete
    // ========================================================================

    /// Release one pin on `page_id`, ORing `is_dirty` into its dirty flag.
    ///
    /// When the pin count reaches zero the frame becomes evictable and, if
    /// dirty, is written back.
    ///
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let mut state = self.state.lock();

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = self.frame(frame_id);
        if !frame.is_pinned() {
            return Ok(false);
        }

        if is_dirty {
            frame.mark_dirty();
        }
        self.release_pin(&mut state, frame_id, page_id)?;
        Ok(true)
    }

    /// Write a resident page to disk regardless of its dirty flag.
    ///
    /// The page is pinned for the duration so it cannot be evicted, and
    /// the write happens under its shared latch outside the pool mutex.
    ///
    /// Returns false if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame_id = {
            let mut state = self.state.lock();
            let Some(&frame_id) = state.page_table.get(&page_id) else {
                return Ok(false);
            };
            self.pin_frame(&mut state, frame_id);
            frame_id
        };

        let written = self.write_frame(self.frame(frame_id), page_id);

        let mut state = self.state.lock();
        self.release_pin(&mut state, frame_id, page_id)?;
        written.map(|_| true)
    }

    /// Write every resident page to disk, then sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = self.state.lock().page_table.keys().copied().collect();

        for page_id in resident {
            // Pages evicted in the meantime were written back already.
            self.flush_page(page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    /// Deallocate `page_id` and drop it from the pool.
    ///
    /// Returns true if the page is gone from the pool (including when it
    /// was never resident), false if it is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();

        self.deallocate_page(page_id);

        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = self.frame(frame_id);
        if frame.is_pinned() {
            return Ok(false);
        }

        state.page_table.remove(&page_id);
        state.replacer.record_pinned(frame_id);
        frame.clear();
        state.free_list.push_back(frame_id);

        debug!("deleted {} from {}", page_id, frame_id);
        Ok(true)
    }

    // ========================================================================
    // Page id allocation
    // ========================================================================

    /// Hand out the next id on this instance's stride.
    fn allocate_page(&self, state: &mut PoolState) -> PageId {
        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += self.config.num_instances;

        debug_assert_eq!(
            page_id.shard(self.config.num_instances),
            self.config.instance_index as usize,
            "allocated page id on another instance's stride"
        );
        PoolStats::bump(&self.stats.pages_allocated);
        page_id
    }

    /// Release an id. Ids are not recycled; the file keeps its slot.
    fn deallocate_page(&self, page_id: PageId) {
        debug!("deallocating {}", page_id);
        PoolStats::bump(&self.stats.pages_deallocated);
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &PoolStats {
        &self.stats
    }

    #[inline]
    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    pub fn disk_manager(&self) -> &Arc<Mutex<DiskManager>> {
        &self.disk_manager
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Number of frames the replacer could evict right now.
    pub fn evictable_count(&self) -> usize {
        self.state.lock().replacer.size()
    }

    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().page_table.contains_key(&page_id)
    }

    /// Pin count of a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.frame(frame_id).pin_count())
    }

    // ========================================================================
    // Internal: pins and write-back
    // ========================================================================

    fn pin_frame(&self, state: &mut PoolState, frame_id: FrameId) {
        if self.frame(frame_id).pin() {
            state.replacer.record_pinned(frame_id);
        }
    }

    fn release_pin(&self, state: &mut PoolState, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = self.frame(frame_id);
        if frame.unpin() {
            state.replacer.record_unpinned(frame_id);
            if frame.is_dirty() {
                self.write_frame(frame, page_id)?;
            }
        }
        Ok(())
    }

    /// Write a frame's page under its shared latch and clear the dirty flag.
    /// A failed write leaves the flag as it was.
    fn write_frame(&self, frame: &Frame, page_id: PageId) -> Result<()> {
        let page = frame.page();
        let was_dirty = frame.take_dirty();
        if let Err(e) = self.disk_manager.lock().write_page(page_id, &page) {
            if was_dirty {
                frame.mark_dirty();
            }
            return Err(e);
        }
        PoolStats::bump(&self.stats.pages_written);
        Ok(())
    }

    // ========================================================================
    // Internal: Frame acquisition and eviction
    // ========================================================================

    /// Take a free frame, or evict the replacer's victim.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.victim().ok_or(Error::NoFreeFrames)?;
        let frame = self.frame(frame_id);

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                if let Err(e) = self.write_frame(frame, old_page_id) {
                    state.replacer.record_unpinned(frame_id);
                    return Err(e);
                }
            }
            state.page_table.remove(&old_page_id);
            debug!("evicted {} from {}", old_page_id, frame_id);
        }

        frame.detach();
        PoolStats::bump(&self.stats.evictions);
        Ok(frame_id)
    }
}

impl BufferPool for BufferPoolManager {
    fn fetch_page(&self, page_id: PageId) -> Result<PinnedPage<'_>> {
        BufferPoolManager::fetch_page(self, page_id)
    }

    fn new_page(&self) -> Result<PinnedPage<'_>> {
        BufferPoolManager::new_page(self)
    }

    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        BufferPoolManager::unpin_page(self, page_id, is_dirty)
    }

    fn flush_page(&self, page_id: PageId) -> Result<bool> {
        BufferPoolManager::flush_page(self, page_id)
    }

    fn flush_all_pages(&self) -> Result<()> {
        BufferPoolManager::flush_all_pages(self)
    }

    fn delete_page(&self, page_id: PageId) -> Result<bool> {
        BufferPoolManager::delete_page(self, page_id)
    }

    fn pool_size(&self) -> usize {
        BufferPoolManager::pool_size(self)
    }
}
